// ============================================================
// Layer 6 — Metric Aggregators
// ============================================================
// Stateful running scorers. Each one accumulates across any
// number of `update` calls and reports through the shared
// `Aggregator::get(reset)`:
//
//   CategoricalAccuracy  correct / total over class ids
//   BooleanAccuracy      rows that match exactly / rows
//   F1Measure            precision, recall, F1 for one positive label
//   Average              running mean of scalars
//   Correlation          Pearson / Spearman / Matthews over the full history
//   MatthewsCorrelation  binary MCC from streaming confusion counts
//
// Empty state: every aggregator reports 0.0 before it has seen
// data, and any undefined value (zero variance, 0/0) is also 0.0.
//
// Updates with mismatched prediction / gold lengths are rejected
// with TaskError::PredictionMismatch and leave state untouched.
//
// Reference: Rust Book §10 (Traits), §8 (Collections)

use crate::domain::{error::TaskError, traits::Aggregator};

fn check_lengths(predicted: usize, gold: usize) -> Result<(), TaskError> {
    if predicted != gold {
        return Err(TaskError::PredictionMismatch(format!(
            "{predicted} predictions for {gold} gold values"
        )));
    }
    Ok(())
}

/// 0/0 → 0.0
fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

// ─── CategoricalAccuracy ──────────────────────────────────────────────────────
#[derive(Debug, Clone, Default)]
pub struct CategoricalAccuracy {
    correct: u64,
    total: u64,
}

impl CategoricalAccuracy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, predicted: &[i64], gold: &[i64]) -> Result<(), TaskError> {
        check_lengths(predicted.len(), gold.len())?;
        self.correct += predicted.iter().zip(gold).filter(|(p, g)| p == g).count() as u64;
        self.total += gold.len() as u64;
        Ok(())
    }
}

impl Aggregator for CategoricalAccuracy {
    type Value = f64;

    fn value(&self) -> f64 {
        ratio(self.correct as f64, self.total as f64)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

// ─── BooleanAccuracy ──────────────────────────────────────────────────────────
/// A row counts as correct only if every position matches
#[derive(Debug, Clone, Default)]
pub struct BooleanAccuracy {
    correct: u64,
    total: u64,
}

impl BooleanAccuracy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update<T: PartialEq>(&mut self, predicted: &[Vec<T>], gold: &[Vec<T>]) -> Result<(), TaskError> {
        check_lengths(predicted.len(), gold.len())?;
        self.correct += predicted.iter().zip(gold).filter(|(p, g)| p == g).count() as u64;
        self.total += gold.len() as u64;
        Ok(())
    }
}

impl Aggregator for BooleanAccuracy {
    type Value = f64;

    fn value(&self) -> f64 {
        ratio(self.correct as f64, self.total as f64)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

// ─── F1Measure ────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PrecisionRecallF1 {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

#[derive(Debug, Clone)]
pub struct F1Measure {
    positive_label: i64,
    true_positives: u64,
    false_positives: u64,
    false_negatives: u64,
}

impl F1Measure {
    pub fn new(positive_label: i64) -> Self {
        Self { positive_label, true_positives: 0, false_positives: 0, false_negatives: 0 }
    }

    pub fn update(&mut self, predicted: &[i64], gold: &[i64]) -> Result<(), TaskError> {
        check_lengths(predicted.len(), gold.len())?;
        let pos = self.positive_label;
        for (&p, &g) in predicted.iter().zip(gold) {
            match (p == pos, g == pos) {
                (true, true)   => self.true_positives += 1,
                (true, false)  => self.false_positives += 1,
                (false, true)  => self.false_negatives += 1,
                (false, false) => {}
            }
        }
        Ok(())
    }
}

impl Aggregator for F1Measure {
    type Value = PrecisionRecallF1;

    fn value(&self) -> PrecisionRecallF1 {
        let tp        = self.true_positives as f64;
        let precision = ratio(tp, tp + self.false_positives as f64);
        let recall    = ratio(tp, tp + self.false_negatives as f64);
        let f1        = ratio(2.0 * precision * recall, precision + recall);
        PrecisionRecallF1 { precision, recall, f1 }
    }

    fn reset(&mut self) {
        *self = Self::new(self.positive_label);
    }
}

// ─── Average ──────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Default)]
pub struct Average {
    total: f64,
    count: u64,
}

impl Average {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, value: f64) {
        self.total += value;
        self.count += 1;
    }
}

impl Aggregator for Average {
    type Value = f64;

    fn value(&self) -> f64 {
        ratio(self.total, self.count as f64)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

// ─── Correlation ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationKind {
    Pearson,
    Spearman,
    /// Multiclass Matthews over class ids
    Matthews,
}

/// Keeps every (prediction, gold) pair seen since the last reset
/// and computes the correlation over the whole history.
#[derive(Debug, Clone)]
pub struct Correlation {
    kind: CorrelationKind,
    predicted: Vec<f64>,
    gold: Vec<f64>,
}

impl Correlation {
    pub fn new(kind: CorrelationKind) -> Self {
        Self { kind, predicted: Vec::new(), gold: Vec::new() }
    }

    pub fn kind(&self) -> CorrelationKind {
        self.kind
    }

    pub fn update(&mut self, predicted: &[f64], gold: &[f64]) -> Result<(), TaskError> {
        check_lengths(predicted.len(), gold.len())?;
        self.predicted.extend_from_slice(predicted);
        self.gold.extend_from_slice(gold);
        Ok(())
    }

    /// Class-id convenience for Matthews
    pub fn update_classes(&mut self, predicted: &[i64], gold: &[i64]) -> Result<(), TaskError> {
        check_lengths(predicted.len(), gold.len())?;
        self.predicted.extend(predicted.iter().map(|&v| v as f64));
        self.gold.extend(gold.iter().map(|&v| v as f64));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.gold.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gold.is_empty()
    }
}

impl Aggregator for Correlation {
    type Value = f64;

    fn value(&self) -> f64 {
        if self.gold.is_empty() {
            return 0.0;
        }
        let v = match self.kind {
            CorrelationKind::Pearson  => pearson(&self.predicted, &self.gold),
            CorrelationKind::Spearman => pearson(&average_ranks(&self.predicted), &average_ranks(&self.gold)),
            CorrelationKind::Matthews => multiclass_matthews(&self.predicted, &self.gold),
        };
        finite_or_zero(v)
    }

    fn reset(&mut self) {
        self.predicted.clear();
        self.gold.clear();
    }
}

pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov   += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    ratio(cov, (var_x * var_y).sqrt())
}

/// 1-based ranks; tied values share the mean of their ranks
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // positions i..=j tie → ranks i+1..=j+1
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = rank;
        }
        i = j + 1;
    }
    ranks
}

fn multiclass_matthews(predicted: &[f64], gold: &[f64]) -> f64 {
    use std::collections::BTreeMap;

    let mut pred_counts: BTreeMap<i64, f64> = BTreeMap::new();
    let mut gold_counts: BTreeMap<i64, f64> = BTreeMap::new();
    let mut correct = 0.0;
    for (&p, &g) in predicted.iter().zip(gold) {
        let (p, g) = (p.round() as i64, g.round() as i64);
        *pred_counts.entry(p).or_default() += 1.0;
        *gold_counts.entry(g).or_default() += 1.0;
        if p == g {
            correct += 1.0;
        }
    }

    let s = gold.len() as f64;
    let cross: f64 = pred_counts
        .iter()
        .map(|(k, pk)| pk * gold_counts.get(k).copied().unwrap_or(0.0))
        .sum();
    let pred_sq: f64 = pred_counts.values().map(|v| v * v).sum();
    let gold_sq: f64 = gold_counts.values().map(|v| v * v).sum();

    let num = correct * s - cross;
    let den = ((s * s - pred_sq) * (s * s - gold_sq)).sqrt();
    ratio(num, den)
}

// ─── MatthewsCorrelation ──────────────────────────────────────────────────────
/// Binary MCC from running confusion counts; never stores history
#[derive(Debug, Clone, Default)]
pub struct MatthewsCorrelation {
    tp: u64,
    tn: u64,
    fp: u64,
    fn_: u64,
}

impl MatthewsCorrelation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values > 0 count as positive
    pub fn update(&mut self, predicted: &[u8], gold: &[u8]) -> Result<(), TaskError> {
        check_lengths(predicted.len(), gold.len())?;
        for (&p, &g) in predicted.iter().zip(gold) {
            match (p > 0, g > 0) {
                (true, true)   => self.tp += 1,
                (false, false) => self.tn += 1,
                (true, false)  => self.fp += 1,
                (false, true)  => self.fn_ += 1,
            }
        }
        Ok(())
    }
}

impl Aggregator for MatthewsCorrelation {
    type Value = f64;

    fn value(&self) -> f64 {
        let (tp, tn, fp, fn_) = (self.tp as f64, self.tn as f64, self.fp as f64, self.fn_ as f64);
        let num = tp * tn - fp * fn_;
        let den = ((tp + fp) * (tp + fn_) * (tn + fp) * (tn + fn_)).sqrt();
        finite_or_zero(ratio(num, den))
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_accuracy_accumulates_and_resets() {
        let mut acc = CategoricalAccuracy::new();
        acc.update(&[1, 0, 2], &[1, 1, 2]).unwrap();
        acc.update(&[0], &[0]).unwrap();
        assert!(close(acc.get(true), 0.75));
        assert_eq!(acc.get(true), 0.0);
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let mut acc = CategoricalAccuracy::new();
        assert!(acc.update(&[1, 2], &[1]).is_err());
        assert_eq!(acc.value(), 0.0);
    }

    #[test]
    fn test_boolean_accuracy_is_row_wise() {
        let mut acc = BooleanAccuracy::new();
        acc.update(&[vec![1u8, 0], vec![1, 1]], &[vec![1, 0], vec![1, 0]]).unwrap();
        assert!(close(acc.value(), 0.5));
    }

    #[test]
    fn test_f1_counts_positive_label_only() {
        let mut f1 = F1Measure::new(1);
        f1.update(&[1, 1, 0, 0], &[1, 0, 1, 0]).unwrap();
        let v = f1.get(false);
        assert!(close(v.precision, 0.5));
        assert!(close(v.recall, 0.5));
        assert!(close(v.f1, 0.5));
    }

    #[test]
    fn test_f1_empty_state_is_zero() {
        let mut f1 = F1Measure::new(1);
        assert_eq!(f1.get(true), PrecisionRecallF1::default());
    }

    #[test]
    fn test_average() {
        let mut avg = Average::new();
        avg.update(1.0);
        avg.update(3.0);
        assert!(close(avg.get(true), 2.0));
        assert_eq!(avg.value(), 0.0);
    }

    #[test]
    fn test_pearson_perfect_and_inverse() {
        let mut c = Correlation::new(CorrelationKind::Pearson);
        c.update(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap();
        assert!(close(c.value(), 1.0));

        let mut c = Correlation::new(CorrelationKind::Pearson);
        c.update(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).unwrap();
        assert!(close(c.value(), -1.0));
    }

    #[test]
    fn test_constant_input_correlation_is_zero() {
        let mut c = Correlation::new(CorrelationKind::Pearson);
        c.update(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(c.value(), 0.0);
    }

    #[test]
    fn test_spearman_is_rank_based() {
        let mut c = Correlation::new(CorrelationKind::Spearman);
        // Monotone but non-linear
        c.update(&[1.0, 2.0, 3.0, 4.0], &[1.0, 10.0, 100.0, 1000.0]).unwrap();
        assert!(close(c.value(), 1.0));
    }

    #[test]
    fn test_average_ranks_ties() {
        assert_eq!(average_ranks(&[10.0, 20.0, 20.0, 5.0]), vec![2.0, 3.5, 3.5, 1.0]);
    }

    #[test]
    fn test_matthews_multiclass_perfect() {
        let mut c = Correlation::new(CorrelationKind::Matthews);
        c.update_classes(&[0, 1, 2, 2], &[0, 1, 2, 2]).unwrap();
        assert!(close(c.value(), 1.0));
    }

    #[test]
    fn test_matthews_multiclass_matches_binary() {
        let pred = [1i64, 1, 0, 0, 1];
        let gold = [1i64, 0, 0, 1, 1];

        let mut multi = Correlation::new(CorrelationKind::Matthews);
        multi.update_classes(&pred, &gold).unwrap();

        let mut binary = MatthewsCorrelation::new();
        let p: Vec<u8> = pred.iter().map(|&v| v as u8).collect();
        let g: Vec<u8> = gold.iter().map(|&v| v as u8).collect();
        binary.update(&p, &g).unwrap();

        assert!(close(multi.value(), binary.value()));
        // tp=2 tn=1 fp=1 fn=1 → (2-1)/sqrt(3*3*2*2) = 1/6
        assert!(close(binary.value(), 1.0 / 6.0));
    }

    #[test]
    fn test_correlation_reset_returns_empty_state() {
        let mut c = Correlation::new(CorrelationKind::Spearman);
        c.update(&[1.0, 2.0], &[1.0, 2.0]).unwrap();
        assert!(close(c.get(true), 1.0));
        assert!(c.is_empty());
        assert_eq!(c.get(true), 0.0);
    }
}
