// ============================================================
// Layer 4 — Columnar Split Storage
// ============================================================
// The normalized in-memory form of a delimited-text split:
//
//   input1   [[<SOS>, a, b, <EOS>], [<SOS>, e, f, <EOS>], ...]
//   input2   [[<SOS>, c, d, <EOS>], [<SOS>, g, h, <EOS>], ...]   (pair tasks)
//   targets  Labels([0, 1, ...]) | Scores([..]) | Tags([[..], ..])
//   idx      [0, 1, ...]  (positional unless the file had an id column)
//
// Invariant: every column has the same length. Loaders only
// push whole rows, and `extend` refuses to merge splits of a
// different shape.
//
// Reference: Rust Book §8 (Vectors), §6 (Enums)

use anyhow::{bail, Result};
use serde::Serialize;

use crate::infra::tokenizer::{wrap_tokens, Sentinels};

// ─── Targets ──────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Targets {
    Labels(Vec<i64>),
    Scores(Vec<f64>),
    /// One tag sequence per sentence
    Tags(Vec<Vec<String>>),
}

impl Targets {
    pub fn len(&self) -> usize {
        match self {
            Targets::Labels(v) => v.len(),
            Targets::Scores(v) => v.len(),
            Targets::Tags(v)   => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Targets::Labels(_) => "labels",
            Targets::Scores(_) => "scores",
            Targets::Tags(_)   => "tags",
        }
    }
}

/// One row's target
#[derive(Debug, Clone, PartialEq)]
pub enum TargetValue {
    Label(i64),
    Score(f64),
    Tags(Vec<String>),
}

// ─── ColumnarSplit ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnarSplit {
    pub input1: Vec<Vec<String>>,
    pub input2: Option<Vec<Vec<String>>>,
    pub targets: Targets,
    pub idx: Vec<i64>,
}

impl ColumnarSplit {
    /// Empty split with the given shape
    pub fn empty(pair: bool, targets: Targets) -> Self {
        Self {
            input1: Vec::new(),
            input2: pair.then(Vec::new),
            targets,
            idx: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.input1.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input1.is_empty()
    }

    pub fn is_pair(&self) -> bool {
        self.input2.is_some()
    }

    /// All columns have equal length
    pub fn is_consistent(&self) -> bool {
        let n = self.input1.len();
        self.input2.as_ref().map_or(true, |c| c.len() == n)
            && self.targets.len() == n
            && self.idx.len() == n
    }

    /// Append one row to every column
    pub fn push_row(
        &mut self,
        input1: Vec<String>,
        input2: Option<Vec<String>>,
        target: TargetValue,
        idx: i64,
    ) -> Result<()> {
        match (&mut self.input2, input2) {
            (Some(col), Some(s2)) => col.push(s2),
            (None, None) => {}
            _ => bail!("row arity does not match split"),
        }
        match (&mut self.targets, target) {
            (Targets::Labels(v), TargetValue::Label(t)) => v.push(t),
            (Targets::Scores(v), TargetValue::Score(t)) => v.push(t),
            (Targets::Tags(v), TargetValue::Tags(t))    => v.push(t),
            (targets, _) => bail!("row target does not match {} column", targets.kind()),
        }
        self.input1.push(input1);
        self.idx.push(idx);
        Ok(())
    }

    /// Row `i` as owned values
    pub fn row(&self, i: usize) -> Option<(Vec<String>, Option<Vec<String>>, TargetValue, i64)> {
        let input1 = self.input1.get(i)?.clone();
        let input2 = match &self.input2 {
            Some(col) => Some(col.get(i)?.clone()),
            None => None,
        };
        let target = match &self.targets {
            Targets::Labels(v) => TargetValue::Label(*v.get(i)?),
            Targets::Scores(v) => TargetValue::Score(*v.get(i)?),
            Targets::Tags(v)   => TargetValue::Tags(v.get(i)?.clone()),
        };
        Some((input1, input2, target, *self.idx.get(i)?))
    }

    /// Concatenate another split of the same shape onto this one
    pub fn extend(&mut self, other: ColumnarSplit) -> Result<()> {
        if self.is_pair() != other.is_pair() {
            bail!("cannot merge single-input and pair-input splits");
        }
        match (&mut self.targets, other.targets) {
            (Targets::Labels(a), Targets::Labels(b)) => a.extend(b),
            (Targets::Scores(a), Targets::Scores(b)) => a.extend(b),
            (Targets::Tags(a), Targets::Tags(b))     => a.extend(b),
            (a, b) => bail!("cannot merge {} targets with {} targets", a.kind(), b.kind()),
        }
        self.input1.extend(other.input1);
        if let (Some(a), Some(b)) = (&mut self.input2, other.input2) {
            a.extend(b);
        }
        self.idx.extend(other.idx);
        Ok(())
    }

    /// Shorten every sentence to at most `max_seq_len` tokens including
    /// the sentinels. Existing sentinels are stripped before re-wrapping,
    /// so truncating twice gives the same result as truncating once.
    pub fn truncate(&mut self, max_seq_len: usize, sentinels: Sentinels) {
        truncate_column(&mut self.input1, max_seq_len, sentinels);
        if let Some(col) = &mut self.input2 {
            truncate_column(col, max_seq_len, sentinels);
        }
    }
}

fn truncate_column(col: &mut [Vec<String>], max_seq_len: usize, sentinels: Sentinels) {
    for sent in col.iter_mut() {
        let tokens = std::mem::take(sent);
        *sent = wrap_tokens(strip_sentinels(tokens, sentinels), max_seq_len, sentinels);
    }
}

fn strip_sentinels(mut tokens: Vec<String>, sentinels: Sentinels) -> Vec<String> {
    let wrapped = tokens.len() >= 2
        && tokens.first().map(String::as_str) == Some(sentinels.start)
        && tokens.last().map(String::as_str) == Some(sentinels.end);
    if wrapped {
        tokens.pop();
        tokens.remove(0);
    }
    tokens
}

/// Drop the sentinels again for `sent*_str` metadata
pub fn inner_text(tokens: &[String]) -> String {
    match tokens.len() {
        0..=2 => String::new(),
        n => tokens[1..n - 1].join(" "),
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    fn pair_split(rows: &[(&str, &str, i64)]) -> ColumnarSplit {
        let mut split = ColumnarSplit::empty(true, Targets::Labels(Vec::new()));
        for (i, (a, b, l)) in rows.iter().enumerate() {
            split
                .push_row(toks(a), Some(toks(b)), TargetValue::Label(*l), i as i64)
                .unwrap();
        }
        split
    }

    #[test]
    fn test_push_keeps_columns_aligned() {
        let split = pair_split(&[("a", "b", 0), ("c", "d", 1)]);
        assert_eq!(split.len(), 2);
        assert!(split.is_consistent());
    }

    #[test]
    fn test_push_rejects_wrong_shape() {
        let mut split = ColumnarSplit::empty(false, Targets::Labels(Vec::new()));
        assert!(split.push_row(toks("a"), Some(toks("b")), TargetValue::Label(0), 0).is_err());
        assert!(split.push_row(toks("a"), None, TargetValue::Score(0.5), 0).is_err());
        assert!(split.is_empty());
    }

    #[test]
    fn test_extend_merges_in_order() {
        let mut a = pair_split(&[("a", "b", 0)]);
        let b = pair_split(&[("c", "d", 2)]);
        a.extend(b).unwrap();
        assert_eq!(a.targets, Targets::Labels(vec![0, 2]));
        assert!(a.is_consistent());
    }

    #[test]
    fn test_extend_rejects_mismatched_targets() {
        let mut a = pair_split(&[("a", "b", 0)]);
        let b = ColumnarSplit::empty(true, Targets::Scores(Vec::new()));
        assert!(a.extend(b).is_err());
    }

    #[test]
    fn test_truncate_is_idempotent() {
        let mut split = ColumnarSplit::empty(false, Targets::Labels(Vec::new()));
        split
            .push_row(toks("<SOS> a b c d <EOS>"), None, TargetValue::Label(0), 0)
            .unwrap();
        split.truncate(4, Sentinels::INPUT);
        assert_eq!(split.input1[0], toks("<SOS> a b <EOS>"));
        split.truncate(4, Sentinels::INPUT);
        assert_eq!(split.input1[0], toks("<SOS> a b <EOS>"));
    }

    #[test]
    fn test_inner_text() {
        assert_eq!(inner_text(&toks("<SOS> a b <EOS>")), "a b");
        assert_eq!(inner_text(&toks("<SOS> <EOS>")), "");
    }
}
