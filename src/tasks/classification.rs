// ============================================================
// Layer 5 — Sentence / Sentence-Pair Classification
// ============================================================
// One variant covers every delimited-file classification task.
// Whether it takes one sentence or a pair is read off its TSV
// specs; what it reports is chosen by `Scoring`:
//
//   Accuracy      { accuracy }                      val key: accuracy
//   MccAccuracy   { mcc, accuracy }                 val key: mcc
//   AccuracyF1    { acc_f1, accuracy, f1,           val key: acc_f1
//                   precision, recall }
//
// acc_f1 is the plain mean of accuracy and F1 (positive class 1).
//
// Options honoured at construction:
//   genre       keep only rows whose genre column matches
//   probe_path  replace the validation file
//   n_classes   override the class count
//
// Reference: Rust Book §10 (Traits), §6 (Enums)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::data::{dataset::{ColumnarDataset, RowLayout}, tsv::TsvSpec};
use crate::domain::{
    instance::TokenIndexer,
    prediction::{MetricMap, Predictions},
    split::Split,
    traits::Aggregator,
};
use crate::infra::metrics::{CategoricalAccuracy, Correlation, CorrelationKind, F1Measure};
use crate::infra::tokenizer::Sentinels;
use crate::tasks::{
    columnar::{map_specs, process_columns, ColumnarStore, SplitSources, TsvSource},
    wrong_predictions, wrong_split, InstanceStream, SentenceStream, SplitText, Task, TaskContext,
    TaskKind, TaskOptions,
};

/// Column holding the genre in MNLI files
pub const GENRE_COLUMN: usize = 3;

/// Three-way entailment labels shared by the NLI corpora
pub const NLI_LABELS: [(&str, i64); 3] = [("neutral", 0), ("entailment", 1), ("contradiction", 2)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    #[default]
    Accuracy,
    MccAccuracy,
    AccuracyF1,
}

impl Scoring {
    pub fn val_key(&self) -> &'static str {
        match self {
            Scoring::Accuracy    => "accuracy",
            Scoring::MccAccuracy => "mcc",
            Scoring::AccuracyF1  => "acc_f1",
        }
    }
}

// ─── Config ───────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationConfig {
    pub n_classes: usize,
    pub sources: SplitSources,
    pub scoring: Scoring,
}

impl ClassificationConfig {
    pub fn new(n_classes: usize) -> Self {
        Self { n_classes, sources: SplitSources::new(), scoring: Scoring::default() }
    }

    /// Add a file to a split; repeated calls concatenate
    pub fn split(mut self, split: Split, file: &str, spec: TsvSpec) -> Self {
        self.sources.entry(split).or_default().push(TsvSource::new(file, spec));
        self
    }

    /// Same file layout for train, val and test
    pub fn all_splits(self, train: &str, val: &str, test: &str, spec: TsvSpec) -> Self {
        self.split(Split::Train, train, spec.clone())
            .split(Split::Val, val, spec.clone())
            .split(Split::Test, test, spec)
    }

    pub fn scoring(mut self, scoring: Scoring) -> Self {
        self.scoring = scoring;
        self
    }
}

// ─── ClassificationTask ───────────────────────────────────────────────────────
pub struct ClassificationTask {
    name: String,
    n_classes: usize,
    pair: bool,
    scoring: Scoring,
    tokenizer_name: String,
    store: ColumnarStore,
    accuracy: CategoricalAccuracy,
    mcc: Correlation,
    f1: F1Measure,
}

impl ClassificationTask {
    pub fn new(
        name: &str,
        dir: &Path,
        config: &ClassificationConfig,
        ctx: &TaskContext,
        opts: &TaskOptions,
    ) -> Result<Self> {
        let mut sources = config.sources.clone();
        if let Some(genre) = &opts.genre {
            map_specs(&mut sources, |spec| *spec = spec.clone().filter(GENRE_COLUMN, genre.as_str()));
        }
        if let Some(probe) = &opts.probe_path {
            for source in sources.entry(Split::Val).or_default() {
                source.file = probe.clone();
            }
        }
        let pair = sources.values().flatten().any(|s| s.spec.s2_idx.is_some());

        let store = ColumnarStore::load(name, dir, &sources, ctx)?;
        info!("{}: loaded {} classification data from {}", name, if pair { "pair" } else { "single" }, dir.display());

        Ok(Self {
            name: name.to_string(),
            n_classes: opts.n_classes.unwrap_or(config.n_classes),
            pair,
            scoring: config.scoring,
            tokenizer_name: ctx.tokenizer.name().to_string(),
            store,
            accuracy: CategoricalAccuracy::new(),
            mcc: Correlation::new(CorrelationKind::Matthews),
            f1: F1Measure::new(1),
        })
    }

    /// Random-access view of one split
    pub fn dataset(&self, split: Split, indexer: &TokenIndexer) -> Result<ColumnarDataset> {
        Ok(self.store.dataset(split, RowLayout::Pair { indexer: indexer.clone() })?)
    }
}

impl Task for ClassificationTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Classification
    }

    fn input_arity(&self) -> usize {
        if self.pair { 2 } else { 1 }
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn val_metric_key(&self) -> &str {
        self.scoring.val_key()
    }

    fn tokenizer_name(&self) -> &str {
        &self.tokenizer_name
    }

    fn truncate(&mut self, max_seq_len: usize, sentinels: Sentinels) -> Result<()> {
        self.store.truncate(max_seq_len, sentinels);
        Ok(())
    }

    fn sentences(&self) -> Result<SentenceStream<'_>> {
        Ok(self.store.sentences())
    }

    fn split_text(&self, split: Split) -> Result<SplitText<'_>> {
        Ok(SplitText::Columns(self.store.get(split)?))
    }

    fn process_split<'a>(&'a self, text: SplitText<'a>, indexer: &TokenIndexer) -> Result<InstanceStream<'a>> {
        match text {
            SplitText::Columns(data) => Ok(process_columns(data, RowLayout::Pair { indexer: indexer.clone() })),
            other => Err(wrong_split(&self.name, &other)),
        }
    }

    fn update_metrics(&mut self, predictions: &Predictions) -> Result<()> {
        let Predictions::Classes { predicted, gold } = predictions else {
            return Err(wrong_predictions(&self.name, predictions));
        };
        self.accuracy.update(predicted, gold)?;
        match self.scoring {
            Scoring::Accuracy    => {}
            Scoring::MccAccuracy => self.mcc.update_classes(predicted, gold)?,
            Scoring::AccuracyF1  => self.f1.update(predicted, gold)?,
        }
        Ok(())
    }

    fn metrics(&mut self, reset: bool) -> MetricMap {
        let accuracy = self.accuracy.get(reset);
        let mut out = MetricMap::new();
        out.insert("accuracy".into(), accuracy);
        match self.scoring {
            Scoring::Accuracy => {}
            Scoring::MccAccuracy => {
                out.insert("mcc".into(), self.mcc.get(reset));
            }
            Scoring::AccuracyF1 => {
                let prf = self.f1.get(reset);
                out.insert("acc_f1".into(), (accuracy + prf.f1) / 2.0);
                out.insert("f1".into(), prf.f1);
                out.insert("precision".into(), prf.precision);
                out.insert("recall".into(), prf.recall);
            }
        }
        out
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::instance::Field;
    use std::fs;

    fn pair_task(dir: &Path, scoring: Scoring) -> ClassificationTask {
        let header = "text1\ttext2\tlabel\n";
        fs::write(dir.join("train.tsv"), format!("{header}a b\tc d\t0\ne f\tg h\t1\n")).unwrap();
        fs::write(dir.join("dev.tsv"), format!("{header}a b\tc d\t0\ne f\tg h\t1\n")).unwrap();
        fs::write(dir.join("test.tsv"), format!("{header}x y\tz w\t1\n")).unwrap();
        let config = ClassificationConfig::new(2)
            .all_splits("train.tsv", "dev.tsv", "test.tsv", TsvSpec::pair(0, 1).target(2).skip(1))
            .scoring(scoring);
        ClassificationTask::new("toy", dir, &config, &TaskContext::whitespace(dir), &TaskOptions::new()).unwrap()
    }

    #[test]
    fn test_pair_file_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let task = pair_task(dir.path(), Scoring::Accuracy);

        let text = task.split_text(Split::Val).unwrap();
        let instances: Vec<_> = task
            .process_split(text, &TokenIndexer::default())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(instances.len(), 2);
        for inst in &instances {
            // two tokens + two sentinels
            assert_eq!(inst.tokens("input1").unwrap().len(), 4);
            assert_eq!(inst.tokens("input2").unwrap().len(), 4);
        }
        let labels: Vec<i64> = instances.iter().filter_map(|i| i.label("labels")).collect();
        assert_eq!(labels, vec![0, 1]);
        assert_eq!(instances[0].get("sent2_str"), Some(&Field::metadata("c d")));
        assert_eq!(task.input_arity(), 2);
    }

    #[test]
    fn test_columns_have_equal_length_in_every_split() {
        let dir = tempfile::tempdir().unwrap();
        let task = pair_task(dir.path(), Scoring::Accuracy);
        for split in Split::ALL {
            let SplitText::Columns(data) = task.split_text(split).unwrap() else {
                panic!("expected columns");
            };
            assert!(data.is_consistent());
            assert_eq!(data.input1.len(), data.input2.as_ref().unwrap().len());
        }
    }

    #[test]
    fn test_acc_f1_composite_and_val_metric() {
        let dir = tempfile::tempdir().unwrap();
        let mut task = pair_task(dir.path(), Scoring::AccuracyF1);
        assert_eq!(task.val_metric(), "toy_acc_f1");

        task.update_metrics(&Predictions::Classes { predicted: vec![1, 1, 0, 0], gold: vec![1, 0, 0, 1] })
            .unwrap();
        let m = task.metrics(false);
        assert_eq!(m["accuracy"], 0.5);
        assert_eq!(m["f1"], 0.5);
        assert_eq!(m["acc_f1"], 0.5);
        assert!(m.contains_key(task.val_metric_key()));
    }

    #[test]
    fn test_reset_twice_reports_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut task = pair_task(dir.path(), Scoring::MccAccuracy);
        task.update_metrics(&Predictions::Classes { predicted: vec![1, 0], gold: vec![1, 0] }).unwrap();
        assert_eq!(task.metrics(true)["accuracy"], 1.0);

        let again = task.metrics(true);
        assert_eq!(again["accuracy"], 0.0);
        assert_eq!(again["mcc"], 0.0);
    }

    #[test]
    fn test_rejects_other_prediction_shapes() {
        let dir = tempfile::tempdir().unwrap();
        let mut task = pair_task(dir.path(), Scoring::Accuracy);
        assert!(task.update_metrics(&Predictions::Similarity { value: 0.3 }).is_err());
    }

    #[test]
    fn test_genre_option_filters_rows() {
        let dir = tempfile::tempdir().unwrap();
        let rows = "id\tx\ty\tgenre\tp\th\n1\t_\t_\tfiction\ta\tb\n2\t_\t_\tslate\tc\td\n";
        for f in ["train.tsv", "dev.tsv", "test.tsv"] {
            fs::write(dir.path().join(f), rows).unwrap();
        }
        let config = ClassificationConfig::new(3).all_splits(
            "train.tsv",
            "dev.tsv",
            "test.tsv",
            TsvSpec::pair(4, 5).index(0).skip(1),
        );
        let opts = TaskOptions::new().genre("fiction");
        let task = ClassificationTask::new("mnli-fiction", dir.path(), &config, &TaskContext::whitespace(dir.path()), &opts)
            .unwrap();
        let counts = task.count_examples().unwrap();
        assert_eq!(counts[&Split::Train], 1);
    }

    #[test]
    fn test_truncate_is_supported() {
        let dir = tempfile::tempdir().unwrap();
        let mut task = pair_task(dir.path(), Scoring::Accuracy);
        task.truncate(3, Sentinels::INPUT).unwrap();
        let SplitText::Columns(data) = task.split_text(Split::Train).unwrap() else {
            panic!("expected columns");
        };
        assert_eq!(data.input1[0], vec!["<SOS>", "a", "<EOS>"]);
    }
}
