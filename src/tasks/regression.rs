// ============================================================
// Layer 5 — Sentence-Pair Regression
// ============================================================
// Pair inputs with a numeric target (`labels` is a Numeric
// field, already divided by the spec's scale). Three ways of
// scoring:
//
//   Mse          { mse }                           val key: mse (lower is better)
//   OrdinalMse   { 1-mse, mse, spearmanr }         val key: 1-mse
//   Correlation  { corr, pearsonr, spearmanr }     val key: corr
//
// corr is the mean of Pearson and Spearman.
//
// Reference: Rust Book §10 (Traits)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::data::{dataset::RowLayout, tsv::TsvSpec};
use crate::domain::{
    instance::TokenIndexer,
    prediction::{MetricMap, Predictions},
    split::Split,
    traits::Aggregator,
};
use crate::infra::metrics::{Average, Correlation, CorrelationKind};
use crate::infra::tokenizer::Sentinels;
use crate::tasks::{
    columnar::{process_columns, ColumnarStore, SplitSources, TsvSource},
    wrong_predictions, wrong_split, InstanceStream, SentenceStream, SplitText, Task, TaskContext,
    TaskKind, TaskOptions,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegressionScoring {
    #[default]
    Mse,
    OrdinalMse,
    Correlation,
}

impl RegressionScoring {
    pub fn val_key(&self) -> &'static str {
        match self {
            RegressionScoring::Mse         => "mse",
            RegressionScoring::OrdinalMse  => "1-mse",
            RegressionScoring::Correlation => "corr",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionConfig {
    pub sources: SplitSources,
    pub scoring: RegressionScoring,
}

impl RegressionConfig {
    pub fn new(scoring: RegressionScoring) -> Self {
        Self { sources: SplitSources::new(), scoring }
    }

    pub fn split(mut self, split: Split, file: &str, spec: TsvSpec) -> Self {
        self.sources.entry(split).or_default().push(TsvSource::new(file, spec));
        self
    }
}

pub struct RegressionTask {
    name: String,
    scoring: RegressionScoring,
    tokenizer_name: String,
    store: ColumnarStore,
    squared_error: Average,
    pearson: Correlation,
    spearman: Correlation,
}

impl RegressionTask {
    pub fn new(
        name: &str,
        dir: &Path,
        config: &RegressionConfig,
        ctx: &TaskContext,
        _opts: &TaskOptions,
    ) -> Result<Self> {
        let store = ColumnarStore::load(name, dir, &config.sources, ctx)?;
        info!("{}: loaded regression data from {}", name, dir.display());
        Ok(Self {
            name: name.to_string(),
            scoring: config.scoring,
            tokenizer_name: ctx.tokenizer.name().to_string(),
            store,
            squared_error: Average::new(),
            pearson: Correlation::new(CorrelationKind::Pearson),
            spearman: Correlation::new(CorrelationKind::Spearman),
        })
    }
}

impl Task for RegressionTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Regression
    }

    fn input_arity(&self) -> usize {
        2
    }

    fn n_classes(&self) -> usize {
        1
    }

    fn val_metric_key(&self) -> &str {
        self.scoring.val_key()
    }

    fn val_metric_decreases(&self) -> bool {
        self.scoring == RegressionScoring::Mse
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
        let Predictions::Scores { predicted, gold } = predictions else {
            return Err(wrong_predictions(&self.name, predictions));
        };
        // correlations check lengths before anything is recorded
        self.spearman.update(predicted, gold)?;
        self.pearson.update(predicted, gold)?;
        for (p, g) in predicted.iter().zip(gold) {
            self.squared_error.update((p - g).powi(2));
        }
        Ok(())
    }

    fn metrics(&mut self, reset: bool) -> MetricMap {
        let mse = self.squared_error.get(reset);
        let pearsonr = self.pearson.get(reset);
        let spearmanr = self.spearman.get(reset);

        let mut out = MetricMap::new();
        match self.scoring {
            RegressionScoring::Mse => {
                out.insert("mse".into(), mse);
            }
            RegressionScoring::OrdinalMse => {
                out.insert("1-mse".into(), 1.0 - mse);
                out.insert("mse".into(), mse);
                out.insert("spearmanr".into(), spearmanr);
            }
            RegressionScoring::Correlation => {
                out.insert("corr".into(), (pearsonr + spearmanr) / 2.0);
                out.insert("pearsonr".into(), pearsonr);
                out.insert("spearmanr".into(), spearmanr);
            }
        }
        out
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sts_task(dir: &Path, scoring: RegressionScoring) -> RegressionTask {
        let body = "h\th\ts\na b\tc d\t5.0\ne f\tg h\t2.5\n";
        for f in ["train.tsv", "dev.tsv", "test.tsv"] {
            fs::write(dir.join(f), body).unwrap();
        }
        let spec = TsvSpec::pair(0, 1).target(2).scores(5.0).skip(1);
        let config = RegressionConfig::new(scoring)
            .split(Split::Train, "train.tsv", spec.clone())
            .split(Split::Val, "dev.tsv", spec.clone())
            .split(Split::Test, "test.tsv", spec);
        RegressionTask::new("sts-b", dir, &config, &TaskContext::whitespace(dir), &TaskOptions::new()).unwrap()
    }

    #[test]
    fn test_scores_are_scaled_numeric_labels() {
        let dir = tempfile::tempdir().unwrap();
        let task = sts_task(dir.path(), RegressionScoring::Correlation);
        let instances: Vec<_> = task
            .process_split(task.split_text(Split::Train).unwrap(), &TokenIndexer::default())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(instances[0].numeric("labels"), Some(1.0));
        assert_eq!(instances[1].numeric("labels"), Some(0.5));
    }

    #[test]
    fn test_correlation_composite() {
        let dir = tempfile::tempdir().unwrap();
        let mut task = sts_task(dir.path(), RegressionScoring::Correlation);
        assert_eq!(task.val_metric(), "sts-b_corr");
        task.update_metrics(&Predictions::Scores { predicted: vec![0.1, 0.2, 0.3], gold: vec![0.2, 0.4, 0.6] })
            .unwrap();
        let m = task.metrics(true);
        assert!((m["corr"] - 1.0).abs() < 1e-9);
        assert_eq!(task.metrics(true)["corr"], 0.0);
    }

    #[test]
    fn test_ordinal_reports_one_minus_mse() {
        let dir = tempfile::tempdir().unwrap();
        let mut task = sts_task(dir.path(), RegressionScoring::OrdinalMse);
        assert!(!task.val_metric_decreases());
        task.update_metrics(&Predictions::Scores { predicted: vec![1.0, 0.0], gold: vec![0.0, 0.0] })
            .unwrap();
        let m = task.metrics(false);
        assert_eq!(m["mse"], 0.5);
        assert_eq!(m["1-mse"], 0.5);
        assert!(m.contains_key("spearmanr"));
    }

    #[test]
    fn test_mse_decreases_and_rejects_bad_lengths() {
        let dir = tempfile::tempdir().unwrap();
        let mut task = sts_task(dir.path(), RegressionScoring::Mse);
        assert!(task.val_metric_decreases());
        assert!(task
            .update_metrics(&Predictions::Scores { predicted: vec![1.0], gold: vec![] })
            .is_err());
        assert_eq!(task.metrics(false)["mse"], 0.0);
    }
}
