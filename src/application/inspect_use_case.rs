// ============================================================
// Layer 2 — Inspect Use Case
// ============================================================
// Builds one task from the registry and reports on it without
// training anything:
//
//   Step 1: Construct the task        (Layer 5 - registry)
//   Step 2: Count examples per split  (Layer 5 - task)
//   Step 3: Read the initial metrics  (Layer 6 - aggregators)
//   Step 4: Pull the first N instances of one split
//
// `vocab` walks the task's vocabulary sentences (train + val)
// and ranks tokens by frequency.
//
// Reference: Rust Book §13 (Iterators and Closures)

use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

use crate::domain::{instance::{Instance, TokenIndexer}, prediction::MetricMap, split::Split};
use crate::tasks::{ExampleCounts, Task, TaskContext, TaskKind, TaskOptions, TaskRegistry};

/// Everything `inspect` prints, serialisable as one JSON document
#[derive(Debug, Serialize)]
pub struct InspectReport {
    pub task:                 String,
    pub kind:                 TaskKind,
    pub input_arity:          usize,
    pub n_classes:            usize,
    pub val_metric:           String,
    pub val_metric_decreases: bool,
    pub counts:               ExampleCounts,
    pub metrics:              MetricMap,
    pub split:                Split,
    pub instances:            Vec<Instance>,
}

pub struct InspectUseCase<'r> {
    registry:  &'r TaskRegistry,
    ctx:       TaskContext,
    overrides: TaskOptions,
}

impl<'r> InspectUseCase<'r> {
    pub fn new(registry: &'r TaskRegistry, ctx: TaskContext) -> Self {
        Self { registry, ctx, overrides: TaskOptions::default() }
    }

    /// Options that win over the registered ones
    pub fn with_overrides(mut self, overrides: TaskOptions) -> Self {
        self.overrides = overrides;
        self
    }

    fn build(&self, name: &str) -> Result<Box<dyn Task>> {
        self.registry.create_with(name, &self.ctx, &self.overrides)
    }

    pub fn inspect(&self, name: &str, split: Split, show: usize) -> Result<InspectReport> {
        let mut task = self.build(name)?;
        let counts = task.count_examples()?;
        info!("{}: {:?}", name, counts);

        let instances = task
            .process_split(task.split_text(split)?, &TokenIndexer::default())?
            .take(show)
            .collect::<Result<Vec<_>>>()?;

        let metrics = task.metrics(false);
        Ok(InspectReport {
            task:                 task.name().to_string(),
            kind:                 task.kind(),
            input_arity:          task.input_arity(),
            n_classes:            task.n_classes(),
            val_metric:           task.val_metric(),
            val_metric_decreases: task.val_metric_decreases(),
            counts,
            metrics,
            split,
            instances,
        })
    }

    /// The `top` most frequent tokens with their counts
    pub fn vocab(&self, name: &str, top: usize) -> Result<Vec<(String, usize)>> {
        let task = self.build(name)?;
        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut sentences = 0usize;
        for sentence in task.sentences()? {
            sentences += 1;
            for tok in sentence? {
                *counts.entry(tok).or_default() += 1;
            }
        }
        info!("{}: {} sentences, {} distinct tokens", name, sentences, counts.len());
        Ok(rank_tokens(counts, top))
    }
}

/// Highest count first; equal counts in token order
fn rank_tokens(counts: HashMap<String, usize>, top: usize) -> Vec<(String, usize)> {
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(top);
    ranked
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tsv::TsvSpec;
    use crate::tasks::{classification::ClassificationConfig, TaskDefinition};
    use std::fs;

    fn toy_registry(dir: &std::path::Path) -> TaskRegistry {
        fs::write(dir.join("train.tsv"), "the cat sat\t1\nthe dog\t0\n").unwrap();
        fs::write(dir.join("dev.tsv"), "a cat\t1\n").unwrap();
        fs::write(dir.join("test.tsv"), "secret words\t0\n").unwrap();
        let config = ClassificationConfig::new(2).all_splits("train.tsv", "dev.tsv", "test.tsv", TsvSpec::single(0).target(1));
        let mut builder = TaskRegistry::builder();
        builder.register("toy", "", TaskDefinition::Classification(config), TaskOptions::new());
        builder.build()
    }

    #[test]
    fn test_inspect_reports_counts_metrics_and_instances() {
        let dir = tempfile::tempdir().unwrap();
        let registry = toy_registry(dir.path());
        let use_case = InspectUseCase::new(&registry, TaskContext::whitespace(dir.path()));

        let report = use_case.inspect("toy", Split::Train, 1).unwrap();
        assert_eq!(report.val_metric, "toy_accuracy");
        assert_eq!(report.counts[&Split::Train], 2);
        assert_eq!(report.metrics["accuracy"], 0.0);
        assert_eq!(report.instances.len(), 1);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["kind"], "classification");
        assert_eq!(json["counts"]["val"], 1);
    }

    #[test]
    fn test_vocab_ranks_train_and_val_tokens_only() {
        let dir = tempfile::tempdir().unwrap();
        let registry = toy_registry(dir.path());
        let use_case = InspectUseCase::new(&registry, TaskContext::whitespace(dir.path()));

        let top = use_case.vocab("toy", 100).unwrap();
        // three sentences, each wrapped in sentinels
        assert_eq!(top[0], ("<EOS>".to_string(), 3));
        assert_eq!(top[1], ("<SOS>".to_string(), 3));
        assert!(top.contains(&("cat".to_string(), 2)));
        assert!(!top.iter().any(|(tok, _)| tok == "secret"));
    }

    #[test]
    fn test_unknown_task_fails() {
        let dir = tempfile::tempdir().unwrap();
        let registry = toy_registry(dir.path());
        let use_case = InspectUseCase::new(&registry, TaskContext::whitespace(dir.path()));
        assert!(use_case.inspect("missing", Split::Val, 3).is_err());
    }
}
