// ============================================================
// Layer 5 — Task Registry
// ============================================================
// Maps a task name to everything needed to build it:
//
//   name → (definition, data-dir-relative path, default options)
//
// The table is assembled once by a `RegistryBuilder` and then
// frozen into a `TaskRegistry`; nothing can register into it
// afterwards. The built-in table lives in `catalogue.rs`;
// callers that need extra tasks build their own registry,
// optionally starting from the catalogue.
//
// Reference: Rust Book §8 (BTreeMap), §17 (Trait Objects)

use anyhow::{Context, Result};
use std::{collections::BTreeMap, path::Path};
use tracing::{debug, info};

use crate::domain::error::TaskError;
use crate::tasks::{
    catalogue,
    classification::{ClassificationConfig, ClassificationTask},
    diagnostic::DiagnosticTask,
    edge::EdgeProbingTask,
    grounded::{CaptionSource, GroundedTask},
    lm::{LanguageModelingTask, LmCorpus},
    regression::{RegressionConfig, RegressionTask},
    seq2seq::{Seq2SeqFormat, Seq2SeqTask},
    streaming_pair::{PairFormat, PairObjective, StreamingPairTask},
    tagging::{TaggingConfig, TaggingTask},
    Task, TaskContext, TaskOptions,
};

/// Hand-written constructor for tasks outside the built-in variants
pub type TaskConstructor = fn(&str, &Path, &TaskContext, &TaskOptions) -> Result<Box<dyn Task>>;

// ─── TaskDefinition ───────────────────────────────────────────────────────────
/// Which variant a registered name builds, with its fixed layout
#[derive(Debug, Clone)]
pub enum TaskDefinition {
    Classification(ClassificationConfig),
    Regression(RegressionConfig),
    Tagging(TaggingConfig),
    EdgeProbing,
    LanguageModeling(LmCorpus),
    Seq2Seq(Seq2SeqFormat),
    StreamingPair { format: PairFormat, objective: PairObjective },
    Diagnostic,
    Grounded(CaptionSource),
    Custom(TaskConstructor),
}

impl TaskDefinition {
    pub fn kind_name(&self) -> &'static str {
        match self {
            TaskDefinition::Classification(_)    => "classification",
            TaskDefinition::Regression(_)        => "regression",
            TaskDefinition::Tagging(_)           => "tagging",
            TaskDefinition::EdgeProbing          => "edge_probing",
            TaskDefinition::LanguageModeling(_)  => "language_modeling",
            TaskDefinition::Seq2Seq(_)           => "seq2seq",
            TaskDefinition::StreamingPair { .. } => "streaming_pair",
            TaskDefinition::Diagnostic           => "diagnostic",
            TaskDefinition::Grounded(_)          => "grounded",
            TaskDefinition::Custom(_)            => "custom",
        }
    }

    pub fn construct(
        &self,
        name: &str,
        dir: &Path,
        ctx: &TaskContext,
        opts: &TaskOptions,
    ) -> Result<Box<dyn Task>> {
        Ok(match self {
            TaskDefinition::Classification(config) => {
                Box::new(ClassificationTask::new(name, dir, config, ctx, opts)?)
            }
            TaskDefinition::Regression(config) => Box::new(RegressionTask::new(name, dir, config, ctx, opts)?),
            TaskDefinition::Tagging(config)    => Box::new(TaggingTask::new(name, dir, config, ctx, opts)?),
            TaskDefinition::EdgeProbing        => Box::new(EdgeProbingTask::new(name, dir, ctx, opts)?),
            TaskDefinition::LanguageModeling(corpus) => {
                Box::new(LanguageModelingTask::new(name, dir, *corpus, ctx, opts)?)
            }
            TaskDefinition::Seq2Seq(format) => Box::new(Seq2SeqTask::new(name, dir, *format, ctx, opts)?),
            TaskDefinition::StreamingPair { format, objective } => {
                Box::new(StreamingPairTask::new(name, dir, *format, *objective, ctx, opts)?)
            }
            TaskDefinition::Diagnostic       => Box::new(DiagnosticTask::new(name, dir, ctx, opts)?),
            TaskDefinition::Grounded(source) => Box::new(GroundedTask::new(name, dir, *source, ctx, opts)?),
            TaskDefinition::Custom(build)    => build(name, dir, ctx, opts)?,
        })
    }
}

// ─── RegistryEntry ────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub name: String,
    /// Directory under the data root, e.g. `MNLI/`
    pub rel_path: String,
    pub definition: TaskDefinition,
    pub options: TaskOptions,
}

// ─── RegistryBuilder ──────────────────────────────────────────────────────────
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entries: BTreeMap<String, RegistryEntry>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing registry's entries
    pub fn extend_from(mut self, registry: &TaskRegistry) -> Self {
        self.entries.extend(registry.entries.clone());
        self
    }

    /// Register a name; a later registration of the same name replaces it
    pub fn register(
        &mut self,
        name: &str,
        rel_path: &str,
        definition: TaskDefinition,
        options: TaskOptions,
    ) -> &mut Self {
        let entry = RegistryEntry {
            name: name.to_string(),
            rel_path: rel_path.to_string(),
            definition,
            options,
        };
        if self.entries.insert(name.to_string(), entry).is_some() {
            debug!("Task '{}' re-registered; keeping the latest entry", name);
        }
        self
    }

    pub fn build(self) -> TaskRegistry {
        TaskRegistry { entries: self.entries }
    }
}

// ─── TaskRegistry ─────────────────────────────────────────────────────────────
/// Frozen name → entry table
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    entries: BTreeMap<String, RegistryEntry>,
}

impl TaskRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Every built-in task
    pub fn builtin() -> Self {
        catalogue::builtin()
    }

    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build a task with its registered options
    pub fn create(&self, name: &str, ctx: &TaskContext) -> Result<Box<dyn Task>> {
        self.create_with(name, ctx, &TaskOptions::default())
    }

    /// Build a task; options set in `overrides` win over the registered ones
    pub fn create_with(&self, name: &str, ctx: &TaskContext, overrides: &TaskOptions) -> Result<Box<dyn Task>> {
        let entry = self
            .get(name)
            .ok_or_else(|| TaskError::UnknownTask(name.to_string()))?;
        let dir = ctx.data_dir.join(&entry.rel_path);
        let opts = overrides.merged_over(&entry.options);

        info!("Creating task '{}' ({}) from {}", name, entry.definition.kind_name(), dir.display());
        entry
            .definition
            .construct(name, &dir, ctx, &opts)
            .with_context(|| format!("Failed to construct task '{}'", name))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tsv::TsvSpec;
    use crate::domain::split::Split;
    use crate::tasks::grounded::GroundedTask;
    use std::fs;

    fn tiny_registry() -> TaskRegistry {
        let spec = TsvSpec::single(0).target(1);
        let mut builder = TaskRegistry::builder();
        builder
            .register(
                "tiny",
                "old/",
                TaskDefinition::Classification(ClassificationConfig::new(2).all_splits("a.tsv", "a.tsv", "a.tsv", spec.clone())),
                TaskOptions::new(),
            )
            .register(
                "tiny",
                "Tiny/",
                TaskDefinition::Classification(ClassificationConfig::new(2).all_splits("a.tsv", "a.tsv", "a.tsv", spec)),
                TaskOptions::new(),
            );
        builder.build()
    }

    #[test]
    fn test_unknown_task_is_typed_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = TaskContext::whitespace(dir.path());
        let err = tiny_registry().create("nope", &ctx).err().unwrap();
        assert_eq!(err.downcast_ref::<TaskError>(), Some(&TaskError::UnknownTask("nope".into())));
    }

    #[test]
    fn test_last_registration_wins_and_path_is_joined() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("Tiny")).unwrap();
        fs::write(dir.path().join("Tiny/a.tsv"), "good movie\t1\nbad movie\t0\n").unwrap();

        let registry = tiny_registry();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("tiny").unwrap().rel_path, "Tiny/");

        let task = registry.create("tiny", &TaskContext::whitespace(dir.path())).unwrap();
        assert_eq!(task.name(), "tiny");
        assert_eq!(task.count_examples().unwrap()[&Split::Train], 2);
    }

    fn build_custom(name: &str, dir: &Path, ctx: &TaskContext, opts: &TaskOptions) -> Result<Box<dyn Task>> {
        Ok(Box::new(GroundedTask::new(name, dir, CaptionSource::ShapeWorld, ctx, opts)?))
    }

    #[test]
    fn test_custom_constructor_and_option_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let sw = dir.path().join("sw/shapeworld");
        fs::create_dir_all(&sw).unwrap();
        for split in ["train", "val", "test"] {
            fs::write(sw.join(format!("{split}.tsv")), "a circle\t1\t3\n").unwrap();
        }

        let mut builder = TaskRegistry::builder();
        builder.register("custom", "sw/", TaskDefinition::Custom(build_custom), TaskOptions::new());
        let registry = builder.extend_from(&TaskRegistry::default()).build();

        let ctx = TaskContext::whitespace(dir.path());
        let task = registry.create_with("custom", &ctx, &TaskOptions::new().n_classes(4)).unwrap();
        assert_eq!(task.val_metric(), "custom_metric");
        assert_eq!(registry.get("custom").unwrap().definition.kind_name(), "custom");
    }

    #[test]
    fn test_construction_failure_names_the_task() {
        let dir = tempfile::tempdir().unwrap();
        let err = tiny_registry().create("tiny", &TaskContext::whitespace(dir.path())).err().unwrap();
        assert!(err.to_string().contains("tiny"));
    }
}
