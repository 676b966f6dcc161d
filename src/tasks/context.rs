// ============================================================
// Layer 5 — Task Construction Context
// ============================================================
// Two inputs reach every task constructor:
//
//   TaskContext  process-wide: data root, max sequence length,
//                the active tokenizer
//   TaskOptions  per registration: the extra arguments a
//                catalogue entry passes (label file, genre, ...)
//
// Reference: serde docs (#[serde(default)]), Rust Book §15 (Arc)

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

use crate::domain::{error::TaskError, split::Split, traits::SentenceTokenizer};
use crate::infra::tokenizer::WhitespaceTokenizer;

pub const DEFAULT_MAX_SEQ_LEN: usize = 40;

#[derive(Clone)]
pub struct TaskContext {
    pub data_dir: PathBuf,
    pub max_seq_len: usize,
    pub tokenizer: Arc<dyn SentenceTokenizer>,
}

impl TaskContext {
    pub fn new(data_dir: impl Into<PathBuf>, max_seq_len: usize, tokenizer: Arc<dyn SentenceTokenizer>) -> Self {
        Self { data_dir: data_dir.into(), max_seq_len, tokenizer }
    }

    /// Whitespace tokenizer, default length
    pub fn whitespace(data_dir: impl Into<PathBuf>) -> Self {
        Self::new(data_dir, DEFAULT_MAX_SEQ_LEN, Arc::new(WhitespaceTokenizer))
    }

    pub fn tokenizer(&self) -> &dyn SentenceTokenizer {
        self.tokenizer.as_ref()
    }
}

impl std::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("data_dir", &self.data_dir)
            .field("max_seq_len", &self.max_seq_len)
            .field("tokenizer", &self.tokenizer.name())
            .finish()
    }
}

// ─── SimilarityMetric ─────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    #[default]
    AbsDiff,
    Cosine,
}

// ─── TaskOptions ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskOptions {
    /// Label vocabulary file, relative to the task directory
    pub label_file: Option<String>,
    pub files_by_split: Option<BTreeMap<Split, String>>,
    /// Both spans share one projection (recorded for the model)
    pub is_symmetric: bool,
    /// Targets carry only span1
    pub single_sided: bool,
    pub max_targ_v_size: Option<usize>,
    /// Keep only rows of this MNLI genre
    pub genre: Option<String>,
    /// File-name stem for DisSent corpora
    pub prefix: Option<String>,
    /// Replacement validation file for NLI probing
    pub probe_path: Option<String>,
    pub n_classes: Option<usize>,
    pub similarity: SimilarityMetric,
}

impl TaskOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label_file(mut self, file: impl Into<String>) -> Self {
        self.label_file = Some(file.into());
        self
    }

    pub fn files(mut self, train: &str, val: &str, test: &str) -> Self {
        self.files_by_split = Some(
            [(Split::Train, train), (Split::Val, val), (Split::Test, test)]
                .into_iter()
                .map(|(s, f)| (s, f.to_string()))
                .collect(),
        );
        self
    }

    pub fn single_sided(mut self) -> Self {
        self.single_sided = true;
        self
    }

    pub fn symmetric(mut self) -> Self {
        self.is_symmetric = true;
        self
    }

    pub fn max_targ_v_size(mut self, n: usize) -> Self {
        self.max_targ_v_size = Some(n);
        self
    }

    pub fn genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn probe_path(mut self, path: impl Into<String>) -> Self {
        self.probe_path = Some(path.into());
        self
    }

    pub fn n_classes(mut self, n: usize) -> Self {
        self.n_classes = Some(n);
        self
    }

    pub fn similarity(mut self, metric: SimilarityMetric) -> Self {
        self.similarity = metric;
        self
    }

    /// Options set on top of `self` win over `base`
    pub fn merged_over(&self, base: &TaskOptions) -> TaskOptions {
        TaskOptions {
            label_file:      self.label_file.clone().or_else(|| base.label_file.clone()),
            files_by_split:  self.files_by_split.clone().or_else(|| base.files_by_split.clone()),
            is_symmetric:    self.is_symmetric || base.is_symmetric,
            single_sided:    self.single_sided || base.single_sided,
            max_targ_v_size: self.max_targ_v_size.or(base.max_targ_v_size),
            genre:           self.genre.clone().or_else(|| base.genre.clone()),
            prefix:          self.prefix.clone().or_else(|| base.prefix.clone()),
            probe_path:      self.probe_path.clone().or_else(|| base.probe_path.clone()),
            n_classes:       self.n_classes.or(base.n_classes),
            similarity:      if self.similarity != SimilarityMetric::default() {
                self.similarity
            } else {
                base.similarity
            },
        }
    }

    pub fn require_label_file(&self, task: &str) -> Result<&str, TaskError> {
        self.label_file
            .as_deref()
            .ok_or_else(|| TaskError::missing_option(task, "label_file"))
    }

    pub fn require_files(&self, task: &str) -> Result<&BTreeMap<Split, String>, TaskError> {
        self.files_by_split
            .as_ref()
            .ok_or_else(|| TaskError::missing_option(task, "files_by_split"))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_deserialize_with_defaults() {
        let opts: TaskOptions = serde_json::from_str(
            r#"{"label_file": "labels.txt", "files_by_split": {"train": "a.json", "val": "b.json"}}"#,
        )
        .unwrap();
        assert_eq!(opts.label_file.as_deref(), Some("labels.txt"));
        assert_eq!(opts.files_by_split.unwrap()[&Split::Val], "b.json");
        assert!(!opts.single_sided);
        assert_eq!(opts.similarity, SimilarityMetric::AbsDiff);
    }

    #[test]
    fn test_missing_options_are_typed_errors() {
        let opts = TaskOptions::new();
        assert_eq!(
            opts.require_label_file("edges-dpr"),
            Err(TaskError::missing_option("edges-dpr", "label_file"))
        );
        assert!(opts.require_files("edges-dpr").is_err());
    }

    #[test]
    fn test_merge_prefers_overrides() {
        let base = TaskOptions::new().genre("fiction").n_classes(3);
        let over = TaskOptions::new().n_classes(2);
        let merged = over.merged_over(&base);
        assert_eq!(merged.n_classes, Some(2));
        assert_eq!(merged.genre.as_deref(), Some("fiction"));
    }
}
