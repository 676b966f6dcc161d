// ============================================================
// Layer 2 — Run Configuration
// ============================================================
// Everything the binary needs to build a TaskContext:
//
//   data_dir        root that registry paths are joined onto
//   max_seq_len     token cap per sentence, sentinels included
//   tokenizer_file  HuggingFace tokenizer.json; None → whitespace
//   tokenizer_name  identifier used in retokenized file names
//
// Read from a JSON file when one is given, then overridden
// field by field by whatever flags were passed on the command
// line. Missing JSON fields fall back to the defaults.
//
// Reference: Rust Book §5 (Structs), serde docs (#[serde(default)])

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};
use tracing::debug;

use crate::infra::tokenizer::load_tokenizer;
use crate::tasks::{context::DEFAULT_MAX_SEQ_LEN, TaskContext};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub data_dir:       PathBuf,
    pub max_seq_len:    usize,
    pub tokenizer_file: Option<PathBuf>,
    pub tokenizer_name: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            data_dir:       PathBuf::from("data"),
            max_seq_len:    DEFAULT_MAX_SEQ_LEN,
            tokenizer_file: None,
            tokenizer_name: None,
        }
    }
}

/// Flags that replace config-file values when present
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub data_dir:       Option<PathBuf>,
    pub max_seq_len:    Option<usize>,
    pub tokenizer_file: Option<PathBuf>,
    pub tokenizer_name: Option<String>,
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read config '{}'", path.display()))?;
        let config: RunConfig = serde_json::from_str(&text)
            .with_context(|| format!("Invalid config JSON in '{}'", path.display()))?;
        debug!("Loaded run config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    /// Config file if given, defaults otherwise, then the overrides
    pub fn resolve(path: Option<&Path>, overrides: RunOverrides) -> Result<Self> {
        let base = match path {
            Some(p) => Self::load(p)?,
            None => Self::default(),
        };
        Ok(base.with_overrides(overrides))
    }

    pub fn with_overrides(mut self, o: RunOverrides) -> Self {
        if let Some(dir) = o.data_dir {
            self.data_dir = dir;
        }
        if let Some(n) = o.max_seq_len {
            self.max_seq_len = n;
        }
        if o.tokenizer_file.is_some() {
            self.tokenizer_file = o.tokenizer_file;
        }
        if o.tokenizer_name.is_some() {
            self.tokenizer_name = o.tokenizer_name;
        }
        self
    }

    pub fn task_context(&self) -> Result<TaskContext> {
        let tokenizer = load_tokenizer(self.tokenizer_file.as_deref(), self.tokenizer_name.as_deref())?;
        Ok(TaskContext::new(self.data_dir.clone(), self.max_seq_len, tokenizer))
    }
}
