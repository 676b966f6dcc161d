// ============================================================
// Layer 3 — Typed Task Errors
// ============================================================
// Most failures in this crate are I/O or parse failures that
// travel as anyhow::Error with context attached. The variants
// below are the ones a caller may want to match on, so they
// get their own type and can be recovered with
// `err.downcast_ref::<TaskError>()`.
//
// Reference: Rust Book §9 (Error Handling)

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TaskError {
    /// A registration is missing a construction option it needs
    #[error("task '{task}' requires option '{option}'")]
    MissingOption { task: String, option: String },

    #[error("no task registered under '{0}'")]
    UnknownTask(String),

    #[error("unknown split '{0}' (expected train, val or test)")]
    UnknownSplit(String),

    #[error("task '{task}' has no data for split '{split}'")]
    MissingSplit { task: String, split: String },

    /// Operation the task variant does not provide
    #[error("task '{task}' does not support {operation}")]
    Unsupported { task: String, operation: String },

    #[error("prediction mismatch: {0}")]
    PredictionMismatch(String),
}

impl TaskError {
    pub fn missing_option(task: impl Into<String>, option: impl Into<String>) -> Self {
        Self::MissingOption { task: task.into(), option: option.into() }
    }

    pub fn missing_split(task: impl Into<String>, split: impl ToString) -> Self {
        Self::MissingSplit { task: task.into(), split: split.to_string() }
    }

    pub fn unsupported(task: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Unsupported { task: task.into(), operation: operation.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_task() {
        let e = TaskError::missing_option("edges-srl-conll2005", "label_file");
        assert_eq!(
            e.to_string(),
            "task 'edges-srl-conll2005' requires option 'label_file'"
        );
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = TaskError::UnknownTask("nope".into()).into();
        assert_eq!(
            err.downcast_ref::<TaskError>(),
            Some(&TaskError::UnknownTask("nope".into()))
        );
    }
}
