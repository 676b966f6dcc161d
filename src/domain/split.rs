// ============================================================
// Layer 3 — Split Domain Type
// ============================================================
// One of the three named partitions of a task's dataset.
//
// Vocabulary building must never see the test partition, so
// every streaming task checks `is_test()` before reading.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::domain::error::TaskError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    /// All splits in canonical order
    pub const ALL: [Split; 3] = [Split::Train, Split::Val, Split::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val   => "val",
            Split::Test  => "test",
        }
    }

    /// True for any split whose name begins with "test"
    pub fn is_test(&self) -> bool {
        self.as_str().starts_with("test")
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Split {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "train"                      => Ok(Split::Train),
            "val" | "dev" | "validation" => Ok(Split::Val),
            "test"                       => Ok(Split::Test),
            other => Err(TaskError::UnknownSplit(other.to_string())),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_test_split_is_test() {
        assert!(Split::Test.is_test());
        assert!(!Split::Train.is_test());
        assert!(!Split::Val.is_test());
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!("dev".parse::<Split>().unwrap(), Split::Val);
        assert_eq!("Validation".parse::<Split>().unwrap(), Split::Val);
        assert!("holdout".parse::<Split>().is_err());
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Split::Val).unwrap();
        assert_eq!(json, "\"val\"");
    }
}
