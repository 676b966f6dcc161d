// ============================================================
// Layer 3 — Edge Probing Record
// ============================================================
// One JSON line of a span/edge probing dataset:
//
//   {"text": "The cat sat .",
//    "targets": [{"span1": [0, 2], "span2": [2, 3], "label": "ARG0"},
//                {"span1": [2, 3],                  "label": ["a", "b"]}]}
//
// Spans are half-open token intervals [start, end) over the
// whitespace-split `text`. A label may be a single string or a
// list; both become a LabelSet so downstream code sees one shape.
//
// Unknown keys are preserved in `extra` so records can be
// written back out with predictions merged in.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::domain::error::TaskError;

// ─── TokenSpan ────────────────────────────────────────────────────────────────
/// Half-open token interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[usize; 2]", into = "[usize; 2]")]
pub struct TokenSpan {
    pub start: usize,
    pub end: usize,
}

impl TokenSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

impl From<[usize; 2]> for TokenSpan {
    fn from([start, end]: [usize; 2]) -> Self {
        Self { start, end }
    }
}

impl From<TokenSpan> for [usize; 2] {
    fn from(s: TokenSpan) -> Self {
        [s.start, s.end]
    }
}

// ─── LabelSet ─────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawLabel {
    One(String),
    Many(Vec<String>),
}

/// One or more string labels attached to a target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawLabel", into = "Vec<String>")]
pub struct LabelSet(pub Vec<String>);

impl From<RawLabel> for LabelSet {
    fn from(raw: RawLabel) -> Self {
        match raw {
            RawLabel::One(label)   => LabelSet(vec![label]),
            RawLabel::Many(labels) => LabelSet(labels),
        }
    }
}

impl From<LabelSet> for Vec<String> {
    fn from(set: LabelSet) -> Self {
        set.0
    }
}

// ─── EdgeTarget / EdgeRecord ──────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeTarget {
    pub span1: TokenSpan,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span2: Option<TokenSpan>,
    pub label: LabelSet,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub preds: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub text: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub targets: Vec<EdgeTarget>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub preds: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn null_as_empty<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(d)?.unwrap_or_default())
}

impl EdgeRecord {
    /// Whitespace tokens of the (already tokenized) text
    pub fn tokens(&self) -> Vec<String> {
        self.text.split_whitespace().map(String::from).collect()
    }

    pub fn has_targets(&self) -> bool {
        !self.targets.is_empty()
    }

    /// Merge predictions into the record in place.
    ///
    /// List-valued predictions must align with `targets` and are
    /// attached to the corresponding target; anything else is
    /// attached to the record itself. Previous predictions are cleared.
    pub fn merge_predictions(&mut self, preds: Map<String, Value>) -> Result<(), TaskError> {
        self.preds.clear();
        for target in &mut self.targets {
            target.preds.clear();
        }

        for (key, val) in preds {
            match val {
                Value::Array(items) => {
                    if items.len() != self.targets.len() {
                        return Err(TaskError::PredictionMismatch(format!(
                            "prediction '{key}' has {} entries for {} targets",
                            items.len(),
                            self.targets.len()
                        )));
                    }
                    for (target, item) in self.targets.iter_mut().zip(items) {
                        target.preds.insert(key.clone(), item);
                    }
                }
                other => {
                    self.preds.insert(key, other);
                }
            }
        }
        Ok(())
    }
}
