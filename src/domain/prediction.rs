// ============================================================
// Layer 3 — Predictions and Metric Dictionaries
// ============================================================
// The training loop lives outside this crate. After each
// forward pass it hands the owning task a `Predictions` batch,
// and at reporting boundaries it asks for a `MetricMap`.
//
// Each task variant scores exactly one prediction shape:
//
//   Classes     classification heads (argmax ids vs gold ids)
//   Scores      regression heads
//   MultiLabel  edge probing (one binary row per target)
//   Tagged      diagnostic task: classes + per-tag row masks
//   Sequence    language modelling / seq2seq losses
//   Similarity  grounded captioning (precomputed similarity)
//
// Reference: Rust Book §6 (Enums and Pattern Matching)

use std::collections::BTreeMap;

/// metric key → value, ordered for stable printing
pub type MetricMap = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq)]
pub enum Predictions {
    Classes { predicted: Vec<i64>, gold: Vec<i64> },
    Scores { predicted: Vec<f64>, gold: Vec<f64> },
    /// Row-aligned binary label vectors, one row per target
    MultiLabel { predicted: Vec<Vec<u8>>, gold: Vec<Vec<u8>> },
    /// `masks` maps a presence field name (e.g. `lex_sem__Negation`)
    /// to one flag per row of the batch
    Tagged {
        predicted: Vec<i64>,
        gold: Vec<i64>,
        masks: BTreeMap<String, Vec<bool>>,
    },
    /// Mean negative log-likelihood of one batch
    Sequence { nll: f64, unk_ratio: Option<f64> },
    Similarity { value: f64 },
}

impl Predictions {
    /// Short name used in mismatch errors
    pub fn kind(&self) -> &'static str {
        match self {
            Predictions::Classes { .. }    => "classes",
            Predictions::Scores { .. }     => "scores",
            Predictions::MultiLabel { .. } => "multi_label",
            Predictions::Tagged { .. }     => "tagged",
            Predictions::Sequence { .. }   => "sequence",
            Predictions::Similarity { .. } => "similarity",
        }
    }
}
