// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types that every other layer speaks in terms of.
//
// Rules for this layer:
//   - NO file I/O
//   - NO tokenizer or metric implementations
//   - Only structs, enums and traits
//
// The vocabulary of the system:
//
//   Split        — train / val / test
//   Instance     — named, typed fields ready for a model
//   EdgeRecord   — one text plus span/label targets (probing tasks)
//   Predictions  — what the training loop hands back for scoring
//   TaskError    — failures a caller may want to match on
//
// Reference: Rust Book §5 (Structs), §6 (Enums), §10 (Traits)

/// Dataset partitions
pub mod split;

/// Instance and Field types
pub mod instance;

/// Span/edge probing records
pub mod record;

/// Prediction batches and metric dictionaries
pub mod prediction;

/// Tokenizer and aggregator abstractions
pub mod traits;

/// Typed errors
pub mod error;
