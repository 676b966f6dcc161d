// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// The external collaborators the task layer calls into:
//
//   tokenizer.rs — Sentence tokenization
//                  `process_sentence` bounds and wraps every
//                  sentence; a whitespace tokenizer is the
//                  default and a HuggingFace tokenizer.json
//                  can be loaded instead. The tokenizer's name
//                  selects retokenized span-probing files.
//
//   metrics.rs   — Metric aggregators
//                  Accuracy, F1, correlations and running
//                  averages with accumulate / get / reset.
//                  Tasks compose these into metric maps.
//
// Reference: Rust Book §7 (Modules)

/// Sentence tokenizers and sentinel handling
pub mod tokenizer;

/// Running metric aggregators
pub mod metrics;
