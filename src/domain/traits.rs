// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// Two seams that the task layer programs against:
//
//   SentenceTokenizer — turns raw text into tokens and names
//                       itself, so span tasks can pick the file
//                       that was retokenized with the same tool
//   Aggregator        — a running metric with update/get/reset
//
// The Task contract itself lives with the variants in
// `tasks/mod.rs` since it needs the split storage types.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)
//            Rust Book §17 (Object Oriented Patterns)

use anyhow::Result;

// ─── SentenceTokenizer ────────────────────────────────────────────────────────
/// Any component that splits a sentence into tokens.
///
/// Implementations:
///   - WhitespaceTokenizer → splits on whitespace (default)
///   - PretrainedTokenizer → HuggingFace tokenizer.json
pub trait SentenceTokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Result<Vec<String>>;

    /// Identifier embedded in retokenized file names
    fn name(&self) -> &str;
}

// ─── Aggregator ───────────────────────────────────────────────────────────────
/// A stateful running scorer.
///
/// Update methods are specific to each aggregator (they take
/// different inputs) so only the read side is shared.
pub trait Aggregator {
    type Value;

    /// Current value; the defined empty-state value if no data was seen
    fn value(&self) -> Self::Value;

    /// Zero all accumulators
    fn reset(&mut self);

    /// Read the value, then reset if asked
    fn get(&mut self, reset: bool) -> Self::Value {
        let v = self.value();
        if reset {
            self.reset();
        }
        v
    }
}
