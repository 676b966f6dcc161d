// ============================================================
// Layer 6 — Sentence Tokenizers
// ============================================================
// Every task turns raw text into a bounded, sentinel-wrapped
// token list through `process_sentence`:
//
//   "the cat sat"  --tokenize-->  [the, cat, sat]
//                  --truncate-->  keep max_seq_len - 2 tokens
//                  --wrap----->   [<SOS>, the, cat, sat, <EOS>]
//
// Two tokenizers are provided:
//   - WhitespaceTokenizer  splits on whitespace (name "WhitespaceTokenizer")
//   - PretrainedTokenizer  wraps a HuggingFace tokenizer.json file
//
// The tokenizer's name is what span-probing tasks append to
// their file names (`*.retokenized.{name}`).
//
// Reference: Rust Book §10 (Traits), §15 (Smart Pointers: Arc)

use anyhow::Result;
use std::{path::Path, sync::Arc};
use tokenizers::Tokenizer;

use crate::domain::traits::SentenceTokenizer;

pub const SOS_TOK: &str = "<SOS>";
pub const EOS_TOK: &str = "<EOS>";

/// Target-side sentinels for sequence-to-sequence tasks
pub const START_SYMBOL: &str = "@start@";
pub const END_SYMBOL: &str = "@end@";

/// Unknown-token spelling used by vocabulary files
pub const UNK_TOK_ALLENNLP: &str = "@@UNKNOWN@@";
/// An unknown-token spelling no tokenizer will split
pub const UNK_TOK_ATOMIC: &str = "UNKNOWN";

// ─── Sentinels ────────────────────────────────────────────────────────────────
/// Start/end markers wrapped around a processed sentence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sentinels {
    pub start: &'static str,
    pub end: &'static str,
}

impl Sentinels {
    /// `<SOS>` / `<EOS>` for model inputs
    pub const INPUT: Sentinels = Sentinels { start: SOS_TOK, end: EOS_TOK };

    /// `@start@` / `@end@` for decoder targets
    pub const TARGET: Sentinels = Sentinels { start: START_SYMBOL, end: END_SYMBOL };
}

impl Default for Sentinels {
    fn default() -> Self {
        Sentinels::INPUT
    }
}

/// Tokenize, keep at most `max_seq_len - 2` tokens and wrap with sentinels
pub fn process_sentence(
    tokenizer: &dyn SentenceTokenizer,
    text: &str,
    max_seq_len: usize,
    sentinels: Sentinels,
) -> Result<Vec<String>> {
    let tokens = tokenizer.tokenize(text)?;
    Ok(wrap_tokens(tokens, max_seq_len, sentinels))
}

/// Truncate an already tokenized sentence and wrap it
pub fn wrap_tokens(tokens: Vec<String>, max_seq_len: usize, sentinels: Sentinels) -> Vec<String> {
    let keep = max_seq_len.saturating_sub(2);
    let mut out = Vec::with_capacity(keep.min(tokens.len()) + 2);
    out.push(sentinels.start.to_string());
    out.extend(tokens.into_iter().take(keep));
    out.push(sentinels.end.to_string());
    out
}

/// Tokenize while protecting multi-character unknown-token markers.
///
/// Every spelling in `nonatomic` is rewritten to `atomic` before
/// tokenizing; afterwards each `atomic` token is replaced by the
/// first spelling in `nonatomic`.
pub fn atomic_tokenize(
    tokenizer: &dyn SentenceTokenizer,
    text: &str,
    atomic: &str,
    nonatomic: &[&str],
    max_seq_len: usize,
) -> Result<Vec<String>> {
    let mut rewritten = text.to_string();
    for tok in nonatomic {
        rewritten = rewritten.replace(tok, atomic);
    }
    let tokens = process_sentence(tokenizer, &rewritten, max_seq_len, Sentinels::INPUT)?;

    let Some(first) = nonatomic.first() else {
        return Ok(tokens);
    };
    Ok(tokens
        .into_iter()
        .map(|t| if t == atomic { first.to_string() } else { t })
        .collect())
}

// ─── WhitespaceTokenizer ──────────────────────────────────────────────────────
#[derive(Debug, Clone, Default)]
pub struct WhitespaceTokenizer;

impl SentenceTokenizer for WhitespaceTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        Ok(text.split_whitespace().map(String::from).collect())
    }

    fn name(&self) -> &str {
        "WhitespaceTokenizer"
    }
}

// ─── PretrainedTokenizer ──────────────────────────────────────────────────────
/// A HuggingFace tokenizer loaded from a `tokenizer.json` file
pub struct PretrainedTokenizer {
    inner: Tokenizer,
    name: String,
}

impl PretrainedTokenizer {
    pub fn from_file(path: impl AsRef<Path>, name: impl Into<String>) -> Result<Self> {
        let path = path.as_ref();
        let inner = Tokenizer::from_file(path).map_err(|e| {
            anyhow::anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e)
        })?;
        let name = name.into();
        tracing::info!("Loaded tokenizer '{}' from {}", name, path.display());
        Ok(Self { inner, name })
    }
}

impl SentenceTokenizer for PretrainedTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;
        Ok(encoding.get_tokens().to_vec())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Build the tokenizer a run is configured with.
/// No file → whitespace splitting.
pub fn load_tokenizer(
    file: Option<&Path>,
    name: Option<&str>,
) -> Result<Arc<dyn SentenceTokenizer>> {
    match file {
        Some(path) => {
            let name = match name {
                Some(n) => n.to_string(),
                None => path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "pretrained".to_string()),
            };
            Ok(Arc::new(PretrainedTokenizer::from_file(path, name)?))
        }
        None => Ok(Arc::new(WhitespaceTokenizer)),
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    /// Splits on whitespace and also breaks `@@X@@` into pieces,
    /// the way subword tokenizers mangle unknown markers
    struct SplittingTokenizer;

    impl SentenceTokenizer for SplittingTokenizer {
        fn tokenize(&self, text: &str) -> Result<Vec<String>> {
            Ok(text
                .split_whitespace()
                .flat_map(|w| {
                    if w.starts_with("@@") {
                        vec!["@@".to_string(), w.trim_matches('@').to_string(), "@@".to_string()]
                    } else if w.starts_with('<') {
                        vec!["<".to_string(), w.trim_matches(|c| c == '<' || c == '>').to_string(), ">".to_string()]
                    } else {
                        vec![w.to_string()]
                    }
                })
                .collect())
        }

        fn name(&self) -> &str {
            "splitting"
        }
    }

    #[test]
    fn test_process_sentence_wraps_and_truncates() {
        let toks = process_sentence(&WhitespaceTokenizer, "a b c d e", 5, Sentinels::INPUT).unwrap();
        assert_eq!(toks, vec!["<SOS>", "a", "b", "c", "<EOS>"]);
    }

    #[test]
    fn test_target_sentinels() {
        let toks = process_sentence(&WhitespaceTokenizer, "x", 10, Sentinels::TARGET).unwrap();
        assert_eq!(toks, vec!["@start@", "x", "@end@"]);
    }

    #[test]
    fn test_tiny_max_len_keeps_only_sentinels() {
        let toks = wrap_tokens(vec!["a".into()], 1, Sentinels::INPUT);
        assert_eq!(toks, vec!["<SOS>", "<EOS>"]);
    }

    #[test]
    fn test_atomic_tokenize_restores_first_spelling() {
        let toks = atomic_tokenize(
            &SplittingTokenizer,
            "the <unk> and @@UNKNOWN@@ cat",
            UNK_TOK_ATOMIC,
            &[UNK_TOK_ALLENNLP, "<unk>"],
            64,
        )
        .unwrap();
        assert_eq!(
            toks,
            vec!["<SOS>", "the", "@@UNKNOWN@@", "and", "@@UNKNOWN@@", "cat", "<EOS>"]
        );
    }

    #[test]
    fn test_default_tokenizer_is_whitespace() {
        let tok = load_tokenizer(None, None).unwrap();
        assert_eq!(tok.name(), "WhitespaceTokenizer");
    }
}
