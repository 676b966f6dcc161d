// ============================================================
// Layer 5 — Streamed Corpora
// ============================================================
// Corpora too large to hold in memory are read one line at a
// time on every pass. The helpers here open a split file and
// hand back a boxed iterator; the file handle lives inside the
// iterator and is released when it is dropped.
//
//   sentence_stream   one sentence per line (plain or WikiText)
//   row_stream        tab-separated rows, parsed by the caller
//   Consecutive       (previous, current) pairs over any stream
//
// WikiText lines go through `atomic_tokenize` so `<unk>` and
// `@@UNKNOWN@@` survive tokenization as a single token.
//
// Reference: Rust Book §13 (Iterators), §17 (Trait Objects)

use anyhow::{bail, Result};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use crate::data::lines::{count_lines, open_lines};
use crate::domain::{split::Split, traits::SentenceTokenizer};
use crate::infra::tokenizer::{atomic_tokenize, process_sentence, Sentinels, UNK_TOK_ALLENNLP, UNK_TOK_ATOMIC};
use crate::tasks::SentenceStream;

/// Unknown-token spellings rewritten before tokenizing WikiText
pub const NONATOMIC_UNKS: [&str; 2] = [UNK_TOK_ALLENNLP, "<unk>"];

/// Absolute path of each split's file
pub type SplitFiles = BTreeMap<Split, PathBuf>;

/// Map train / val / test to files under `dir`
pub fn split_files(dir: &Path, train: &str, val: &str, test: &str) -> SplitFiles {
    [(Split::Train, train), (Split::Val, val), (Split::Test, test)]
        .into_iter()
        .map(|(s, f)| (s, dir.join(f)))
        .collect()
}

/// `{split}{ext}` for every split, e.g. `train.csv`, `val.csv`, `test.csv`
pub fn split_files_named(dir: &Path, ext: &str) -> SplitFiles {
    Split::ALL
        .into_iter()
        .map(|s| (s, dir.join(format!("{}{}", s.as_str(), ext))))
        .collect()
}

/// Fail construction if any split file is missing
pub fn require_files(task: &str, files: &SplitFiles) -> Result<()> {
    for (split, path) in files {
        if !path.is_file() {
            bail!("{}: missing {} file '{}'", task, split, path.display());
        }
    }
    Ok(())
}

/// Raw line count per split (`minus` is subtracted, saturating)
pub fn count_file_lines(files: &SplitFiles, minus: usize) -> Result<BTreeMap<Split, usize>> {
    files
        .iter()
        .map(|(split, path)| Ok((*split, count_lines(path)?.saturating_sub(minus))))
        .collect()
}

// ─── Sentence streams ─────────────────────────────────────────────────────────
/// How each line of a sentence file is tokenized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineFormat {
    /// `process_sentence` with input sentinels
    Plain,
    /// Atomic unknown tokens; optionally drop header / markup lines
    WikiText { drop_markup: bool },
}

/// Section headers like ` = = Early life = = `
pub fn is_markup_line(text: &str) -> bool {
    text.matches('=').count() >= 2 || text.chars().count() < 2
}

/// One tokenized sentence per non-empty line of `path`.
///
/// The file is opened here and read lazily; read errors are
/// yielded with the file name attached.
pub fn sentence_stream<'a>(
    path: &Path,
    tokenizer: &'a dyn SentenceTokenizer,
    max_seq_len: usize,
    format: LineFormat,
) -> Result<SentenceStream<'a>> {
    let lines = open_lines(path)?;
    let source = path.to_path_buf();
    Ok(Box::new(lines.filter_map(move |line| {
        let line = match line {
            Ok(line) => line,
            Err(e) => return Some(Err(e.context(format!("Read error in '{}'", source.display())))),
        };
        let text = line.trim();
        if text.is_empty() {
            return None;
        }
        match format {
            LineFormat::Plain => Some(process_sentence(tokenizer, text, max_seq_len, Sentinels::INPUT)),
            LineFormat::WikiText { drop_markup } => {
                if drop_markup && is_markup_line(text) {
                    return None;
                }
                Some(atomic_tokenize(tokenizer, text, UNK_TOK_ATOMIC, &NONATOMIC_UNKS, max_seq_len))
            }
        }
    })))
}

/// Tab-separated rows; `parse` returns None to skip a row
pub fn row_stream<'a, T: 'a>(
    path: &Path,
    mut parse: impl FnMut(&[&str]) -> Option<Result<T>> + 'a,
) -> Result<Box<dyn Iterator<Item = Result<T>> + 'a>> {
    let lines = open_lines(path)?;
    let source = path.to_path_buf();
    Ok(Box::new(lines.filter_map(move |line| match line {
        Ok(line) => {
            let row: Vec<&str> = line.trim().split('\t').collect();
            parse(&row)
        }
        Err(e) => Some(Err(e.context(format!("Read error in '{}'", source.display())))),
    })))
}

// ─── Consecutive ──────────────────────────────────────────────────────────────
/// Yields (previous, current) for every item after the first
pub struct Consecutive<I, T> {
    inner: I,
    prev: Option<T>,
}

impl<I, T> Consecutive<I, T>
where
    I: Iterator<Item = Result<T>>,
{
    /// Nothing is yielded for the first item; it only primes `prev`
    pub fn new(inner: I) -> Self {
        Self { inner, prev: None }
    }
}

impl<I, T> Iterator for Consecutive<I, T>
where
    I: Iterator<Item = Result<T>>,
    T: Clone,
{
    type Item = Result<(T, T)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let current = match self.inner.next()? {
                Ok(item) => item,
                Err(e) => return Some(Err(e)),
            };
            match self.prev.replace(current.clone()) {
                Some(prev) => return Some(Ok((prev, current))),
                None => continue,
            }
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::tokenizer::WhitespaceTokenizer;
    use std::fs;

    #[test]
    fn test_wikitext_drops_headers_and_keeps_unk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.sentences.txt");
        fs::write(&path, " = = Early life = = \n\nHe was <unk> there .\nx\n").unwrap();

        let sents: Vec<Vec<String>> = sentence_stream(
            &path,
            &WhitespaceTokenizer,
            64,
            LineFormat::WikiText { drop_markup: true },
        )
        .unwrap()
        .collect::<Result<_>>()
        .unwrap();

        assert_eq!(sents.len(), 1);
        assert_eq!(sents[0], vec!["<SOS>", "He", "was", "@@UNKNOWN@@", "there", ".", "<EOS>"]);
    }

    #[test]
    fn test_markup_detection() {
        assert!(is_markup_line("= = Title = ="));
        assert!(is_markup_line("a"));
        assert!(!is_markup_line("x = y"));
    }

    #[test]
    fn test_consecutive_pairs() {
        let items = vec![Ok(1), Ok(2), Ok(3)];
        let pairs: Vec<(i32, i32)> = Consecutive::new(items.into_iter()).collect::<Result<_>>().unwrap();
        assert_eq!(pairs, vec![(1, 2), (2, 3)]);

        let single = vec![Ok(1)];
        assert_eq!(Consecutive::new(single.into_iter()).count(), 0);
    }

    #[test]
    fn test_require_files_reports_missing_split() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("train.csv"), "").unwrap();
        let files = split_files_named(dir.path(), ".csv");
        let err = require_files("reddit", &files).unwrap_err();
        assert!(err.to_string().contains("val"));
    }

    #[test]
    fn test_row_stream_skips_rows_parse_rejects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.txt");
        fs::write(&path, "a\tb\nonly\n").unwrap();
        let rows: Vec<String> = row_stream(&path, |row| {
            (row.len() >= 2).then(|| Ok(row.join("+")))
        })
        .unwrap()
        .collect::<Result<_>>()
        .unwrap();
        assert_eq!(rows, vec!["a+b"]);
    }
}
