// ============================================================
// Layer 5 — Sequence-to-Sequence
// ============================================================
// Source → target generation, streamed from disk:
//
//   TwoColumn    MT corpora    train.txt / valid.txt / test.txt,
//                              source col 0, target col 1
//   Reddit       comment pairs {split}.csv, source col 2, target col 3
//   SkipThought  WikiText      each sentence predicts the next one
//
// Two-column targets carry `@start@` / `@end@` instead of the
// input sentinels. MT targets are indexed under a private
// `{name}_tokens` namespace; Reddit and SkipThought targets are
// English and share the input vocabulary.
//
// Metrics: perplexity (exp of mean NLL), bleu_score (always 0),
// unk_ratio_macroavg.
//
// Reference: Rust Book §13 (Iterators), §8 (HashMap)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path, sync::Arc};
use tracing::{info, warn};

use crate::domain::{
    error::TaskError,
    instance::{Field, Instance, TokenIndexer, DEFAULT_TOKEN_NAMESPACE},
    prediction::{MetricMap, Predictions},
    split::Split,
    traits::{Aggregator, SentenceTokenizer},
};
use crate::infra::metrics::Average;
use crate::infra::tokenizer::{process_sentence, Sentinels};
use crate::tasks::{
    stream::{
        count_file_lines, require_files, row_stream, sentence_stream, split_files, split_files_named,
        Consecutive, LineFormat, SplitFiles,
    },
    wrong_predictions, wrong_split, ExampleCounts, InstanceStream, PairStream, SentencePair,
    SentenceStream, SplitText, Task, TaskContext, TaskKind, TaskOptions,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seq2SeqFormat {
    TwoColumn,
    Reddit,
    SkipThought,
}

impl Seq2SeqFormat {
    pub fn files(&self, dir: &Path) -> SplitFiles {
        match self {
            Seq2SeqFormat::TwoColumn   => split_files(dir, "train.txt", "valid.txt", "test.txt"),
            Seq2SeqFormat::Reddit      => split_files_named(dir, ".csv"),
            Seq2SeqFormat::SkipThought => {
                split_files(dir, "train.sentences.txt", "valid.sentences.txt", "test.sentences.txt")
            }
        }
    }

    /// (source, target) columns for tab-separated formats
    fn columns(&self) -> Option<(usize, usize)> {
        match self {
            Seq2SeqFormat::TwoColumn   => Some((0, 1)),
            Seq2SeqFormat::Reddit      => Some((2, 3)),
            Seq2SeqFormat::SkipThought => None,
        }
    }

    /// Targets indexed with the input vocabulary
    pub fn shares_vocab(&self) -> bool {
        !matches!(self, Seq2SeqFormat::TwoColumn)
    }
}

fn tokenize_pair(
    tokenizer: &dyn SentenceTokenizer,
    source: &str,
    target: &str,
    max_seq_len: usize,
) -> Result<SentencePair> {
    Ok(SentencePair {
        first: process_sentence(tokenizer, source, max_seq_len, Sentinels::INPUT)?,
        second: process_sentence(tokenizer, target, max_seq_len, Sentinels::TARGET)?,
        label: 0,
    })
}

/// The `n` most frequent tokens; ties keep first-seen order
pub fn most_common<I>(tokens: I, n: usize) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for tok in tokens {
        let seen = counts.len();
        counts.entry(tok).or_insert((0, seen)).0 += 1;
    }
    let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
    ranked.into_iter().take(n).map(|(tok, _)| tok).collect()
}

pub struct Seq2SeqTask {
    name: String,
    format: Seq2SeqFormat,
    files: SplitFiles,
    max_seq_len: usize,
    max_targ_v_size: usize,
    tokenizer: Arc<dyn SentenceTokenizer>,
    target_indexer: TokenIndexer,
    nll: Average,
    unk_ratio: Average,
}

impl Seq2SeqTask {
    pub fn new(name: &str, dir: &Path, format: Seq2SeqFormat, ctx: &TaskContext, opts: &TaskOptions) -> Result<Self> {
        let max_targ_v_size = opts
            .max_targ_v_size
            .ok_or_else(|| TaskError::missing_option(name, "max_targ_v_size"))?;
        let files = format.files(dir);
        require_files(name, &files)?;

        let target_namespace = if format.shares_vocab() {
            DEFAULT_TOKEN_NAMESPACE.to_string()
        } else {
            format!("{name}_tokens")
        };
        info!("{}: streaming {:?} pairs, targets under '{}'", name, format, target_namespace);

        Ok(Self {
            name: name.to_string(),
            format,
            files,
            max_seq_len: ctx.max_seq_len,
            max_targ_v_size,
            tokenizer: Arc::clone(&ctx.tokenizer),
            target_indexer: TokenIndexer::new(target_namespace),
            nll: Average::new(),
            unk_ratio: Average::new(),
        })
    }

    pub fn format(&self) -> Seq2SeqFormat {
        self.format
    }

    pub fn target_namespace(&self) -> &str {
        &self.target_indexer.namespace
    }

    fn path(&self, split: Split) -> Result<&Path, TaskError> {
        self.files
            .get(&split)
            .map(|p| p.as_path())
            .ok_or_else(|| TaskError::missing_split(self.name.as_str(), split))
    }

    fn pair_stream(&self, split: Split) -> Result<PairStream<'_>> {
        let path = self.path(split)?;
        let tokenizer = self.tokenizer.as_ref();
        let max_seq_len = self.max_seq_len;

        match self.format.columns() {
            Some((src, tgt)) => row_stream(path, move |row| {
                let (source, target) = match (row.get(src), row.get(tgt)) {
                    (Some(s), Some(t)) if !s.is_empty() && !t.is_empty() => (*s, *t),
                    _ => return None,
                };
                Some(tokenize_pair(tokenizer, source, target, max_seq_len))
            }),
            None => {
                let sents = sentence_stream(path, tokenizer, max_seq_len, LineFormat::WikiText { drop_markup: false })?;
                Ok(Box::new(Consecutive::new(sents).map(|pair| {
                    pair.map(|(first, second)| SentencePair { first, second, label: 0 })
                })))
            }
        }
    }

    /// Target vocabulary: most frequent target tokens over train + val
    pub fn target_vocab(&self) -> Result<Vec<String>> {
        let mut tokens = Vec::new();
        for split in [Split::Train, Split::Val] {
            for pair in self.pair_stream(split)? {
                tokens.extend(pair?.second);
            }
        }
        Ok(most_common(tokens, self.max_targ_v_size))
    }

    fn make_instance(&self, pair: SentencePair, indexer: &TokenIndexer) -> Instance {
        Instance::new()
            .with("inputs", Field::text(pair.first, indexer))
            .with("targs", Field::text(pair.second, &self.target_indexer))
    }
}

impl Task for Seq2SeqTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Generation
    }

    fn input_arity(&self) -> usize {
        1
    }

    fn n_classes(&self) -> usize {
        1
    }

    fn val_metric_key(&self) -> &str {
        "perplexity"
    }

    fn val_metric_decreases(&self) -> bool {
        true
    }

    fn tokenizer_name(&self) -> &str {
        self.tokenizer.name()
    }

    /// Sources always; targets too when they share the vocabulary
    fn sentences(&self) -> Result<SentenceStream<'_>> {
        if self.format == Seq2SeqFormat::SkipThought {
            let format = LineFormat::WikiText { drop_markup: false };
            let train = sentence_stream(self.path(Split::Train)?, self.tokenizer.as_ref(), self.max_seq_len, format)?;
            let val = sentence_stream(self.path(Split::Val)?, self.tokenizer.as_ref(), self.max_seq_len, format)?;
            return Ok(Box::new(train.chain(val)));
        }

        let shared = self.format.shares_vocab();
        let pairs = self.pair_stream(Split::Train)?.chain(self.pair_stream(Split::Val)?);
        Ok(Box::new(pairs.flat_map(move |pair| match pair {
            Ok(p) if shared => vec![Ok(p.first), Ok(p.second)],
            Ok(p)           => vec![Ok(p.first)],
            Err(e)          => vec![Err(e)],
        })))
    }

    fn split_text(&self, split: Split) -> Result<SplitText<'_>> {
        Ok(SplitText::Pairs(self.pair_stream(split)?))
    }

    fn count_examples(&self) -> Result<ExampleCounts> {
        let minus = usize::from(self.format == Seq2SeqFormat::SkipThought);
        count_file_lines(&self.files, minus)
    }

    fn process_split<'a>(&'a self, text: SplitText<'a>, indexer: &TokenIndexer) -> Result<InstanceStream<'a>> {
        let pairs = match text {
            SplitText::Pairs(pairs) => pairs,
            other => return Err(wrong_split(&self.name, &other)),
        };
        let indexer = indexer.clone();
        Ok(Box::new(pairs.map(move |p| p.map(|p| self.make_instance(p, &indexer)))))
    }

    /// Only private target vocabularies are reported
    fn all_labels(&self) -> Option<Vec<String>> {
        if self.format.shares_vocab() {
            return None;
        }
        match self.target_vocab() {
            Ok(vocab) => Some(vocab),
            Err(e) => {
                warn!("{}: cannot build target vocabulary: {:#}", self.name, e);
                None
            }
        }
    }

    fn update_metrics(&mut self, predictions: &Predictions) -> Result<()> {
        match predictions {
            Predictions::Sequence { nll, unk_ratio } => {
                self.nll.update(*nll);
                if let Some(r) = unk_ratio {
                    self.unk_ratio.update(*r);
                }
                Ok(())
            }
            other => Err(wrong_predictions(&self.name, other)),
        }
    }

    fn metrics(&mut self, reset: bool) -> MetricMap {
        MetricMap::from([
            ("perplexity".to_string(),         self.nll.get(reset).exp()),
            ("bleu_score".to_string(),         0.0),
            ("unk_ratio_macroavg".to_string(), self.unk_ratio.get(reset)),
        ])
    }
}
