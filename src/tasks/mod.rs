// ============================================================
// Layer 5 — Tasks
// ============================================================
// A task is one dataset plus everything needed to feed it to a
// model and score the result:
//
//   where its files live      (registry entry + data dir)
//   how rows are normalized   (data layer loaders)
//   how rows become Instances (process_split)
//   what it reports           (update_metrics / metrics)
//
// Every variant implements the one `Task` trait below. Shared
// behaviour is composed from small helpers rather than layered
// through a base type:
//
//   columnar::ColumnarStore   pre-loaded train/val/test columns
//   stream                    re-opened per pass for corpora on disk
//
// Instances are always produced lazily: `process_split` returns
// a boxed iterator that builds one Instance per pull. Streams
// backed by files re-open the file on every `split_text` call, so
// every split can be walked any number of times.
//
// Reference: Rust Book §10 (Traits), §13 (Iterators),
//            Rust Book §17 (Trait Objects)

pub mod context;
pub mod columnar;
pub mod stream;
pub mod classification;
pub mod regression;
pub mod tagging;
pub mod edge;
pub mod lm;
pub mod seq2seq;
pub mod streaming_pair;
pub mod diagnostic;
pub mod grounded;
pub mod registry;
pub mod catalogue;

use anyhow::Result;
use serde::Serialize;
use std::{collections::BTreeMap, fmt};

use crate::data::{captions::CaptionSplit, columnar::ColumnarSplit, diagnostic::DiagnosticData};
use crate::domain::{
    error::TaskError,
    instance::{Instance, TokenIndexer},
    prediction::{MetricMap, Predictions},
    record::EdgeRecord,
    split::Split,
};
use crate::infra::tokenizer::Sentinels;

pub use context::{SimilarityMetric, TaskContext, TaskOptions};
pub use registry::{TaskDefinition, TaskRegistry};

// ─── Streams ──────────────────────────────────────────────────────────────────
pub type InstanceStream<'a> = Box<dyn Iterator<Item = Result<Instance>> + 'a>;
pub type SentenceStream<'a> = Box<dyn Iterator<Item = Result<Vec<String>>> + 'a>;
pub type PairStream<'a> = Box<dyn Iterator<Item = Result<SentencePair>> + 'a>;

/// One row of a streamed paired corpus, already tokenized
#[derive(Debug, Clone, PartialEq)]
pub struct SentencePair {
    pub first: Vec<String>,
    pub second: Vec<String>,
    pub label: i64,
}

// ─── SplitText ────────────────────────────────────────────────────────────────
/// The data behind one split, in whatever form the variant keeps it
pub enum SplitText<'a> {
    Columns(&'a ColumnarSplit),
    Diagnostic(&'a DiagnosticData),
    Records(&'a [EdgeRecord]),
    Captions(&'a CaptionSplit),
    Sentences(SentenceStream<'a>),
    Pairs(PairStream<'a>),
}

impl<'a> SplitText<'a> {
    /// Number of examples; streams are consumed to count them
    pub fn count(self) -> Result<usize> {
        Ok(match self {
            SplitText::Columns(c)    => c.len(),
            SplitText::Diagnostic(d) => d.len(),
            SplitText::Records(r)    => r.len(),
            SplitText::Captions(c)   => c.len(),
            SplitText::Sentences(mut s) => s.try_fold(0usize, |n, item| item.map(|_| n + 1))?,
            SplitText::Pairs(mut s)     => s.try_fold(0usize, |n, item| item.map(|_| n + 1))?,
        })
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            SplitText::Columns(_)    => "columns",
            SplitText::Diagnostic(_) => "diagnostic",
            SplitText::Records(_)    => "records",
            SplitText::Captions(_)   => "captions",
            SplitText::Sentences(_)  => "sentences",
            SplitText::Pairs(_)      => "pairs",
        }
    }
}

// ─── TaskKind ─────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Classification,
    Regression,
    Tagging,
    Span,
    Generation,
    Ranking,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Classification => "classification",
            TaskKind::Regression     => "regression",
            TaskKind::Tagging        => "tagging",
            TaskKind::Span           => "span",
            TaskKind::Generation     => "generation",
            TaskKind::Ranking        => "ranking",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Examples per split
pub type ExampleCounts = BTreeMap<Split, usize>;

// ─── Task ─────────────────────────────────────────────────────────────────────
/// The contract every task variant implements.
///
/// Data is loaded by the variant's constructor; after that a
/// task is only read (splits, sentences, instances) and its
/// metric state updated and reset.
pub trait Task: Send {
    fn name(&self) -> &str;

    fn kind(&self) -> TaskKind;

    /// 1 for single-sentence inputs, 2 for sentence pairs
    fn input_arity(&self) -> usize;

    /// Output classes; 1 for regression and generation tasks
    fn n_classes(&self) -> usize;

    /// Key in `metrics()` that drives model selection
    fn val_metric_key(&self) -> &str;

    /// Always `{name}_{val_metric_key}`
    fn val_metric(&self) -> String {
        format!("{}_{}", self.name(), self.val_metric_key())
    }

    /// True when lower is better
    fn val_metric_decreases(&self) -> bool {
        false
    }

    /// Name of the tokenizer the task's data was processed with
    fn tokenizer_name(&self) -> &str;

    /// Re-truncate every stored sentence to `max_seq_len` tokens
    fn truncate(&mut self, _max_seq_len: usize, _sentinels: Sentinels) -> Result<()> {
        Err(TaskError::unsupported(self.name(), "truncate").into())
    }

    /// Every sentence needed to build a vocabulary. Never
    /// includes test data.
    fn sentences(&self) -> Result<SentenceStream<'_>>;

    fn split_text(&self, split: Split) -> Result<SplitText<'_>>;

    fn num_examples(&self, text: SplitText<'_>) -> Result<usize> {
        text.count()
    }

    fn count_examples(&self) -> Result<ExampleCounts> {
        let mut counts = ExampleCounts::new();
        for split in Split::ALL {
            let n = self.num_examples(self.split_text(split)?)?;
            counts.insert(split, n);
        }
        Ok(counts)
    }

    /// Lazily turn one split into Instances
    fn process_split<'a>(
        &'a self,
        text: SplitText<'a>,
        indexer: &TokenIndexer,
    ) -> Result<InstanceStream<'a>>;

    /// Label vocabulary, for tasks that have one
    fn all_labels(&self) -> Option<Vec<String>> {
        None
    }

    fn update_metrics(&mut self, predictions: &Predictions) -> Result<()>;

    /// Current metric values; `reset` zeroes every aggregator afterwards
    fn metrics(&mut self, reset: bool) -> MetricMap;
}

// ─── Shared helpers ───────────────────────────────────────────────────────────
/// Error for a split form or prediction shape a variant cannot take
pub(crate) fn wrong_split(task: &str, text: &SplitText<'_>) -> anyhow::Error {
    TaskError::unsupported(task, format!("split text of kind '{}'", text.kind_name())).into()
}

pub(crate) fn wrong_predictions(task: &str, predictions: &Predictions) -> anyhow::Error {
    TaskError::PredictionMismatch(format!(
        "task '{}' cannot score {} predictions",
        task,
        predictions.kind()
    ))
    .into()
}

/// Shift left by one, wrapping the first token to the end
pub fn forward_targets(tokens: &[String]) -> Vec<String> {
    let mut out = tokens.to_vec();
    if !out.is_empty() {
        out.rotate_left(1);
    }
    out
}

/// Shift right by one, wrapping the last token to the front
pub fn backward_targets(tokens: &[String]) -> Vec<String> {
    let mut out = tokens.to_vec();
    if !out.is_empty() {
        out.rotate_right(1);
    }
    out
}
