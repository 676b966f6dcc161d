// ============================================================
// Layer 5 — Token Tagging
// ============================================================
// One tag per token (e.g. CCG supertags). Each sentence becomes
//
//   inputs  Text(tokens)                    shared token namespace
//   targs   Text(tags)   under `{name}_tags`, so tag ids never
//                        collide with another task's vocabulary
//
// The tag inventory is the corpus count plus two reserved ids
// (unknown and padding).
//
// Reference: Rust Book §10 (Traits)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::data::{dataset::RowLayout, tsv::TsvSpec};
use crate::domain::{
    instance::TokenIndexer,
    prediction::{MetricMap, Predictions},
    split::Split,
    traits::Aggregator,
};
use crate::infra::metrics::CategoricalAccuracy;
use crate::infra::tokenizer::Sentinels;
use crate::tasks::{
    columnar::{process_columns, ColumnarStore, SplitSources, TsvSource},
    wrong_predictions, wrong_split, InstanceStream, SentenceStream, SplitText, Task, TaskContext,
    TaskKind, TaskOptions,
};

/// Unknown + padding
pub const RESERVED_TAGS: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggingConfig {
    /// Tags in the corpus, not counting the reserved ones
    pub num_tags: usize,
    pub sources: SplitSources,
}

impl TaggingConfig {
    /// Sentence in column 0, space-separated tags in column 1
    pub fn two_column(num_tags: usize, train: &str, val: &str, test: &str) -> Self {
        let spec = TsvSpec::single(0).target(1).tags();
        let sources = [(Split::Train, train), (Split::Val, val), (Split::Test, test)]
            .into_iter()
            .map(|(s, f)| (s, vec![TsvSource::new(f, spec.clone())]))
            .collect();
        Self { num_tags, sources }
    }
}

pub struct TaggingTask {
    name: String,
    num_tags: usize,
    tag_indexer: TokenIndexer,
    tokenizer_name: String,
    store: ColumnarStore,
    accuracy: CategoricalAccuracy,
}

impl TaggingTask {
    pub fn new(
        name: &str,
        dir: &Path,
        config: &TaggingConfig,
        ctx: &TaskContext,
        _opts: &TaskOptions,
    ) -> Result<Self> {
        let store = ColumnarStore::load(name, dir, &config.sources, ctx)?;
        info!("{}: finished loading tagging data", name);
        Ok(Self {
            name: name.to_string(),
            num_tags: config.num_tags + RESERVED_TAGS,
            tag_indexer: TokenIndexer::new(format!("{name}_tags")),
            tokenizer_name: ctx.tokenizer.name().to_string(),
            store,
            accuracy: CategoricalAccuracy::new(),
        })
    }

    fn layout(&self, indexer: &TokenIndexer) -> RowLayout {
        RowLayout::Tagging { indexer: indexer.clone(), tag_indexer: self.tag_indexer.clone() }
    }
}

impl Task for TaggingTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Tagging
    }

    fn input_arity(&self) -> usize {
        1
    }

    fn n_classes(&self) -> usize {
        self.num_tags
    }

    fn val_metric_key(&self) -> &str {
        "accuracy"
    }

    fn tokenizer_name(&self) -> &str {
        &self.tokenizer_name
    }

    /// Only the token column is truncated; tags are left as loaded
    fn truncate(&mut self, max_seq_len: usize, sentinels: Sentinels) -> Result<()> {
        self.store.truncate(max_seq_len, sentinels);
        Ok(())
    }

    fn sentences(&self) -> Result<SentenceStream<'_>> {
        Ok(self.store.sentences())
    }

    fn split_text(&self, split: Split) -> Result<SplitText<'_>> {
        Ok(SplitText::Columns(self.store.get(split)?))
    }

    fn process_split<'a>(&'a self, text: SplitText<'a>, indexer: &TokenIndexer) -> Result<InstanceStream<'a>> {
        match text {
            SplitText::Columns(data) => Ok(process_columns(data, self.layout(indexer))),
            other => Err(wrong_split(&self.name, &other)),
        }
    }

    fn all_labels(&self) -> Option<Vec<String>> {
        Some((0..self.num_tags).map(|i| i.to_string()).collect())
    }

    fn update_metrics(&mut self, predictions: &Predictions) -> Result<()> {
        match predictions {
            Predictions::Classes { predicted, gold } => Ok(self.accuracy.update(predicted, gold)?),
            other => Err(wrong_predictions(&self.name, other)),
        }
    }

    fn metrics(&mut self, reset: bool) -> MetricMap {
        MetricMap::from([("accuracy".to_string(), self.accuracy.get(reset))])
    }
}
