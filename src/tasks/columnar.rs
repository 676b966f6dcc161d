// ============================================================
// Layer 5 — Columnar Task Storage
// ============================================================
// Shared by every task whose splits are delimited files that
// fit in memory (classification, regression, tagging):
//
//   SplitSources   split → one or more (file, TsvSpec); several
//                  files for one split are concatenated in order
//   ColumnarStore  the loaded train / val / test columns
//
// The store owns its splits behind Arc so a split can be handed
// to a Burn Dataset without copying. Truncation goes through
// Arc::make_mut and therefore never changes a split a dataset
// already holds.
//
// Reference: Rust Book §15 (Arc), Rust Book §13 (Iterators)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path, sync::Arc};
use tracing::debug;

use crate::data::{
    columnar::ColumnarSplit,
    dataset::{row_instance, ColumnarDataset, RowLayout},
    tsv::{load_tsv, TsvSpec},
};
use crate::domain::{error::TaskError, split::Split};
use crate::infra::tokenizer::Sentinels;
use crate::tasks::{InstanceStream, SentenceStream, TaskContext};

/// One delimited file and how to read its columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TsvSource {
    pub file: String,
    pub spec: TsvSpec,
}

impl TsvSource {
    /// `file` is relative to the task directory
    pub fn new(file: impl Into<String>, spec: TsvSpec) -> Self {
        Self { file: file.into(), spec }
    }
}

/// Files per split, concatenated in order when loaded
pub type SplitSources = BTreeMap<Split, Vec<TsvSource>>;

/// Apply `f` to every spec in every split
pub fn map_specs(sources: &mut SplitSources, mut f: impl FnMut(&mut TsvSpec)) {
    for spec in sources.values_mut().flatten().map(|s| &mut s.spec) {
        f(spec);
    }
}

// ─── ColumnarStore ────────────────────────────────────────────────────────────
/// Loaded train / val / test columns of one task
#[derive(Debug, Clone)]
pub struct ColumnarStore {
    task: String,
    splits: BTreeMap<Split, Arc<ColumnarSplit>>,
}

impl ColumnarStore {
    /// Load every split; a split with no sources is a configuration error
    pub fn load(task: &str, dir: &Path, sources: &SplitSources, ctx: &TaskContext) -> Result<Self> {
        let mut splits = BTreeMap::new();
        for split in Split::ALL {
            let files = sources
                .get(&split)
                .filter(|f| !f.is_empty())
                .ok_or_else(|| TaskError::missing_split(task, split))?;

            let mut merged: Option<ColumnarSplit> = None;
            for source in files {
                let path = dir.join(&source.file);
                debug!("{}: loading {} from {}", task, split, path.display());
                let loaded = load_tsv(&path, &source.spec, ctx.tokenizer(), ctx.max_seq_len)?;
                match &mut merged {
                    Some(acc) => acc.extend(loaded)?,
                    None => merged = Some(loaded),
                }
            }
            if let Some(data) = merged {
                splits.insert(split, Arc::new(data));
            }
        }
        Ok(Self { task: task.to_string(), splits })
    }

    /// Stored columns of one split
    pub fn get(&self, split: Split) -> Result<&ColumnarSplit, TaskError> {
        self.splits
            .get(&split)
            .map(Arc::as_ref)
            .ok_or_else(|| TaskError::missing_split(self.task.as_str(), split))
    }

    /// Re-truncate every sentence of every split and re-wrap it
    /// with `sentinels`; datasets already handed out keep the old rows
    pub fn truncate(&mut self, max_seq_len: usize, sentinels: Sentinels) {
        for split in self.splits.values_mut() {
            Arc::make_mut(split).truncate(max_seq_len, sentinels);
        }
    }

    /// input1 then input2 of train, then of val
    pub fn sentences(&self) -> SentenceStream<'_> {
        let iter = [Split::Train, Split::Val]
            .into_iter()
            .filter_map(|s| self.splits.get(&s))
            .flat_map(|data| {
                let second = data.input2.iter().flatten();
                data.input1.iter().chain(second)
            })
            .map(|sent| Ok(sent.clone()));
        Box::new(iter)
    }

    /// Random-access Burn dataset sharing the split's storage
    pub fn dataset(&self, split: Split, layout: RowLayout) -> Result<ColumnarDataset, TaskError> {
        let data = self
            .splits
            .get(&split)
            .ok_or_else(|| TaskError::missing_split(self.task.as_str(), split))?;
        Ok(ColumnarDataset::new(Arc::clone(data), layout))
    }
}

/// Lazily build one Instance per stored row
pub fn process_columns<'a>(data: &'a ColumnarSplit, layout: RowLayout) -> InstanceStream<'a> {
    Box::new(
        (0..data.len())
            .filter_map(move |i| data.row(i))
            .map(move |(s1, s2, target, idx)| Ok(row_instance(&layout, s1, s2, target, idx))),
    )
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::data::dataset::Dataset;
    use crate::domain::instance::TokenIndexer;
    use std::fs;

    fn write_splits(dir: &Path) {
        fs::write(dir.join("train.tsv"), "a b\t0\nc d\t1\n").unwrap();
        fs::write(dir.join("dev.tsv"), "e f\t1\n").unwrap();
        fs::write(dir.join("test.tsv"), "g h\t0\n").unwrap();
    }

    fn sources() -> SplitSources {
        let spec = TsvSpec::single(0).target(1);
        [
            (Split::Train, vec![TsvSource::new("train.tsv", spec.clone())]),
            (Split::Val, vec![TsvSource::new("dev.tsv", spec.clone())]),
            (Split::Test, vec![TsvSource::new("test.tsv", spec)]),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_missing_split_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        write_splits(dir.path());
        let mut src = sources();
        src.remove(&Split::Test);
        let err = ColumnarStore::load("t", dir.path(), &src, &TaskContext::whitespace(dir.path())).unwrap_err();
        assert_eq!(
            err.downcast_ref::<TaskError>(),
            Some(&TaskError::missing_split("t", Split::Test))
        );
    }

    #[test]
    fn test_sentences_skip_test_split() {
        let dir = tempfile::tempdir().unwrap();
        write_splits(dir.path());
        let store = ColumnarStore::load("t", dir.path(), &sources(), &TaskContext::whitespace(dir.path())).unwrap();

        let first: Vec<Vec<String>> = store.sentences().collect::<Result<_>>().unwrap();
        let second: Vec<Vec<String>> = store.sentences().collect::<Result<_>>().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert!(first.iter().all(|s| !s.contains(&"g".to_string())));
    }

    #[test]
    fn test_truncate_does_not_touch_handed_out_dataset() {
        let dir = tempfile::tempdir().unwrap();
        write_splits(dir.path());
        let mut store = ColumnarStore::load("t", dir.path(), &sources(), &TaskContext::whitespace(dir.path())).unwrap();
        let ds = store
            .dataset(Split::Train, RowLayout::Pair { indexer: TokenIndexer::default() })
            .unwrap();

        store.truncate(3, Sentinels::INPUT);
        assert_eq!(store.get(Split::Train).unwrap().input1[0], vec!["<SOS>", "a", "<EOS>"]);
        assert_eq!(ds.get(0).unwrap().tokens("input1").unwrap().len(), 4);
    }
}
