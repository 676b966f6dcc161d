// ============================================================
// Layer 4 — Columnar Rows → Instances
// ============================================================
// Turns one stored row of a ColumnarSplit into an Instance and
// exposes a whole split through Burn's Dataset trait, so a
// random-access consumer can pull instances by index without
// a corpus-sized instance list ever being built.
//
//   RowLayout::Pair     input1, sent1_str, [input2, sent2_str],
//                       labels, idx
//   RowLayout::Tagging  inputs, targs (private tag namespace)
//
// Reference: Burn Book §4 (Datasets), Rust Book §15 (Arc)

use burn::data::dataset::Dataset;
use std::sync::Arc;

use crate::data::columnar::{inner_text, ColumnarSplit, TargetValue};
use crate::domain::instance::{Field, Instance, TokenIndexer};

pub const LABEL_NAMESPACE: &str = "labels";
pub const INDEX_NAMESPACE: &str = "idxs";

/// Which fields a row is spread over
#[derive(Debug, Clone, PartialEq)]
pub enum RowLayout {
    Pair { indexer: TokenIndexer },
    Tagging { indexer: TokenIndexer, tag_indexer: TokenIndexer },
}

fn target_field(target: TargetValue, tag_indexer: Option<&TokenIndexer>) -> Field {
    match target {
        TargetValue::Label(v) => Field::label(v, LABEL_NAMESPACE),
        TargetValue::Score(v) => Field::numeric(v),
        TargetValue::Tags(tags) => match tag_indexer {
            Some(ix) => Field::text(tags, ix),
            None     => Field::text(tags, &TokenIndexer::new(LABEL_NAMESPACE)),
        },
    }
}

/// Build the instance for one row
pub fn row_instance(
    layout: &RowLayout,
    input1: Vec<String>,
    input2: Option<Vec<String>>,
    target: TargetValue,
    idx: i64,
) -> Instance {
    match layout {
        RowLayout::Pair { indexer } => {
            let mut inst = Instance::new()
                .with("sent1_str", Field::metadata(inner_text(&input1)))
                .with("input1", Field::text(input1, indexer));
            if let Some(s2) = input2 {
                inst.insert("sent2_str", Field::metadata(inner_text(&s2)));
                inst.insert("input2", Field::text(s2, indexer));
            }
            inst.with("labels", target_field(target, None))
                .with("idx", Field::label(idx, INDEX_NAMESPACE))
        }
        RowLayout::Tagging { indexer, tag_indexer } => Instance::new()
            .with("inputs", Field::text(input1, indexer))
            .with("targs", target_field(target, Some(tag_indexer))),
    }
}

// ─── ColumnarDataset ──────────────────────────────────────────────────────────
/// Random-access view over a loaded split
#[derive(Debug, Clone)]
pub struct ColumnarDataset {
    split: Arc<ColumnarSplit>,
    layout: RowLayout,
}

impl ColumnarDataset {
    pub fn new(split: Arc<ColumnarSplit>, layout: RowLayout) -> Self {
        Self { split, layout }
    }

    pub fn split(&self) -> &ColumnarSplit {
        &self.split
    }
}

impl Dataset<Instance> for ColumnarDataset {
    fn get(&self, index: usize) -> Option<Instance> {
        let (input1, input2, target, idx) = self.split.row(index)?;
        Some(row_instance(&self.layout, input1, input2, target, idx))
    }

    fn len(&self) -> usize {
        self.split.len()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::columnar::Targets;

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    fn sample_split() -> Arc<ColumnarSplit> {
        let mut split = ColumnarSplit::empty(true, Targets::Labels(Vec::new()));
        split
            .push_row(toks("<SOS> a b <EOS>"), Some(toks("<SOS> c d <EOS>")), TargetValue::Label(0), 0)
            .unwrap();
        split
            .push_row(toks("<SOS> e f <EOS>"), Some(toks("<SOS> g h <EOS>")), TargetValue::Label(1), 1)
            .unwrap();
        Arc::new(split)
    }

    #[test]
    fn test_dataset_builds_instances_on_demand() {
        let ds = ColumnarDataset::new(sample_split(), RowLayout::Pair { indexer: TokenIndexer::default() });
        assert_eq!(ds.len(), 2);

        let inst = ds.get(1).unwrap();
        assert_eq!(inst.tokens("input2").unwrap(), toks("<SOS> g h <EOS>").as_slice());
        assert_eq!(inst.label("labels"), Some(1));
        assert_eq!(inst.label("idx"), Some(1));
        assert_eq!(inst.get("sent1_str"), Some(&Field::metadata("e f")));
        assert!(ds.get(2).is_none());
    }

    #[test]
    fn test_tagging_layout_uses_private_namespace() {
        let layout = RowLayout::Tagging {
            indexer: TokenIndexer::default(),
            tag_indexer: TokenIndexer::new("ccg_tags"),
        };
        let inst = row_instance(&layout, toks("a b"), None, TargetValue::Tags(toks("1 2")), 0);
        assert_eq!(
            inst.get("targs"),
            Some(&Field::Text { tokens: toks("1 2"), namespace: "ccg_tags".into() })
        );
        assert!(!inst.contains("labels"));
    }

    #[test]
    fn test_scores_become_numeric() {
        let layout = RowLayout::Pair { indexer: TokenIndexer::default() };
        let inst = row_instance(&layout, toks("a"), Some(toks("b")), TargetValue::Score(0.4), 3);
        assert_eq!(inst.numeric("labels"), Some(0.4));
    }
}
