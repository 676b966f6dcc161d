// ============================================================
// Layer 5 — Grounded Captioning
// ============================================================
// Captions paired with the id of the image they describe. The
// model maps a caption into image-feature space; how close it
// lands is measured outside this crate or via `score_embeddings`
// and aggregated here as a running mean under the key `metric`.
//
// Instances: input1 (caption), labels (numeric), ids (image id).
//
// Reference: Rust Book §6 (Enums)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path};
use tracing::info;

use crate::data::captions::{load_mscoco_split, load_shapeworld_split, CaptionSplit};
use crate::domain::{
    error::TaskError,
    instance::{Field, Instance, TokenIndexer},
    prediction::{MetricMap, Predictions},
    split::Split,
    traits::Aggregator,
};
use crate::infra::metrics::Average;
use crate::tasks::{
    wrong_predictions, wrong_split, InstanceStream, SentenceStream, SimilarityMetric, SplitText, Task,
    TaskContext, TaskKind, TaskOptions,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptionSource {
    Mscoco,
    ShapeWorld,
}

/// Similarity between two embeddings of equal length.
///
/// `AbsDiff` is the absolute value of the mean element-wise
/// difference, so opposite offsets cancel; `Cosine` is 0 when
/// either vector is zero.
pub fn similarity(metric: SimilarityMetric, a: &[f64], b: &[f64]) -> f64 {
    match metric {
        SimilarityMetric::AbsDiff => {
            if a.is_empty() {
                return 0.0;
            }
            (a.iter().zip(b).map(|(x, y)| x - y).sum::<f64>() / a.len() as f64).abs()
        }
        SimilarityMetric::Cosine => {
            let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
            let na = a.iter().map(|x| x * x).sum::<f64>().sqrt();
            let nb = b.iter().map(|x| x * x).sum::<f64>().sqrt();
            if na == 0.0 || nb == 0.0 {
                0.0
            } else {
                dot / (na * nb)
            }
        }
    }
}

pub struct GroundedTask {
    name: String,
    tokenizer_name: String,
    similarity: SimilarityMetric,
    splits: BTreeMap<Split, CaptionSplit>,
    metric: Average,
}

impl GroundedTask {
    pub fn new(name: &str, dir: &Path, source: CaptionSource, ctx: &TaskContext, opts: &TaskOptions) -> Result<Self> {
        let mut splits = BTreeMap::new();
        for split in Split::ALL {
            let data = match source {
                CaptionSource::Mscoco     => load_mscoco_split(dir, split, ctx.tokenizer(), ctx.max_seq_len)?,
                CaptionSource::ShapeWorld => load_shapeworld_split(dir, split, ctx.tokenizer(), ctx.max_seq_len)?,
            };
            info!("{}: {} {} captions", name, split, data.len());
            splits.insert(split, data);
        }

        Ok(Self {
            name: name.to_string(),
            tokenizer_name: ctx.tokenizer.name().to_string(),
            similarity: opts.similarity,
            splits,
            metric: Average::new(),
        })
    }

    pub fn similarity_metric(&self) -> SimilarityMetric {
        self.similarity
    }

    /// Score one (caption, image) embedding pair with the configured
    /// similarity and fold it into the running metric
    pub fn score_embeddings(&mut self, caption: &[f64], image: &[f64]) -> Result<f64, TaskError> {
        if caption.len() != image.len() {
            return Err(TaskError::PredictionMismatch(format!(
                "embedding sizes differ: {} vs {}",
                caption.len(),
                image.len()
            )));
        }
        let value = similarity(self.similarity, caption, image);
        self.metric.update(value);
        Ok(value)
    }
}

impl Task for GroundedTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Regression
    }

    fn input_arity(&self) -> usize {
        1
    }

    fn n_classes(&self) -> usize {
        1
    }

    fn val_metric_key(&self) -> &str {
        "metric"
    }

    fn tokenizer_name(&self) -> &str {
        &self.tokenizer_name
    }

    fn sentences(&self) -> Result<SentenceStream<'_>> {
        let captions = [Split::Train, Split::Val]
            .into_iter()
            .filter_map(|s| self.splits.get(&s))
            .flat_map(|data| data.captions.iter().cloned().map(Ok));
        Ok(Box::new(captions))
    }

    fn split_text(&self, split: Split) -> Result<SplitText<'_>> {
        let data = self
            .splits
            .get(&split)
            .ok_or_else(|| TaskError::missing_split(self.name.as_str(), split))?;
        Ok(SplitText::Captions(data))
    }

    fn process_split<'a>(&'a self, text: SplitText<'a>, indexer: &TokenIndexer) -> Result<InstanceStream<'a>> {
        let data = match text {
            SplitText::Captions(data) => data,
            other => return Err(wrong_split(&self.name, &other)),
        };
        let indexer = indexer.clone();
        let rows = data.captions.iter().zip(&data.labels).zip(&data.image_ids);
        Ok(Box::new(rows.map(move |((caption, label), id)| {
            Ok(Instance::new()
                .with("input1", Field::text(caption.clone(), &indexer))
                .with("labels", Field::numeric(*label as f64))
                .with("ids", Field::numeric(*id as f64)))
        })))
    }

    fn update_metrics(&mut self, predictions: &Predictions) -> Result<()> {
        match predictions {
            Predictions::Similarity { value } => {
                self.metric.update(*value);
                Ok(())
            }
            other => Err(wrong_predictions(&self.name, other)),
        }
    }

    fn metrics(&mut self, reset: bool) -> MetricMap {
        MetricMap::from([("metric".to_string(), self.metric.get(reset))])
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn shapeworld(dir: &Path, opts: &TaskOptions) -> GroundedTask {
        let sw = dir.join("shapeworld");
        fs::create_dir_all(&sw).unwrap();
        for split in ["train", "val", "test"] {
            fs::write(sw.join(format!("{split}.tsv")), "a red square\t1\t7\nno match\t0\t8\n").unwrap();
        }
        GroundedTask::new("groundedsw", dir, CaptionSource::ShapeWorld, &TaskContext::whitespace(dir), opts).unwrap()
    }

    #[test]
    fn test_similarity_functions() {
        assert_eq!(similarity(SimilarityMetric::AbsDiff, &[1.0, 2.0], &[1.0, 2.0]), 0.0);
        // |mean([-1, 3])|
        assert_eq!(similarity(SimilarityMetric::AbsDiff, &[0.0, 0.0], &[1.0, -3.0]), 1.0);
        assert_eq!(similarity(SimilarityMetric::AbsDiff, &[0.0, 0.0], &[1.0, 3.0]), 2.0);
        assert!((similarity(SimilarityMetric::Cosine, &[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-12);
        assert_eq!(similarity(SimilarityMetric::Cosine, &[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(similarity(SimilarityMetric::Cosine, &[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_abs_diff_lets_opposite_offsets_cancel() {
        assert_eq!(similarity(SimilarityMetric::AbsDiff, &[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(similarity(SimilarityMetric::AbsDiff, &[], &[]), 0.0);
    }

    #[test]
    fn test_instances_carry_caption_label_and_image_id() {
        let dir = tempfile::tempdir().unwrap();
        let task = shapeworld(dir.path(), &TaskOptions::new());
        let insts: Vec<Instance> = task
            .process_split(task.split_text(Split::Train).unwrap(), &TokenIndexer::default())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(insts.len(), 1);
        assert_eq!(insts[0].tokens("input1").unwrap().len(), 5);
        assert_eq!(insts[0].numeric("labels"), Some(1.0));
        assert_eq!(insts[0].numeric("ids"), Some(7.0));
        assert_eq!(task.val_metric(), "groundedsw_metric");
    }

    #[test]
    fn test_metric_is_running_mean_of_similarities() {
        let dir = tempfile::tempdir().unwrap();
        let mut task = shapeworld(dir.path(), &TaskOptions::new().similarity(SimilarityMetric::Cosine));
        task.score_embeddings(&[1.0, 0.0], &[1.0, 0.0]).unwrap();
        task.update_metrics(&Predictions::Similarity { value: 0.0 }).unwrap();
        assert!((task.metrics(true)["metric"] - 0.5).abs() < 1e-12);
        assert!(task.score_embeddings(&[1.0], &[1.0, 2.0]).is_err());
    }
}
