// ============================================================
// Layer 5 — NLI Diagnostic Task
// ============================================================
// One physical dataset scored along four tag dimensions. Every
// instance carries, besides the usual pair fields:
//
//   {dimension}          1 if the row has any tag in it, else 0
//   {dimension}__{tag}   1 if the row has that tag, else 0
//
// One Matthews correlation runs per dimension and per tag. A
// batch only updates the scorers whose presence mask selects
// at least one of its rows.
//
// Train, val and test are the same rows: the set is for
// evaluation only.
//
// Reference: Rust Book §8 (BTreeMap), §10 (Traits)

use anyhow::{bail, Context, Result};
use std::{
    collections::BTreeMap,
    fmt,
    path::Path,
};
use tracing::{debug, info};

use crate::data::{
    columnar::{inner_text, TargetValue},
    dataset::LABEL_NAMESPACE,
    diagnostic::{load_diagnostic_tsv, DiagnosticData, Dimension},
};
use crate::domain::{
    error::TaskError,
    instance::{Field, Instance, TokenIndexer},
    prediction::{MetricMap, Predictions},
    split::Split,
    traits::Aggregator,
};
use crate::infra::metrics::{Correlation, CorrelationKind};
use crate::infra::tokenizer::Sentinels;
use crate::tasks::{
    classification::NLI_LABELS, wrong_predictions, wrong_split, InstanceStream, SentenceStream,
    SplitText, Task, TaskContext, TaskKind, TaskOptions,
};

pub const DIAGNOSTIC_FILE: &str = "diagnostic-full.tsv";

/// One scorer: a whole dimension (`tag: None`) or a single tag
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScorerKey {
    pub dimension: Dimension,
    pub tag: Option<String>,
}

impl ScorerKey {
    pub fn dimension(dimension: Dimension) -> Self {
        Self { dimension, tag: None }
    }

    pub fn tag(dimension: Dimension, tag: impl Into<String>) -> Self {
        Self { dimension, tag: Some(tag.into()) }
    }

    /// Instance field and metric key: `{dim}` or `{dim}__{tag}`
    pub fn field_name(&self) -> String {
        match &self.tag {
            Some(tag) => format!("{}__{}", self.dimension, tag),
            None      => self.dimension.to_string(),
        }
    }
}

impl fmt::Display for ScorerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scorer__{}", self.field_name())
    }
}

pub struct DiagnosticTask {
    name: String,
    tokenizer_name: String,
    data: DiagnosticData,
    scorers: BTreeMap<ScorerKey, Correlation>,
}

impl DiagnosticTask {
    pub fn new(name: &str, dir: &Path, ctx: &TaskContext, _opts: &TaskOptions) -> Result<Self> {
        let targ_map: BTreeMap<String, i64> =
            NLI_LABELS.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        let data = load_diagnostic_tsv(&dir.join(DIAGNOSTIC_FILE), &targ_map, 1, ctx.tokenizer(), ctx.max_seq_len)?;

        let mut scorers = BTreeMap::new();
        for dim in Dimension::ALL {
            scorers.insert(ScorerKey::dimension(dim), Correlation::new(CorrelationKind::Matthews));
            if let Some(table) = data.table(dim) {
                for (_, tag) in table.tags() {
                    scorers.insert(ScorerKey::tag(dim, tag), Correlation::new(CorrelationKind::Matthews));
                }
            }
        }
        debug!("{}: created {} scorers", name, scorers.len());
        info!("{}: finished loading diagnostic data ({} rows)", name, data.len());

        Ok(Self {
            name: name.to_string(),
            tokenizer_name: ctx.tokenizer.name().to_string(),
            data,
            scorers,
        })
    }

    pub fn scorer_names(&self) -> impl Iterator<Item = String> + '_ {
        self.scorers.keys().map(ScorerKey::to_string)
    }

    fn make_instance(&self, data: &DiagnosticData, i: usize, indexer: &TokenIndexer) -> Result<Instance> {
        let (input1, input2, target, idx) = data
            .pairs
            .row(i)
            .with_context(|| format!("{}: diagnostic row {} out of range", self.name, i))?;
        let input2 = input2.with_context(|| format!("{}: diagnostic row {} has no hypothesis", self.name, i))?;
        let label = match target {
            TargetValue::Label(v) => v,
            other => bail!("{}: diagnostic row {} has non-label target {:?}", self.name, i, other),
        };

        let mut inst = Instance::new()
            .with("sent1_str", Field::metadata(inner_text(&input1)))
            .with("sent2_str", Field::metadata(inner_text(&input2)))
            .with("input1", Field::text(input1, indexer))
            .with("input2", Field::text(input2, indexer))
            .with("labels", Field::label(label, LABEL_NAMESPACE))
            .with("idx", Field::label(idx, "idx"));

        let row_tags = data
            .row_tags
            .get(i)
            .with_context(|| format!("{}: diagnostic row {} has no tags", self.name, i))?;
        for dim in Dimension::ALL {
            let present = row_tags.get(dim);
            inst.insert(dim.as_str(), Field::label(i64::from(!present.is_empty()), dim.as_str()));
            let Some(table) = data.table(dim) else { continue };
            for (ix, tag) in table.tags() {
                let field = ScorerKey::tag(dim, tag).field_name();
                inst.insert(field.clone(), Field::label(i64::from(present.contains(&ix)), field));
            }
        }
        Ok(inst)
    }
}

impl Task for DiagnosticTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Classification
    }

    fn input_arity(&self) -> usize {
        2
    }

    fn n_classes(&self) -> usize {
        NLI_LABELS.len()
    }

    fn val_metric_key(&self) -> &str {
        "accuracy"
    }

    fn tokenizer_name(&self) -> &str {
        &self.tokenizer_name
    }

    fn truncate(&mut self, max_seq_len: usize, sentinels: Sentinels) -> Result<()> {
        self.data.pairs.truncate(max_seq_len, sentinels);
        Ok(())
    }

    /// Every split holds the same rows, so each sentence is yielded once
    fn sentences(&self) -> Result<SentenceStream<'_>> {
        let pairs = &self.data.pairs;
        Ok(Box::new(
            pairs
                .input1
                .iter()
                .chain(pairs.input2.iter().flatten())
                .cloned()
                .map(Ok),
        ))
    }

    fn split_text(&self, _split: Split) -> Result<SplitText<'_>> {
        Ok(SplitText::Diagnostic(&self.data))
    }

    fn process_split<'a>(&'a self, text: SplitText<'a>, indexer: &TokenIndexer) -> Result<InstanceStream<'a>> {
        let data = match text {
            SplitText::Diagnostic(data) => data,
            other => return Err(wrong_split(&self.name, &other)),
        };
        let indexer = indexer.clone();
        Ok(Box::new((0..data.len()).map(move |i| self.make_instance(data, i, &indexer))))
    }

    fn update_metrics(&mut self, predictions: &Predictions) -> Result<()> {
        let (predicted, gold, masks) = match predictions {
            Predictions::Tagged { predicted, gold, masks } => (predicted, gold, masks),
            other => return Err(wrong_predictions(&self.name, other)),
        };
        if predicted.len() != gold.len() {
            return Err(TaskError::PredictionMismatch(format!(
                "{} predictions for {} gold labels",
                predicted.len(),
                gold.len()
            ))
            .into());
        }

        for (key, scorer) in self.scorers.iter_mut() {
            let Some(mask) = masks.get(&key.field_name()) else { continue };
            if mask.len() != gold.len() {
                return Err(TaskError::PredictionMismatch(format!(
                    "mask '{}' has {} rows, batch has {}",
                    key.field_name(),
                    mask.len(),
                    gold.len()
                ))
                .into());
            }
            let (sub_pred, sub_gold): (Vec<i64>, Vec<i64>) = mask
                .iter()
                .zip(predicted.iter().zip(gold))
                .filter(|(keep, _)| **keep)
                .map(|(_, (p, g))| (*p, *g))
                .unzip();
            if sub_gold.is_empty() {
                continue;
            }
            scorer.update_classes(&sub_pred, &sub_gold)?;
        }
        Ok(())
    }

    fn metrics(&mut self, reset: bool) -> MetricMap {
        let mut metrics = MetricMap::from([("accuracy".to_string(), 0.0)]);
        for (key, scorer) in self.scorers.iter_mut() {
            metrics.insert(key.field_name(), scorer.get(reset));
        }
        metrics
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const FIXTURE: &str = "\
Lexical Semantics\tPredicate-Argument Structure\tLogic\tKnowledge\tDomain\tPremise\tHypothesis\tLabel
Negation\t\tNegation;Conditionals\t\tx\tThe cat sat\tThe cat did not sit\tcontradiction
\tCoordination\t\tCommon sense\tx\tA dog ran\tAn animal ran\tentailment
Quantifiers\tCoordination\tConditionals\tCommon sense\tx\tAll birds fly\tSome birds fly\tneutral
";

    fn task(dir: &Path) -> DiagnosticTask {
        fs::write(dir.join(DIAGNOSTIC_FILE), FIXTURE).unwrap();
        DiagnosticTask::new("mnli-diagnostic", dir, &TaskContext::whitespace(dir), &TaskOptions::new()).unwrap()
    }

    fn instances(task: &DiagnosticTask) -> Vec<Instance> {
        task.process_split(task.split_text(Split::Test).unwrap(), &TokenIndexer::default())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap()
    }

    #[test]
    fn test_any_tag_field_matches_presence_in_every_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let task = task(dir.path());
        let insts = instances(&task);
        assert_eq!(insts.len(), 3);

        let expected = [[1, 0, 1, 0], [0, 1, 0, 1], [1, 1, 1, 1]];
        for (inst, row) in insts.iter().zip(expected) {
            for (dim, want) in Dimension::ALL.iter().zip(row) {
                assert_eq!(inst.label(dim.as_str()), Some(want), "{dim}");
            }
        }
    }

    #[test]
    fn test_one_presence_field_per_tag() {
        let dir = tempfile::tempdir().unwrap();
        let task = task(dir.path());
        let insts = instances(&task);
        assert_eq!(insts[0].label("logic__Negation"), Some(1));
        assert_eq!(insts[0].label("logic__Conditionals"), Some(1));
        assert_eq!(insts[1].label("logic__Conditionals"), Some(0));
        assert_eq!(insts[2].label("lex_sem__Quantifiers"), Some(1));
        assert_eq!(insts[2].label("lex_sem__Negation"), Some(0));
        assert_eq!(insts[0].label("labels"), Some(2));
        assert_eq!(insts[0].label("idx"), Some(0));
    }

    #[test]
    fn test_scorer_names_are_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let task = task(dir.path());
        let names: Vec<String> = task.scorer_names().collect();
        assert!(names.contains(&"scorer__lex_sem".to_string()));
        assert!(names.contains(&"scorer__knowledge__Common sense".to_string()));
        assert!(names.contains(&"scorer__logic__Conditionals".to_string()));
        // 4 dimensions + Negation, Quantifiers, Coordination, Negation, Conditionals, Common sense
        assert_eq!(names.len(), 10);
    }

    #[test]
    fn test_batches_without_tagged_rows_leave_scorer_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut task = task(dir.path());
        let masks = BTreeMap::from([
            ("lex_sem".to_string(), vec![true, false, true]),
            ("knowledge".to_string(), vec![false, false, false]),
        ]);
        task.update_metrics(&Predictions::Tagged { predicted: vec![2, 1, 0], gold: vec![2, 1, 1], masks })
            .unwrap();

        assert_eq!(task.scorers[&ScorerKey::dimension(Dimension::LexSem)].len(), 2);
        assert!(task.scorers[&ScorerKey::dimension(Dimension::Knowledge)].is_empty());

        let m = task.metrics(true);
        assert_eq!(m["accuracy"], 0.0);
        assert_eq!(m["knowledge"], 0.0);
        assert!(m.contains_key("logic__Conditionals"));
    }

    #[test]
    fn test_mask_length_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut task = task(dir.path());
        let masks = BTreeMap::from([("logic".to_string(), vec![true])]);
        let err = task
            .update_metrics(&Predictions::Tagged { predicted: vec![0, 1], gold: vec![0, 1], masks })
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<TaskError>(), Some(TaskError::PredictionMismatch(_))));
    }
}
