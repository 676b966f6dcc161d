// ============================================================
// Layer 5 — Edge Probing
// ============================================================
// Span classification with many targets per sentence. Each
// record (one JSON line) becomes one Instance:
//
//   idx      Metadata(position in split)
//   input1   [<SOS>] + text.split() + [<EOS>]
//   span1s   List[Span]   one per target
//   span2s   List[Span]   one per target, unless single-sided
//   labels   List[MultiLabel]   always a set, even for one label
//
// Record spans are half-open [start, end); Span fields are
// inclusive and shifted by one for the injected <SOS>:
//
//   [start, end)  →  Span(start + 1, end)
//
// Files read are `{file}.retokenized.{tokenizer name}`. The
// tokenizer named there must be the one that produced the span
// offsets; nothing here can check that.
//
// Metrics: mcc, acc (exact row match), precision, recall, f1
// over the flattened binary label matrix. Val key: f1.
//
// Reference: Rust Book §10 (Traits), serde_json docs

use anyhow::{anyhow, Context, Result};
use std::{collections::BTreeMap, path::{Path, PathBuf}};
use tracing::info;

use crate::data::{jsonl::load_edge_records, lines::read_nonempty_lines};
use crate::domain::{
    error::TaskError,
    instance::{Field, Instance, TokenIndexer},
    prediction::{MetricMap, Predictions},
    record::{EdgeRecord, TokenSpan},
    split::Split,
    traits::Aggregator,
};
use crate::infra::metrics::{BooleanAccuracy, F1Measure, MatthewsCorrelation};
use crate::infra::tokenizer::{EOS_TOK, SOS_TOK};
use crate::tasks::{
    wrong_predictions, wrong_split, InstanceStream, SentenceStream, SplitText, Task, TaskContext,
    TaskKind, TaskOptions,
};

/// Suffix tying a data file to the tokenizer that produced it
pub fn retokenized_path(dir: &Path, file: &str, tokenizer_name: &str) -> PathBuf {
    dir.join(format!("{file}.retokenized.{tokenizer_name}"))
}

fn span_field(span: TokenSpan) -> Field {
    Field::span(span.start + 1, span.end)
}

pub struct EdgeProbingTask {
    name: String,
    tokenizer_name: String,
    records: BTreeMap<Split, Vec<EdgeRecord>>,
    labels: Vec<String>,
    label_namespace: String,
    is_symmetric: bool,
    single_sided: bool,
    mcc: MatthewsCorrelation,
    acc: BooleanAccuracy,
    f1: F1Measure,
}

impl EdgeProbingTask {
    pub fn new(name: &str, dir: &Path, ctx: &TaskContext, opts: &TaskOptions) -> Result<Self> {
        let label_file = opts.require_label_file(name)?;
        let files = opts.require_files(name)?;
        let tokenizer_name = ctx.tokenizer.name().to_string();

        let mut records = BTreeMap::new();
        for (split, file) in files {
            let path = retokenized_path(dir, file, &tokenizer_name);
            let (loaded, _) = load_edge_records(&path)
                .with_context(|| format!("{name}: loading {split} records"))?;
            records.insert(*split, loaded);
        }

        let labels = read_nonempty_lines(&dir.join(label_file))?;
        info!("{}: {} labels, splits {:?}", name, labels.len(), records.keys().collect::<Vec<_>>());

        Ok(Self {
            name: name.to_string(),
            tokenizer_name,
            records,
            label_namespace: format!("{name}_labels"),
            labels,
            is_symmetric: opts.is_symmetric,
            single_sided: opts.single_sided,
            mcc: MatthewsCorrelation::new(),
            acc: BooleanAccuracy::new(),
            f1: F1Measure::new(1),
        })
    }

    pub fn is_symmetric(&self) -> bool {
        self.is_symmetric
    }

    pub fn single_sided(&self) -> bool {
        self.single_sided
    }

    pub fn label_namespace(&self) -> &str {
        &self.label_namespace
    }

    fn make_instance(&self, record: &EdgeRecord, idx: usize, indexer: &TokenIndexer) -> Result<Instance> {
        let mut tokens = Vec::with_capacity(record.tokens().len() + 2);
        tokens.push(SOS_TOK.to_string());
        tokens.extend(record.tokens());
        tokens.push(EOS_TOK.to_string());

        let span1s = record.targets.iter().map(|t| span_field(t.span1)).collect();
        let labels = record
            .targets
            .iter()
            .map(|t| Field::multi_label(t.label.0.clone(), self.label_namespace.as_str()))
            .collect();

        let mut inst = Instance::new()
            .with("idx", Field::metadata(idx.to_string()))
            .with("input1", Field::text(tokens, indexer))
            .with("span1s", Field::list(span1s))
            .with("labels", Field::list(labels));

        if !self.single_sided {
            let span2s = record
                .targets
                .iter()
                .enumerate()
                .map(|(j, t)| {
                    t.span2.map(span_field).ok_or_else(|| {
                        anyhow!("{}: record {} target {} has no span2", self.name, idx, j)
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            inst.insert("span2s", Field::list(span2s));
        }
        Ok(inst)
    }
}

impl Task for EdgeProbingTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Span
    }

    fn input_arity(&self) -> usize {
        1
    }

    fn n_classes(&self) -> usize {
        self.labels.len()
    }

    fn val_metric_key(&self) -> &str {
        "f1"
    }

    fn tokenizer_name(&self) -> &str {
        &self.tokenizer_name
    }

    fn sentences(&self) -> Result<SentenceStream<'_>> {
        let iter = self
            .records
            .iter()
            .filter(|(split, _)| !split.is_test())
            .flat_map(|(_, records)| records.iter())
            .map(|r| Ok(r.tokens()));
        Ok(Box::new(iter))
    }

    fn split_text(&self, split: Split) -> Result<SplitText<'_>> {
        self.records
            .get(&split)
            .map(|r| SplitText::Records(r.as_slice()))
            .ok_or_else(|| TaskError::missing_split(self.name.as_str(), split).into())
    }

    fn num_examples(&self, text: SplitText<'_>) -> Result<usize> {
        match text {
            SplitText::Records(records) => Ok(records.len()),
            other => Err(wrong_split(&self.name, &other)),
        }
    }

    fn process_split<'a>(&'a self, text: SplitText<'a>, indexer: &TokenIndexer) -> Result<InstanceStream<'a>> {
        let records = match text {
            SplitText::Records(records) => records,
            other => return Err(wrong_split(&self.name, &other)),
        };
        let indexer = indexer.clone();
        Ok(Box::new(
            records
                .iter()
                .enumerate()
                .map(move |(i, r)| self.make_instance(r, i, &indexer)),
        ))
    }

    fn all_labels(&self) -> Option<Vec<String>> {
        Some(self.labels.clone())
    }

    fn update_metrics(&mut self, predictions: &Predictions) -> Result<()> {
        let Predictions::MultiLabel { predicted, gold } = predictions else {
            return Err(wrong_predictions(&self.name, predictions));
        };
        let flat_pred: Vec<u8> = predicted.iter().flatten().copied().collect();
        let flat_gold: Vec<u8> = gold.iter().flatten().copied().collect();

        self.acc.update(predicted, gold)?;
        self.mcc.update(&flat_pred, &flat_gold)?;
        let as_ids = |v: &[u8]| v.iter().map(|&b| i64::from(b > 0)).collect::<Vec<_>>();
        self.f1.update(&as_ids(&flat_pred), &as_ids(&flat_gold))?;
        Ok(())
    }

    fn metrics(&mut self, reset: bool) -> MetricMap {
        let prf = self.f1.get(reset);
        MetricMap::from([
            ("mcc".to_string(), self.mcc.get(reset)),
            ("acc".to_string(), self.acc.get(reset)),
            ("precision".to_string(), prf.precision),
            ("recall".to_string(), prf.recall),
            ("f1".to_string(), prf.f1),
        ])
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const RECORDS: &str = r#"{"text": "John saw Mary", "targets": [{"span1": [0, 1], "span2": [2, 3], "label": "ARG0"}, {"span1": [1, 2], "span2": [2, 3], "label": ["ARG1", "X"]}]}
{"text": "empty", "targets": []}
{"text": "Mary ran", "targets": [{"span1": [0, 2], "span2": [0, 1], "label": "ARG0"}]}
"#;

    fn setup(dir: &Path) -> TaskOptions {
        for f in ["train.json", "dev.json", "test.json"] {
            fs::write(dir.join(format!("{f}.retokenized.WhitespaceTokenizer")), RECORDS).unwrap();
        }
        fs::write(dir.join("labels.txt"), "ARG0\nARG1\nX\n").unwrap();
        TaskOptions::new().label_file("labels.txt").files("train.json", "dev.json", "test.json")
    }

    #[test]
    fn test_requires_label_file_and_splits() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = TaskContext::whitespace(dir.path());
        let err = EdgeProbingTask::new("edges-x", dir.path(), &ctx, &TaskOptions::new()).err().unwrap();
        assert_eq!(
            err.downcast_ref::<TaskError>(),
            Some(&TaskError::missing_option("edges-x", "label_file"))
        );
        let only_labels = TaskOptions::new().label_file("labels.txt");
        let err = EdgeProbingTask::new("edges-x", dir.path(), &ctx, &only_labels).err().unwrap();
        assert_eq!(
            err.downcast_ref::<TaskError>(),
            Some(&TaskError::missing_option("edges-x", "files_by_split"))
        );
    }

    #[test]
    fn test_counts_exclude_empty_records() {
        let dir = tempfile::tempdir().unwrap();
        let opts = setup(dir.path());
        let task = EdgeProbingTask::new("edges-x", dir.path(), &TaskContext::whitespace(dir.path()), &opts).unwrap();
        assert_eq!(task.num_examples(task.split_text(Split::Train).unwrap()).unwrap(), 2);
        assert_eq!(task.n_classes(), 3);
        assert_eq!(task.val_metric(), "edges-x_f1");
    }

    #[test]
    fn test_instance_spans_are_shifted() {
        let dir = tempfile::tempdir().unwrap();
        let opts = setup(dir.path());
        let task = EdgeProbingTask::new("edges-x", dir.path(), &TaskContext::whitespace(dir.path()), &opts).unwrap();
        let inst = task
            .process_split(task.split_text(Split::Val).unwrap(), &TokenIndexer::default())
            .unwrap()
            .next()
            .unwrap()
            .unwrap();

        assert_eq!(inst.tokens("input1").unwrap(), ["<SOS>", "John", "saw", "Mary", "<EOS>"]);
        // [0, 1) → Span(1, 1); [2, 3) → Span(3, 3)
        assert_eq!(inst.list("span1s").unwrap()[0], Field::span(1, 1));
        assert_eq!(inst.list("span2s").unwrap()[0], Field::span(3, 3));
        assert_eq!(
            inst.list("labels").unwrap()[0],
            Field::multi_label(vec!["ARG0".into()], "edges-x_labels")
        );
        assert_eq!(inst.get("idx"), Some(&Field::metadata("0")));
    }

    #[test]
    fn test_single_sided_has_no_span2s() {
        let dir = tempfile::tempdir().unwrap();
        let opts = setup(dir.path()).single_sided();
        let task = EdgeProbingTask::new("edges-x", dir.path(), &TaskContext::whitespace(dir.path()), &opts).unwrap();
        let inst = task
            .process_split(task.split_text(Split::Train).unwrap(), &TokenIndexer::default())
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        assert!(!inst.contains("span2s"));
    }

    #[test]
    fn test_sentences_skip_test_records() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = setup(dir.path());
        fs::write(
            dir.path().join("secret.json.retokenized.WhitespaceTokenizer"),
            r#"{"text": "hidden words", "targets": [{"span1": [0, 1], "label": "X"}]}"#,
        )
        .unwrap();
        opts.files_by_split.as_mut().unwrap().insert(Split::Test, "secret.json".into());
        let task = EdgeProbingTask::new("edges-x", dir.path(), &TaskContext::whitespace(dir.path()), &opts).unwrap();

        let sents: Vec<Vec<String>> = task.sentences().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(sents.len(), 4);
        assert!(sents.iter().flatten().all(|t| t != "hidden"));
    }

    #[test]
    fn test_metrics_over_label_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let opts = setup(dir.path());
        let mut task = EdgeProbingTask::new("edges-x", dir.path(), &TaskContext::whitespace(dir.path()), &opts).unwrap();
        task.update_metrics(&Predictions::MultiLabel {
            predicted: vec![vec![1, 0, 0], vec![0, 1, 0]],
            gold: vec![vec![1, 0, 0], vec![0, 1, 1]],
        })
        .unwrap();
        let m = task.metrics(true);
        assert_eq!(m["acc"], 0.5);
        assert_eq!(m["precision"], 1.0);
        assert!((m["recall"] - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(m.len(), 5);

        let empty = task.metrics(true);
        assert!(empty.values().all(|v| *v == 0.0));
    }
}
