// ============================================================
// Layer 5 — Language Modeling
// ============================================================
// Streams one sentence per line; nothing is held in memory.
// Every sentence s = [s0, s1, ..., sn] becomes
//
//   input    s
//   targs    [s1, ..., sn, s0]      forward, wraps the first token
//   targs_b  [sn, s0, ..., sn-1]    backward, wraps the last token
//
// so neither direction needs the sentinels stripped.
//
// Corpora:
//   Plain     train.txt / valid.txt / test.txt
//   WikiText  *.sentences.txt, atomic <unk>, header lines dropped
//
// Metric: perplexity = exp(mean NLL); lower is better.
//
// Reference: Rust Book §13 (Iterators)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{path::Path, sync::Arc};
use tracing::info;

use crate::domain::{
    error::TaskError,
    instance::{Field, Instance, TokenIndexer, DEFAULT_TOKEN_NAMESPACE},
    prediction::{MetricMap, Predictions},
    split::Split,
    traits::{Aggregator, SentenceTokenizer},
};
use crate::infra::metrics::Average;
use crate::tasks::{
    backward_targets, forward_targets,
    stream::{count_file_lines, require_files, sentence_stream, split_files, LineFormat, SplitFiles},
    wrong_predictions, wrong_split, ExampleCounts, InstanceStream, SentenceStream, SplitText, Task,
    TaskContext, TaskKind, TaskOptions,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LmCorpus {
    Plain,
    WikiText,
}

impl LmCorpus {
    pub fn files(&self, dir: &Path) -> SplitFiles {
        match self {
            LmCorpus::Plain    => split_files(dir, "train.txt", "valid.txt", "test.txt"),
            LmCorpus::WikiText => {
                split_files(dir, "train.sentences.txt", "valid.sentences.txt", "test.sentences.txt")
            }
        }
    }

    fn line_format(&self) -> LineFormat {
        match self {
            LmCorpus::Plain    => LineFormat::Plain,
            LmCorpus::WikiText => LineFormat::WikiText { drop_markup: true },
        }
    }
}

pub struct LanguageModelingTask {
    name: String,
    corpus: LmCorpus,
    files: SplitFiles,
    max_seq_len: usize,
    tokenizer: Arc<dyn SentenceTokenizer>,
    target_indexer: TokenIndexer,
    nll: Average,
}

impl LanguageModelingTask {
    pub fn new(name: &str, dir: &Path, corpus: LmCorpus, ctx: &TaskContext, _opts: &TaskOptions) -> Result<Self> {
        let files = corpus.files(dir);
        require_files(name, &files)?;
        info!("{}: streaming {:?} corpus from {}", name, corpus, dir.display());
        Ok(Self {
            name: name.to_string(),
            corpus,
            files,
            max_seq_len: ctx.max_seq_len,
            tokenizer: Arc::clone(&ctx.tokenizer),
            target_indexer: TokenIndexer::new(DEFAULT_TOKEN_NAMESPACE),
            nll: Average::new(),
        })
    }

    fn stream(&self, split: Split) -> Result<SentenceStream<'_>> {
        let path = self
            .files
            .get(&split)
            .ok_or_else(|| TaskError::missing_split(self.name.as_str(), split))?;
        sentence_stream(path, self.tokenizer.as_ref(), self.max_seq_len, self.corpus.line_format())
    }

    fn make_instance(&self, sent: Vec<String>, indexer: &TokenIndexer) -> Instance {
        let targs = forward_targets(&sent);
        let targs_b = backward_targets(&sent);
        Instance::new()
            .with("input", Field::text(sent, indexer))
            .with("targs", Field::text(targs, &self.target_indexer))
            .with("targs_b", Field::text(targs_b, &self.target_indexer))
    }
}

impl Task for LanguageModelingTask {
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

    fn sentences(&self) -> Result<SentenceStream<'_>> {
        let train = self.stream(Split::Train)?;
        let val = self.stream(Split::Val)?;
        Ok(Box::new(train.chain(val)))
    }

    fn split_text(&self, split: Split) -> Result<SplitText<'_>> {
        Ok(SplitText::Sentences(self.stream(split)?))
    }

    /// Raw line counts, without reading sentences
    fn count_examples(&self) -> Result<ExampleCounts> {
        count_file_lines(&self.files, 0)
    }

    fn process_split<'a>(&'a self, text: SplitText<'a>, indexer: &TokenIndexer) -> Result<InstanceStream<'a>> {
        let sents = match text {
            SplitText::Sentences(sents) => sents,
            other => return Err(wrong_split(&self.name, &other)),
        };
        let indexer = indexer.clone();
        Ok(Box::new(sents.map(move |s| s.map(|s| self.make_instance(s, &indexer)))))
    }

    fn update_metrics(&mut self, predictions: &Predictions) -> Result<()> {
        match predictions {
            Predictions::Sequence { nll, .. } => {
                self.nll.update(*nll);
                Ok(())
            }
            other => Err(wrong_predictions(&self.name, other)),
        }
    }

    fn metrics(&mut self, reset: bool) -> MetricMap {
        MetricMap::from([("perplexity".to_string(), self.nll.get(reset).exp())])
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn bwb(dir: &Path) -> LanguageModelingTask {
        fs::write(dir.join("train.txt"), "the cat sat\n\na dog\n").unwrap();
        fs::write(dir.join("valid.txt"), "one more\n").unwrap();
        fs::write(dir.join("test.txt"), "secret line\n").unwrap();
        LanguageModelingTask::new("bwb", dir, LmCorpus::Plain, &TaskContext::whitespace(dir), &TaskOptions::new())
            .unwrap()
    }

    #[test]
    fn test_missing_file_fails_construction() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = TaskContext::whitespace(dir.path());
        assert!(LanguageModelingTask::new("wiki103", dir.path(), LmCorpus::WikiText, &ctx, &TaskOptions::new())
            .is_err());
    }

    #[test]
    fn test_targets_are_rotations_of_input() {
        let dir = tempfile::tempdir().unwrap();
        let task = bwb(dir.path());
        let instances: Vec<Instance> = task
            .process_split(task.split_text(Split::Train).unwrap(), &TokenIndexer::default())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(instances.len(), 2);

        for inst in &instances {
            let input = inst.tokens("input").unwrap();
            let fwd = inst.tokens("targs").unwrap();
            let bwd = inst.tokens("targs_b").unwrap();
            let n = input.len();
            for i in 0..n {
                assert_eq!(fwd[i], input[(i + 1) % n]);
                assert_eq!(bwd[i], input[(i + n - 1) % n]);
            }
        }
    }

    #[test]
    fn test_sentences_are_repeatable_and_exclude_test() {
        let dir = tempfile::tempdir().unwrap();
        let task = bwb(dir.path());
        let a: Vec<Vec<String>> = task.sentences().unwrap().collect::<Result<_>>().unwrap();
        let b: Vec<Vec<String>> = task.sentences().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
        assert!(a.iter().flatten().all(|t| t != "secret"));
    }

    #[test]
    fn test_counts_are_raw_lines() {
        let dir = tempfile::tempdir().unwrap();
        let task = bwb(dir.path());
        let counts = task.count_examples().unwrap();
        assert_eq!(counts[&Split::Train], 3);
        assert_eq!(counts[&Split::Test], 1);
    }

    #[test]
    fn test_perplexity() {
        let dir = tempfile::tempdir().unwrap();
        let mut task = bwb(dir.path());
        assert_eq!(task.val_metric(), "bwb_perplexity");
        task.update_metrics(&Predictions::Sequence { nll: 2.0, unk_ratio: None }).unwrap();
        task.update_metrics(&Predictions::Sequence { nll: 0.0, unk_ratio: None }).unwrap();
        assert!((task.metrics(true)["perplexity"] - 1f64.exp()).abs() < 1e-9);
        assert_eq!(task.metrics(true)["perplexity"], 1.0);
    }
}
