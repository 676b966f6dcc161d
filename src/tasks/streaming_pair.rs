// ============================================================
// Layer 5 — Streamed Sentence Pairs
// ============================================================
// Pair tasks whose corpora are read from disk on every pass.
//
//   Reddit                {split}.csv     cols 2, 3 (≥ 4 cols)  label 1
//   Bitext                {split}.txt     cols 0, 1 (≥ 2 cols)  label 1
//   DisSent               {prefix}.train / .valid / .test,
//                         exactly 3 non-empty cols, label = int(col 2)
//   ConsecutiveSentences  WikiText sentences, (prev, next)   label 1
//
// The same corpora feed two objectives: ranking (the model
// scores true pairs against in-batch negatives and reports a
// running mean of batch accuracy) and plain pair classification.
//
// Reference: Rust Book §13 (Iterators)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{path::Path, sync::Arc};
use tracing::{debug, info};

use crate::data::dataset::LABEL_NAMESPACE;
use crate::domain::{
    error::TaskError,
    instance::{Field, Instance, TokenIndexer},
    prediction::{MetricMap, Predictions},
    split::Split,
    traits::{Aggregator, SentenceTokenizer},
};
use crate::infra::metrics::{Average, CategoricalAccuracy};
use crate::infra::tokenizer::{process_sentence, Sentinels};
use crate::tasks::{
    stream::{
        count_file_lines, require_files, row_stream, sentence_stream, split_files, split_files_named,
        Consecutive, LineFormat, SplitFiles,
    },
    wrong_predictions, wrong_split, ExampleCounts, InstanceStream, PairStream, SentencePair,
    SentenceStream, SplitText, Task, TaskContext, TaskKind, TaskOptions,
};

/// On-disk layout of a paired corpus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairFormat {
    /// `{split}.csv`, context and response in columns 2 and 3
    Reddit,
    /// `{split}.txt`, source and translation in columns 0 and 1
    Bitext,
    /// `{prefix}.{train,valid,test}`, two sentences and a marker id
    DisSent,
    /// Adjacent lines of a WikiText sentence file
    ConsecutiveSentences,
}

/// What the model is scored on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairObjective {
    /// Pick the true response among the batch; one class
    Ranking,
    Classification { n_classes: usize },
}

impl PairFormat {
    fn files(&self, name: &str, dir: &Path, opts: &TaskOptions) -> Result<SplitFiles, TaskError> {
        Ok(match self {
            PairFormat::Reddit => split_files_named(dir, ".csv"),
            PairFormat::Bitext => split_files_named(dir, ".txt"),
            PairFormat::DisSent => {
                let prefix = opts
                    .prefix
                    .as_deref()
                    .ok_or_else(|| TaskError::missing_option(name, "prefix"))?;
                split_files(
                    dir,
                    &format!("{prefix}.train"),
                    &format!("{prefix}.valid"),
                    &format!("{prefix}.test"),
                )
            }
            PairFormat::ConsecutiveSentences => {
                split_files(dir, "train.sentences.txt", "valid.sentences.txt", "test.sentences.txt")
            }
        })
    }
}

fn row_pair(
    format: PairFormat,
    row: &[&str],
    tokenizer: &dyn SentenceTokenizer,
    max_seq_len: usize,
) -> Option<Result<SentencePair>> {
    let (first, second, label) = match format {
        PairFormat::Reddit if row.len() >= 4 => (row[2], row[3], 1),
        PairFormat::Bitext if row.len() >= 2 => (row[0], row[1], 1),
        PairFormat::DisSent if row.len() == 3 && !row[2].is_empty() => match row[2].trim().parse() {
            Ok(label) => (row[0], row[1], label),
            Err(_) => {
                debug!("skipping DisSent row with label '{}'", row[2]);
                return None;
            }
        },
        _ => return None,
    };
    if first.is_empty() || second.is_empty() {
        return None;
    }
    let pair = process_sentence(tokenizer, first, max_seq_len, Sentinels::INPUT).and_then(|first| {
        let second = process_sentence(tokenizer, second, max_seq_len, Sentinels::INPUT)?;
        Ok(SentencePair { first, second, label })
    });
    Some(pair)
}

enum Scorer {
    /// Running mean of per-batch accuracy
    Ranking(Average),
    Classification(CategoricalAccuracy),
}

/// Paired sentences streamed from disk on every pass
pub struct StreamingPairTask {
    name: String,
    format: PairFormat,
    objective: PairObjective,
    files: SplitFiles,
    max_seq_len: usize,
    tokenizer: Arc<dyn SentenceTokenizer>,
    scorer: Scorer,
}

impl StreamingPairTask {
    /// Fails if a split file is missing, or if DisSent has no `prefix`
    pub fn new(
        name: &str,
        dir: &Path,
        format: PairFormat,
        objective: PairObjective,
        ctx: &TaskContext,
        opts: &TaskOptions,
    ) -> Result<Self> {
        let files = format.files(name, dir, opts)?;
        require_files(name, &files)?;
        info!("{}: streaming {:?} pairs from {}", name, format, dir.display());

        let scorer = match objective {
            PairObjective::Ranking              => Scorer::Ranking(Average::new()),
            PairObjective::Classification { .. } => Scorer::Classification(CategoricalAccuracy::new()),
        };
        Ok(Self {
            name: name.to_string(),
            format,
            objective,
            files,
            max_seq_len: ctx.max_seq_len,
            tokenizer: Arc::clone(&ctx.tokenizer),
            scorer,
        })
    }

    /// Layout the task was registered with
    pub fn format(&self) -> PairFormat {
        self.format
    }

    fn pair_stream(&self, split: Split) -> Result<PairStream<'_>> {
        let path = self
            .files
            .get(&split)
            .ok_or_else(|| TaskError::missing_split(self.name.as_str(), split))?;
        let tokenizer = self.tokenizer.as_ref();
        let max_seq_len = self.max_seq_len;

        if self.format == PairFormat::ConsecutiveSentences {
            let sents = sentence_stream(path, tokenizer, max_seq_len, LineFormat::WikiText { drop_markup: true })?;
            return Ok(Box::new(Consecutive::new(sents).map(|pair| {
                pair.map(|(first, second)| SentencePair { first, second, label: 1 })
            })));
        }
        let format = self.format;
        row_stream(path, move |row| row_pair(format, row, tokenizer, max_seq_len))
    }

    fn make_instance(pair: SentencePair, indexer: &TokenIndexer) -> Instance {
        Instance::new()
            .with("input1", Field::text(pair.first, indexer))
            .with("input2", Field::text(pair.second, indexer))
            .with("labels", Field::label(pair.label, LABEL_NAMESPACE))
    }
}

impl Task for StreamingPairTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TaskKind {
        match self.objective {
            PairObjective::Ranking              => TaskKind::Ranking,
            PairObjective::Classification { .. } => TaskKind::Classification,
        }
    }

    fn input_arity(&self) -> usize {
        2
    }

    fn n_classes(&self) -> usize {
        match self.objective {
            PairObjective::Ranking                   => 1,
            PairObjective::Classification { n_classes } => n_classes,
        }
    }

    fn val_metric_key(&self) -> &str {
        "accuracy"
    }

    fn tokenizer_name(&self) -> &str {
        self.tokenizer.name()
    }

    fn sentences(&self) -> Result<SentenceStream<'_>> {
        if self.format == PairFormat::ConsecutiveSentences {
            let format = LineFormat::WikiText { drop_markup: true };
            let mut streams = Vec::new();
            for split in [Split::Train, Split::Val] {
                let path = self
                    .files
                    .get(&split)
                    .ok_or_else(|| TaskError::missing_split(self.name.as_str(), split))?;
                streams.push(sentence_stream(path, self.tokenizer.as_ref(), self.max_seq_len, format)?);
            }
            return Ok(Box::new(streams.into_iter().flatten()));
        }
        let pairs = self.pair_stream(Split::Train)?.chain(self.pair_stream(Split::Val)?);
        Ok(Box::new(pairs.flat_map(|pair| match pair {
            Ok(p)  => vec![Ok(p.first), Ok(p.second)],
            Err(e) => vec![Err(e)],
        })))
    }

    fn split_text(&self, split: Split) -> Result<SplitText<'_>> {
        Ok(SplitText::Pairs(self.pair_stream(split)?))
    }

    fn count_examples(&self) -> Result<ExampleCounts> {
        let minus = usize::from(self.format == PairFormat::ConsecutiveSentences);
        count_file_lines(&self.files, minus)
    }

    fn process_split<'a>(&'a self, text: SplitText<'a>, indexer: &TokenIndexer) -> Result<InstanceStream<'a>> {
        let pairs = match text {
            SplitText::Pairs(pairs) => pairs,
            other => return Err(wrong_split(&self.name, &other)),
        };
        let indexer = indexer.clone();
        Ok(Box::new(pairs.map(move |p| p.map(|p| Self::make_instance(p, &indexer)))))
    }

    fn update_metrics(&mut self, predictions: &Predictions) -> Result<()> {
        let (predicted, gold) = match predictions {
            Predictions::Classes { predicted, gold } => (predicted, gold),
            other => return Err(wrong_predictions(&self.name, other)),
        };
        match &mut self.scorer {
            Scorer::Classification(acc) => acc.update(predicted, gold)?,
            Scorer::Ranking(avg) => {
                if predicted.len() != gold.len() {
                    return Err(TaskError::PredictionMismatch(format!(
                        "{} predictions for {} gold labels",
                        predicted.len(),
                        gold.len()
                    ))
                    .into());
                }
                if !gold.is_empty() {
                    let correct = predicted.iter().zip(gold).filter(|(p, g)| p == g).count();
                    avg.update(correct as f64 / gold.len() as f64);
                }
            }
        }
        Ok(())
    }

    fn metrics(&mut self, reset: bool) -> MetricMap {
        let acc = match &mut self.scorer {
            Scorer::Ranking(avg)        => avg.get(reset),
            Scorer::Classification(acc) => acc.get(reset),
        };
        MetricMap::from([("accuracy".to_string(), acc)])
    }
}
