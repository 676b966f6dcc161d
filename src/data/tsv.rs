// ============================================================
// Layer 4 — Delimited Row Loader
// ============================================================
// Reads one tab-separated file into a ColumnarSplit.
//
// A `TsvSpec` says where things live in a row:
//
//   s1_idx     column of the first sentence (required)
//   s2_idx     column of the second sentence (pair tasks)
//   targ_idx   column of the target; negative counts from the end
//              (-1 = last column). None → every target is 0.
//   idx_idx    column holding an example id; None → 0, 1, 2, ...
//   skip_rows  header rows to skip
//   targ_map   string label → class id (e.g. "entailment" → 1)
//   filter     keep only rows whose column equals a value
//              (used for per-genre MNLI subsets)
//   target     how to read the target cell (label, scaled score,
//              space-separated tag sequence)
//
// Row-level problems never fail the load. A row that is too
// short, has an empty first sentence, an empty or unparseable
// target, or an unmapped label is skipped, logged with file and
// line number, and counted. The totals are logged once per file.
//
// Reference: Rust Book §9 (Error Handling), §13 (Iterators)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path};
use tracing::{info, warn};

use crate::data::columnar::{ColumnarSplit, TargetValue, Targets};
use crate::data::lines::open_lines;
use crate::domain::traits::SentenceTokenizer;
use crate::infra::tokenizer::{process_sentence, Sentinels};

// ─── TsvSpec ──────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowFilter {
    pub column: usize,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetKind {
    Label,
    /// Numeric target divided by `scale`
    Score { scale: f64 },
    /// Space-separated tags, one per token
    TagSequence,
}

impl Default for TargetKind {
    fn default() -> Self {
        TargetKind::Label
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TsvSpec {
    pub s1_idx: usize,
    pub s2_idx: Option<usize>,
    pub targ_idx: Option<isize>,
    pub idx_idx: Option<usize>,
    pub skip_rows: usize,
    pub targ_map: Option<BTreeMap<String, i64>>,
    pub filter: Option<RowFilter>,
    pub target: TargetKind,
}

impl TsvSpec {
    pub fn single(s1_idx: usize) -> Self {
        Self { s1_idx, ..Self::default() }
    }

    pub fn pair(s1_idx: usize, s2_idx: usize) -> Self {
        Self { s1_idx, s2_idx: Some(s2_idx), ..Self::default() }
    }

    pub fn target(mut self, targ_idx: isize) -> Self {
        self.targ_idx = Some(targ_idx);
        self
    }

    pub fn index(mut self, idx_idx: usize) -> Self {
        self.idx_idx = Some(idx_idx);
        self
    }

    pub fn skip(mut self, skip_rows: usize) -> Self {
        self.skip_rows = skip_rows;
        self
    }

    pub fn label_map(mut self, pairs: &[(&str, i64)]) -> Self {
        self.targ_map = Some(pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect());
        self
    }

    pub fn filter(mut self, column: usize, value: impl Into<String>) -> Self {
        self.filter = Some(RowFilter { column, value: value.into() });
        self
    }

    pub fn scores(mut self, scale: f64) -> Self {
        self.target = TargetKind::Score { scale };
        self
    }

    pub fn tags(mut self) -> Self {
        self.target = TargetKind::TagSequence;
        self
    }

    fn empty_targets(&self) -> Targets {
        match self.target {
            TargetKind::Label       => Targets::Labels(Vec::new()),
            TargetKind::Score { .. } => Targets::Scores(Vec::new()),
            TargetKind::TagSequence => Targets::Tags(Vec::new()),
        }
    }

    /// Target when the file has no target column
    fn dummy_target(&self) -> TargetValue {
        match self.target {
            TargetKind::Label       => TargetValue::Label(0),
            TargetKind::Score { .. } => TargetValue::Score(0.0),
            TargetKind::TagSequence => TargetValue::Tags(Vec::new()),
        }
    }
}

/// Resolve a possibly negative column index against a row
pub fn resolve_column(idx: isize, width: usize) -> Option<usize> {
    if idx >= 0 {
        let i = idx as usize;
        (i < width).then_some(i)
    } else {
        width.checked_sub(idx.unsigned_abs())
    }
}

// ─── Loading ──────────────────────────────────────────────────────────────────
/// Counters from one pass over a file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TsvStats {
    pub rows: usize,
    pub kept: usize,
    pub filtered: usize,
    pub skipped: usize,
}

pub fn load_tsv(
    path: &Path,
    spec: &TsvSpec,
    tokenizer: &dyn SentenceTokenizer,
    max_seq_len: usize,
) -> Result<ColumnarSplit> {
    load_tsv_with_stats(path, spec, tokenizer, max_seq_len).map(|(split, _)| split)
}

pub fn load_tsv_with_stats(
    path: &Path,
    spec: &TsvSpec,
    tokenizer: &dyn SentenceTokenizer,
    max_seq_len: usize,
) -> Result<(ColumnarSplit, TsvStats)> {
    let mut split = ColumnarSplit::empty(spec.s2_idx.is_some(), spec.empty_targets());
    let mut stats = TsvStats::default();

    for (line_no, line) in open_lines(path)?.enumerate() {
        let line = line.with_context(|| format!("Read error in '{}'", path.display()))?;
        if line_no < spec.skip_rows {
            continue;
        }
        stats.rows += 1;
        let row: Vec<&str> = line.split('\t').collect();

        if let Some(filter) = &spec.filter {
            if row.get(filter.column).map(|v| v.trim()) != Some(filter.value.as_str()) {
                stats.filtered += 1;
                continue;
            }
        }

        match parse_row(&row, spec, stats.kept, tokenizer, max_seq_len) {
            Ok((s1, s2, target, idx)) => {
                split.push_row(s1, s2, target, idx)?;
                stats.kept += 1;
            }
            Err(reason) => {
                warn!("{}:{}: skipping row ({})", path.display(), line_no + 1, reason);
                stats.skipped += 1;
            }
        }
    }

    info!(
        "Loaded {} rows from {} (skipped {}, filtered {})",
        stats.kept,
        path.display(),
        stats.skipped,
        stats.filtered
    );
    Ok((split, stats))
}

type ParsedRow = (Vec<String>, Option<Vec<String>>, TargetValue, i64);

/// Err carries a human-readable skip reason
fn parse_row(
    row: &[&str],
    spec: &TsvSpec,
    position: usize,
    tokenizer: &dyn SentenceTokenizer,
    max_seq_len: usize,
) -> std::result::Result<ParsedRow, String> {
    let tokenize = |text: &str| {
        process_sentence(tokenizer, text, max_seq_len, Sentinels::INPUT).map_err(|e| e.to_string())
    };

    let s1 = cell(row, spec.s1_idx)?;
    if s1.is_empty() {
        return Err("empty first sentence".into());
    }
    let s2 = match spec.s2_idx {
        Some(i) => Some(tokenize(cell(row, i)?)?),
        None => None,
    };

    let target = match spec.targ_idx {
        None => spec.dummy_target(),
        Some(t) => {
            let col = resolve_column(t, row.len())
                .ok_or_else(|| format!("missing target column {t}, row has {}", row.len()))?;
            let raw = row[col].trim();
            if raw.is_empty() {
                return Err("empty target".into());
            }
            parse_target(raw, spec)?
        }
    };

    let idx = match spec.idx_idx {
        Some(i) => {
            let raw = cell(row, i)?;
            raw.parse::<i64>().map_err(|_| format!("bad index '{raw}'"))?
        }
        None => position as i64,
    };

    Ok((tokenize(s1)?, s2, target, idx))
}

fn cell<'a>(row: &[&'a str], i: usize) -> std::result::Result<&'a str, String> {
    row.get(i)
        .map(|c| c.trim())
        .ok_or_else(|| format!("missing column {i}, row has {}", row.len()))
}

fn parse_target(raw: &str, spec: &TsvSpec) -> std::result::Result<TargetValue, String> {
    match spec.target {
        TargetKind::Label => match &spec.targ_map {
            Some(map) => map
                .get(raw)
                .map(|&v| TargetValue::Label(v))
                .ok_or_else(|| format!("unmapped label '{raw}'")),
            None => raw
                .parse::<i64>()
                .map(TargetValue::Label)
                .map_err(|_| format!("bad label '{raw}'")),
        },
        TargetKind::Score { scale } => raw
            .parse::<f64>()
            .map(|v| TargetValue::Score(v / scale))
            .map_err(|_| format!("bad score '{raw}'")),
        TargetKind::TagSequence => Ok(TargetValue::Tags(
            raw.split(' ').filter(|t| !t.is_empty()).map(String::from).collect(),
        )),
    }
}
