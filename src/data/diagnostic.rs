// ============================================================
// Layer 4 — Diagnostic TSV Loader
// ============================================================
// The NLI diagnostic set carries, besides premise / hypothesis /
// label, four orthogonal tag dimensions per row:
//
//   col 0  Lexical Semantics               → lex_sem
//   col 1  Predicate-Argument Structure    → pr_ar_str
//   col 2  Logic                           → logic
//   col 3  Knowledge                       → knowledge
//   col 5  premise, col 6  hypothesis, col 7  label
//
// Each tag cell holds zero or more `;`-separated tag names.
// For every dimension the loader builds a sorted tag table
// and stores each row's tags as indices into it. Index 0 of
// every table is reserved for "missing", so real tags start
// at 1 and a row with no tags stores an empty list.
//
// Reference: Rust Book §8 (Collections), §6 (Enums)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    path::Path,
};
use tracing::{info, warn};

use crate::data::columnar::{ColumnarSplit, TargetValue, Targets};
use crate::data::lines::open_lines;
use crate::domain::traits::SentenceTokenizer;
use crate::infra::tokenizer::{process_sentence, Sentinels};

// ─── Dimension ────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    LexSem,
    PrArStr,
    Logic,
    Knowledge,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::LexSem,
        Dimension::PrArStr,
        Dimension::Logic,
        Dimension::Knowledge,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::LexSem    => "lex_sem",
            Dimension::PrArStr   => "pr_ar_str",
            Dimension::Logic     => "logic",
            Dimension::Knowledge => "knowledge",
        }
    }

    /// Column holding this dimension's tags
    pub fn column(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── TagTable ─────────────────────────────────────────────────────────────────
pub const MISSING_TAG: &str = "missing";

/// Index → tag name for one dimension; index 0 is `missing`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TagTable {
    tags: Vec<String>,
}

impl TagTable {
    fn from_names(names: BTreeSet<String>) -> Self {
        let mut tags = vec![MISSING_TAG.to_string()];
        tags.extend(names);
        Self { tags }
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.tags.get(index).map(String::as_str)
    }

    pub fn index_of(&self, tag: &str) -> Option<usize> {
        self.tags.iter().skip(1).position(|t| t == tag).map(|p| p + 1)
    }

    /// Real tags (index ≥ 1) with their indices
    pub fn tags(&self) -> impl Iterator<Item = (usize, &str)> {
        self.tags.iter().enumerate().skip(1).map(|(i, t)| (i, t.as_str()))
    }

    /// Number of real tags
    pub fn len(&self) -> usize {
        self.tags.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ─── DiagnosticData ───────────────────────────────────────────────────────────
/// Tag indices of one row, per dimension
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RowTags(pub [Vec<usize>; 4]);

impl RowTags {
    pub fn get(&self, dim: Dimension) -> &[usize] {
        &self.0[dim.column()]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticData {
    /// premise, hypothesis, label, idx
    pub pairs: ColumnarSplit,
    pub tables: BTreeMap<Dimension, TagTable>,
    /// Aligned with `pairs`
    pub row_tags: Vec<RowTags>,
}

impl DiagnosticData {
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn table(&self, dim: Dimension) -> Option<&TagTable> {
        self.tables.get(&dim)
    }
}

const PREMISE_COL: usize = 5;
const HYPOTHESIS_COL: usize = 6;
const LABEL_COL: usize = 7;

struct RawRow {
    premise: String,
    hypothesis: String,
    label: i64,
    tags: [Vec<String>; 4],
}

fn split_tags(cell: Option<&&str>) -> Vec<String> {
    cell.map(|c| {
        c.split(';')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}

pub fn load_diagnostic_tsv(
    path: &Path,
    targ_map: &BTreeMap<String, i64>,
    skip_rows: usize,
    tokenizer: &dyn SentenceTokenizer,
    max_seq_len: usize,
) -> Result<DiagnosticData> {
    // Pass 1: raw rows and the tag vocabulary of each dimension
    let mut raw_rows = Vec::new();
    let mut names: [BTreeSet<String>; 4] = Default::default();
    let mut skipped = 0usize;

    for (line_no, line) in open_lines(path)?.enumerate() {
        let line = line.with_context(|| format!("Read error in '{}'", path.display()))?;
        if line_no < skip_rows {
            continue;
        }
        let row: Vec<&str> = line.split('\t').collect();

        let (Some(premise), Some(hypothesis), Some(label)) =
            (row.get(PREMISE_COL), row.get(HYPOTHESIS_COL), row.get(LABEL_COL))
        else {
            warn!("{}:{}: skipping row (only {} columns)", path.display(), line_no + 1, row.len());
            skipped += 1;
            continue;
        };
        let Some(&label) = targ_map.get(label.trim()) else {
            warn!("{}:{}: skipping row (unmapped label '{}')", path.display(), line_no + 1, label.trim());
            skipped += 1;
            continue;
        };
        if premise.trim().is_empty() {
            warn!("{}:{}: skipping row (empty premise)", path.display(), line_no + 1);
            skipped += 1;
            continue;
        }

        let tags: [Vec<String>; 4] =
            std::array::from_fn(|d| split_tags(row.get(d)));
        for (set, row_tags) in names.iter_mut().zip(&tags) {
            set.extend(row_tags.iter().cloned());
        }
        raw_rows.push(RawRow {
            premise: premise.to_string(),
            hypothesis: hypothesis.to_string(),
            label,
            tags,
        });
    }

    let tables: BTreeMap<Dimension, TagTable> = Dimension::ALL
        .iter()
        .zip(names)
        .map(|(dim, set)| (*dim, TagTable::from_names(set)))
        .collect();

    // Pass 2: tokenize and map tag names to indices
    let mut pairs = ColumnarSplit::empty(true, Targets::Labels(Vec::new()));
    let mut row_tags = Vec::with_capacity(raw_rows.len());
    for (i, raw) in raw_rows.into_iter().enumerate() {
        let s1 = process_sentence(tokenizer, &raw.premise, max_seq_len, Sentinels::INPUT)?;
        let s2 = process_sentence(tokenizer, &raw.hypothesis, max_seq_len, Sentinels::INPUT)?;
        pairs.push_row(s1, Some(s2), TargetValue::Label(raw.label), i as i64)?;

        let indices: [Vec<usize>; 4] = std::array::from_fn(|d| {
            let table = &tables[&Dimension::ALL[d]];
            raw.tags[d].iter().filter_map(|t| table.index_of(t)).collect()
        });
        row_tags.push(RowTags(indices));
    }

    info!(
        "Loaded {} diagnostic rows from {} (skipped {})",
        pairs.len(),
        path.display(),
        skipped
    );
    Ok(DiagnosticData { pairs, tables, row_tags })
}
