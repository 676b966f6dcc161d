// ============================================================
// Layer 4 — Caption / Image Loaders
// ============================================================
// Grounded tasks pair a caption with the numeric id of the
// image it describes. Two on-disk layouts are supported.
//
// MSCOCO (under the task directory):
//   {split}_idx.txt   one image key per line
//   {split}.json      JSON lines; the LAST line holds
//                     {"<image key>": {"captions": {"<cap id>": "text"}}}
//   feat_map.json     {"mscoco/grounded/<image key>.json": <image id>}
//
// ShapeWorld:
//   shapeworld/{split}.tsv   caption \t label \t image id
//                            rows with label "0" are skipped
//
// Reference: serde_json docs, Rust Book §8 (HashMap)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};
use tracing::{info, warn};

use crate::data::lines::{open_lines, read_nonempty_lines};
use crate::domain::{split::Split, traits::SentenceTokenizer};
use crate::infra::tokenizer::{process_sentence, Sentinels};

/// One split of caption → image pairs, columns aligned
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CaptionSplit {
    pub captions: Vec<Vec<String>>,
    pub labels: Vec<i64>,
    pub image_ids: Vec<i64>,
}

impl CaptionSplit {
    pub fn len(&self) -> usize {
        self.captions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captions.is_empty()
    }

    fn push(&mut self, caption: Vec<String>, label: i64, image_id: i64) {
        self.captions.push(caption);
        self.labels.push(label);
        self.image_ids.push(image_id);
    }
}

#[derive(Debug, Deserialize)]
struct ImageEntry {
    captions: BTreeMap<String, String>,
}

fn split_file_stem(split: Split) -> &'static str {
    split.as_str()
}

/// Parse the last non-empty JSON line of a file
fn last_json_line<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let mut last = None;
    for line in open_lines(path)? {
        let line = line.with_context(|| format!("Read error in '{}'", path.display()))?;
        if !line.trim().is_empty() {
            last = Some(line);
        }
    }
    let line = last.with_context(|| format!("'{}' is empty", path.display()))?;
    serde_json::from_str(&line).with_context(|| format!("Malformed JSON in '{}'", path.display()))
}

pub fn load_mscoco_split(
    dir: &Path,
    split: Split,
    tokenizer: &dyn SentenceTokenizer,
    max_seq_len: usize,
) -> Result<CaptionSplit> {
    let stem = split_file_stem(split);
    let image_keys = read_nonempty_lines(&dir.join(format!("{stem}_idx.txt")))?;
    let images: BTreeMap<String, ImageEntry> = last_json_line(&dir.join(format!("{stem}.json")))?;

    let feat_path = dir.join("feat_map.json");
    let feat_map: BTreeMap<String, i64> = serde_json::from_str(
        &fs::read_to_string(&feat_path)
            .with_context(|| format!("Cannot read '{}'", feat_path.display()))?,
    )
    .with_context(|| format!("Malformed JSON in '{}'", feat_path.display()))?;

    let mut out = CaptionSplit::default();
    for key in &image_keys {
        let Some(entry) = images.get(key) else {
            warn!("{}: image '{}' has no captions, skipping", split, key);
            continue;
        };
        let feat_key = format!("mscoco/grounded/{key}.json");
        let image_id = *feat_map
            .get(&feat_key)
            .with_context(|| format!("'{}' missing from feat_map.json", feat_key))?;
        for text in entry.captions.values() {
            let caption = process_sentence(tokenizer, text, max_seq_len, Sentinels::INPUT)?;
            out.push(caption, 1, image_id);
        }
    }

    info!("Loaded {} {} captions from {}", out.len(), split, dir.display());
    Ok(out)
}

pub fn load_shapeworld_split(
    dir: &Path,
    split: Split,
    tokenizer: &dyn SentenceTokenizer,
    max_seq_len: usize,
) -> Result<CaptionSplit> {
    let path = dir.join("shapeworld").join(format!("{}.tsv", split_file_stem(split)));
    let mut out = CaptionSplit::default();
    let mut skipped = 0usize;

    for (line_no, line) in open_lines(&path)?.enumerate() {
        let line = line.with_context(|| format!("Read error in '{}'", path.display()))?;
        let items: Vec<&str> = line.trim().split('\t').collect();
        if items.len() < 3 || items[1] == "0" {
            skipped += 1;
            continue;
        }
        let (Ok(label), Ok(image_id)) = (items[1].parse::<i64>(), items[2].parse::<i64>()) else {
            warn!("{}:{}: skipping row (non-numeric label or id)", path.display(), line_no + 1);
            skipped += 1;
            continue;
        };
        let caption = process_sentence(tokenizer, items[0], max_seq_len, Sentinels::INPUT)?;
        out.push(caption, label, image_id);
    }

    info!("Loaded {} rows from {} (skipped {})", out.len(), path.display(), skipped);
    Ok(out)
}
