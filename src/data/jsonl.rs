// ============================================================
// Layer 4 — JSON-Lines Record Stream
// ============================================================
// Span/edge probing data is one JSON object per line. The
// stream yields only usable records:
//
//   - blank lines are ignored
//   - malformed JSON is skipped (logged with its line number)
//   - records with no targets are skipped
//
// When the stream is exhausted it logs one summary line:
//
//   Read=93, Skip=7, Total=100 from train.edges.json.retokenized.X
//
// I/O errors are not skipped; they are yielded as Err and end
// the pass.
//
// Reference: Rust Book §13 (Iterators), serde_json docs

use anyhow::{Context, Result};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};
use tracing::{info, warn};

use crate::data::lines::LossyLines;
use crate::domain::record::EdgeRecord;

/// Counters for one pass over a record file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub total: usize,
    pub skipped: usize,
}

impl LoadStats {
    pub fn read(&self) -> usize {
        self.total - self.skipped
    }
}

pub struct RecordStream<R> {
    lines: LossyLines<R>,
    source: PathBuf,
    line_no: usize,
    stats: LoadStats,
    finished: bool,
}

impl<R: BufRead> RecordStream<R> {
    pub fn new(reader: R, source: impl Into<PathBuf>) -> Self {
        Self {
            lines: LossyLines::new(reader),
            source: source.into(),
            line_no: 0,
            stats: LoadStats::default(),
            finished: false,
        }
    }

    pub fn stats(&self) -> LoadStats {
        self.stats
    }

    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            info!(
                "Read={}, Skip={}, Total={} from {}",
                self.stats.read(),
                self.stats.skipped,
                self.stats.total,
                self.source.display()
            );
        }
    }
}

impl<R: BufRead> Iterator for RecordStream<R> {
    type Item = Result<EdgeRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next() {
                None => {
                    self.finish();
                    return None;
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e.context(format!("Read error in '{}'", self.source.display()))));
                }
                Some(Ok(line)) => line,
            };
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }

            self.stats.total += 1;
            match serde_json::from_str::<EdgeRecord>(&line) {
                Ok(record) if record.has_targets() => return Some(Ok(record)),
                Ok(_) => self.stats.skipped += 1,
                Err(e) => {
                    warn!("{}:{}: skipping malformed record ({})", self.source.display(), self.line_no, e);
                    self.stats.skipped += 1;
                }
            }
        }
    }
}

pub fn open_records(path: &Path) -> Result<RecordStream<BufReader<File>>> {
    let file = File::open(path)
        .with_context(|| format!("Cannot open record file '{}'", path.display()))?;
    Ok(RecordStream::new(BufReader::new(file), path))
}

/// Read a whole record file, empty-target records already dropped
pub fn load_edge_records(path: &Path) -> Result<(Vec<EdgeRecord>, LoadStats)> {
    let mut stream = open_records(path)?;
    let records = stream.by_ref().collect::<Result<Vec<_>>>()?;
    Ok((records, stream.stats()))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_drops_empty_and_malformed_records() {
        let body = r#"{"text": "a b", "targets": [{"span1": [0, 1], "label": "x"}]}
{"text": "c", "targets": []}
not json

{"text": "d e", "targets": null}
{"text": "f g", "targets": [{"span1": [1, 2], "span2": [0, 1], "label": ["y", "z"]}]}
"#;
        let mut stream = RecordStream::new(Cursor::new(body), "mem");
        let records: Vec<EdgeRecord> = stream.by_ref().collect::<Result<_>>().unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].text, "f g");
        assert_eq!(stream.stats(), LoadStats { total: 5, skipped: 3 });
        assert_eq!(stream.stats().read(), 2);
    }

    #[test]
    fn test_count_matches_records_after_filtering() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.json");
        let mut body = String::new();
        for i in 0..100 {
            if i % 15 == 0 {
                body.push_str("{\"text\": \"x\", \"targets\": []}\n");
            } else {
                body.push_str("{\"text\": \"x y\", \"targets\": [{\"span1\": [0, 1], \"label\": \"l\"}]}\n");
            }
        }
        std::fs::write(&path, body).unwrap();

        let (records, stats) = load_edge_records(&path).unwrap();
        // 0, 15, 30, 45, 60, 75, 90 are empty
        assert_eq!(stats.skipped, 7);
        assert_eq!(records.len(), 93);
    }
}
