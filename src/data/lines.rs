// ============================================================
// Layer 4 — Line Streams
// ============================================================
// Every corpus in this system is line-oriented. Some of the
// large ones contain stray invalid UTF-8, so lines are decoded
// lossily instead of failing the whole pass.
//
// `LossyLines` is a pull-based iterator: nothing is read until
// the consumer asks for the next line, and dropping it closes
// the file.
//
// Reference: Rust Book §13 (Iterators), §12 (I/O)

use anyhow::{Context, Result};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

/// Lines of a reader with the trailing `\n` / `\r\n` removed
pub struct LossyLines<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead> LossyLines<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, buf: Vec::new() }
    }
}

impl<R: BufRead> Iterator for LossyLines<R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                while matches!(self.buf.last(), Some(b'\n' | b'\r')) {
                    self.buf.pop();
                }
                Some(Ok(String::from_utf8_lossy(&self.buf).into_owned()))
            }
            Err(e) => Some(Err(e.into())),
        }
    }
}

/// Open a file as a lazy line stream
pub fn open_lines(path: &Path) -> Result<LossyLines<BufReader<File>>> {
    let file = File::open(path)
        .with_context(|| format!("Cannot open '{}'", path.display()))?;
    Ok(LossyLines::new(BufReader::new(file)))
}

/// Number of lines in a file, blank ones included
pub fn count_lines(path: &Path) -> Result<usize> {
    let mut n = 0;
    for line in open_lines(path)? {
        line.with_context(|| format!("Read error in '{}'", path.display()))?;
        n += 1;
    }
    Ok(n)
}

/// Trimmed, non-empty lines (label files, id lists)
pub fn read_nonempty_lines(path: &Path) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for line in open_lines(path)? {
        let line = line.with_context(|| format!("Read error in '{}'", path.display()))?;
        let line = line.trim();
        if !line.is_empty() {
            out.push(line.to_string());
        }
    }
    Ok(out)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    #[test]
    fn test_strips_line_endings_and_tolerates_bad_utf8() {
        let data: &[u8] = b"one\r\ntw\xffo\nthree";
        let lines: Vec<String> = LossyLines::new(Cursor::new(data))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "one");
        assert!(lines[1].starts_with("tw"));
        assert_eq!(lines[2], "three");
    }

    #[test]
    fn test_count_and_nonempty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.txt");
        let mut f = File::create(&path).unwrap();
        write!(f, "A\n\n B \nC\n").unwrap();

        assert_eq!(count_lines(&path).unwrap(), 4);
        assert_eq!(read_nonempty_lines(&path).unwrap(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = count_lines(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.txt"));
    }
}
