//! JSONL reading operations.
//!
//! Line-by-line buffered reading with line number tracking, plus the
//! resilient whole-file loader used for cache files.

use crate::{Error, Result, Warning};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::debug;

/// Reader for JSONL (JSON Lines) data.
///
/// Wraps any [`Read`] in a [`BufReader`] and tracks line numbers so parse
/// failures can be reported precisely. Blank lines are skipped.
///
/// # Examples
///
/// ```
/// use tracedoc_jsonl::JsonlReader;
/// use std::io::Cursor;
///
/// let mut reader = JsonlReader::new(Cursor::new("1\n\n2\n"));
/// assert_eq!(reader.read_value::<u32>().unwrap(), Some(1));
/// assert_eq!(reader.read_value::<u32>().unwrap(), Some(2));
/// assert_eq!(reader.read_value::<u32>().unwrap(), None);
/// assert_eq!(reader.line_number(), 3);
/// ```
pub struct JsonlReader<R> {
    reader: BufReader<R>,
    /// 1-based number of the last line read, 0 before any read.
    line_number: usize,
    buffer: String,
}

impl<R: Read> JsonlReader<R> {
    /// Creates a new `JsonlReader` wrapping the given reader.
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            line_number: 0,
            buffer: String::new(),
        }
    }

    /// Returns the 1-based number of the last line read.
    #[must_use]
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Reads the next non-blank line, trimmed, or `None` at end of input.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the underlying reader fails or the line is
    /// not valid UTF-8.
    pub fn read_line(&mut self) -> Result<Option<&str>> {
        loop {
            self.buffer.clear();
            let read = self.reader.read_line(&mut self.buffer)?;
            if read == 0 {
                return Ok(None);
            }
            self.line_number += 1;
            if !self.buffer.trim().is_empty() {
                return Ok(Some(self.buffer.trim()));
            }
        }
    }

    /// Reads and deserializes the next value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] naming the line if it does not parse
    /// as `T`, or [`Error::Io`] on read failure.
    pub fn read_value<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        let Some(line) = self.read_line()? else {
            return Ok(None);
        };
        match serde_json::from_str(line) {
            Ok(value) => Ok(Some(value)),
            Err(e) => Err(Error::InvalidFormat {
                line_number: self.line_number,
                reason: e.to_string(),
            }),
        }
    }

    /// Reads every remaining line, skipping the ones that fail to parse.
    ///
    /// # Errors
    ///
    /// Only I/O failures are errors; parse failures become warnings.
    pub fn read_resilient<T: DeserializeOwned>(&mut self) -> Result<(Vec<T>, Vec<Warning>)> {
        let mut values = Vec::new();
        let mut warnings = Vec::new();

        while let Some(line) = self.read_line()? {
            match serde_json::from_str(line) {
                Ok(value) => values.push(value),
                Err(e) => warnings.push(Warning {
                    line_number: self.line_number,
                    error: e.to_string(),
                }),
            }
        }

        Ok((values, warnings))
    }

    /// Consumes the reader, returning the underlying buffered reader.
    #[must_use]
    pub fn into_inner(self) -> BufReader<R> {
        self.reader
    }
}

/// Loads a whole JSONL file, collecting a [`Warning`] for each bad line.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be opened or read.
///
/// # Examples
///
/// ```no_run
/// use tracedoc_jsonl::read_jsonl_resilient;
///
/// let (records, warnings) = read_jsonl_resilient::<serde_json::Value, _>("cache.jsonl")?;
/// for warning in &warnings {
///     eprintln!("{warning}");
/// }
/// # Ok::<(), tracedoc_jsonl::Error>(())
/// ```
pub fn read_jsonl_resilient<T, P>(path: P) -> Result<(Vec<T>, Vec<Warning>)>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)?;
    let (values, warnings) = JsonlReader::new(file).read_resilient()?;
    debug!(
        path = %path.display(),
        records = values.len(),
        warnings = warnings.len(),
        "Loaded JSONL file"
    );
    Ok((values, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn new_reader_starts_at_line_zero() {
        let reader = JsonlReader::new(Cursor::new(b""));
        assert_eq!(reader.line_number(), 0);
    }

    #[test]
    fn read_line_skips_blank_lines_but_counts_them() {
        let mut reader = JsonlReader::new(Cursor::new("\n  \n{\"a\":1}\n"));
        assert_eq!(reader.read_line().unwrap(), Some("{\"a\":1}"));
        assert_eq!(reader.line_number(), 3);
        assert_eq!(reader.read_line().unwrap(), None);
    }

    #[test]
    fn read_value_reports_offending_line() {
        let mut reader = JsonlReader::new(Cursor::new("1\nnope\n"));
        assert_eq!(reader.read_value::<u32>().unwrap(), Some(1));
        let err = reader.read_value::<u32>().unwrap_err();
        assert!(matches!(err, Error::InvalidFormat { line_number: 2, .. }));
    }

    #[test]
    fn read_resilient_keeps_going_after_bad_lines() {
        let mut reader = JsonlReader::new(Cursor::new("1\n{bad}\n3\n\"str\"\n"));
        let (values, warnings) = reader.read_resilient::<u32>().unwrap();
        assert_eq!(values, vec![1, 3]);
        let lines: Vec<usize> = warnings.iter().map(Warning::line_number).collect();
        assert_eq!(lines, vec![2, 4]);
    }

    #[test]
    fn read_line_handles_crlf() {
        let mut reader = JsonlReader::new(Cursor::new("7\r\n8\r\n"));
        assert_eq!(reader.read_value::<u32>().unwrap(), Some(7));
        assert_eq!(reader.read_value::<u32>().unwrap(), Some(8));
    }
}
