//! JSONL writing operations.

use crate::Result;
use serde::Serialize;
use std::io::{BufWriter, Write};

/// Buffered writer for JSONL (JSON Lines) data.
///
/// Each value is serialized to a single line followed by `\n`.
///
/// # Examples
///
/// ```
/// use tracedoc_jsonl::JsonlWriter;
///
/// let mut writer = JsonlWriter::new(Vec::new());
/// writer.write(&serde_json::json!({"id": 1})).unwrap();
/// let bytes = writer.into_inner().unwrap();
/// assert_eq!(bytes, b"{\"id\":1}\n");
/// ```
pub struct JsonlWriter<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> JsonlWriter<W> {
    /// Creates a new `JsonlWriter` wrapping the given writer.
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }

    /// Serializes one value as a line.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the underlying write fails.
    pub fn write<T: Serialize>(&mut self, value: &T) -> Result<()> {
        serde_json::to_writer(&mut self.writer, value)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Serializes every value from an iterator, one per line.
    ///
    /// # Errors
    ///
    /// Stops at the first failing value and returns its error.
    pub fn write_all<T, I>(&mut self, values: I) -> Result<()>
    where
        T: Serialize,
        I: IntoIterator<Item = T>,
    {
        for value in values {
            self.write(&value)?;
        }
        Ok(())
    }

    /// Flushes buffered output to the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying writer fails to flush.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flushes and returns the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| crate::Error::Io(e.into_error()))
    }
}
