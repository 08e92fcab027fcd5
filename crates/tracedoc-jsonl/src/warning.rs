//! Lines skipped by resilient reads.

use std::fmt;

/// A line that [`read_resilient`](crate::JsonlReader::read_resilient) could
/// not decode and skipped.
///
/// ```
/// use tracedoc_jsonl::JsonlReader;
/// use std::io::Cursor;
///
/// let mut reader = JsonlReader::new(Cursor::new("1\n{oops\n3\n"));
/// let (values, skipped) = reader.read_resilient::<u32>()?;
/// assert_eq!(values, vec![1, 3]);
/// assert_eq!(skipped[0].line_number, 2);
/// # Ok::<(), tracedoc_jsonl::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    /// 1-based line number
    pub line_number: usize,
    /// Decoder message: bad JSON, or JSON of the wrong shape
    pub error: String,
}

impl Warning {
    /// Line number of the skipped line.
    #[must_use]
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line_number, self.error)
    }
}

impl std::error::Error for Warning {}
