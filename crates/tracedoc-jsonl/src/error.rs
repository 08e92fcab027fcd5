//! Error types for tracedoc-jsonl operations.

use std::io;
use thiserror::Error;

/// The error type for tracedoc-jsonl operations.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error occurred while reading or writing.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid JSONL format, reported with the offending line.
    #[error("Invalid JSONL format at line {line_number}: {reason}")]
    InvalidFormat {
        /// The 1-based line number of the offending line.
        line_number: usize,
        /// What was wrong with the line.
        reason: String,
    },
}

/// A specialized Result type for tracedoc-jsonl operations.
pub type Result<T> = std::result::Result<T, Error>;
