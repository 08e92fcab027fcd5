//! A small synchronous JSONL (JSON Lines) library.
//!
//! Provides line-tracking reading, buffered writing, resilient loading that
//! collects [`Warning`]s instead of failing on bad lines, and crash-safe
//! atomic file replacement.

#![forbid(unsafe_code)]

pub mod atomic;
pub mod error;
pub mod reader;
pub mod warning;
pub mod writer;

pub use atomic::{write_jsonl_atomic, write_jsonl_atomic_iter};
pub use error::{Error, Result};
pub use reader::{JsonlReader, read_jsonl_resilient};
pub use warning::Warning;
pub use writer::JsonlWriter;
