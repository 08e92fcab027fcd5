//! Error types for tracedoc operations.
//!
//! Errors fall into two groups:
//!
//! - **`Error`**: failures that abort the operation. A failed index build
//!   returns no index at all.
//! - **`IndexWarning`** (see [`crate::index::IndexWarning`]): problems that
//!   are pruned and collected while the build carries on.
//!
//! [`GraphError`] is the local contract-violation type of the graph store.
//! A failing store operation leaves the store unchanged.

use crate::cycle::CycleError;
use crate::domain::Mid;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for tracedoc operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Where a node lives, for error messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLocation {
    /// Path of the owning document
    pub document: PathBuf,
    /// Title of the owning document
    pub document_title: String,
    /// Title of the node itself, if it has one
    pub title: Option<String>,
}

impl fmt::Display for NodeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.title {
            Some(title) => write!(
                f,
                "'{title}' in document '{}' ({})",
                self.document_title,
                self.document.display()
            ),
            None => write!(
                f,
                "untitled node in document '{}' ({})",
                self.document_title,
                self.document.display()
            ),
        }
    }
}

/// Top-level error type for tracedoc operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Two nodes claim the same UID
    #[error("{}", duplicate_uid_message(.uid, .first, .second))]
    DuplicateUid {
        /// The contested UID
        uid: String,
        /// The node registered first
        first: NodeLocation,
        /// The node that collided with it
        second: NodeLocation,
    },

    /// Two nodes share a machine identifier
    #[error("duplicate MID {0}: node identifiers must be unique within one load")]
    DuplicateMid(Mid),

    /// A parent or child relation cycle
    #[error(transparent)]
    Cycle(#[from] CycleError),

    /// Lookup of a UID that is not in the index
    #[error("unknown UID: {0}")]
    UnknownUid(String),

    /// Operation applied to a node of the wrong kind
    #[error("node {uid} is not a requirement")]
    NotARequirement {
        /// UID of the offending node
        uid: String,
    },

    /// Graph store contract violation
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// File system operation failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Reading or writing a JSONL cache failed
    #[error("JSONL error: {0}")]
    Jsonl(#[from] tracedoc_jsonl::Error),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

fn duplicate_uid_message(uid: &str, first: &NodeLocation, second: &NodeLocation) -> String {
    if first.document == second.document {
        format!("duplicate UID '{uid}': {second} conflicts with {first} in the same document")
    } else {
        format!("duplicate UID '{uid}': {second} conflicts with {first}")
    }
}

/// Errors raised by [`crate::graph::GraphStore`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A node with this key already exists
    #[error("duplicate node key: {0}")]
    DuplicateKey(String),

    /// No node with this key
    #[error("node not found: {0}")]
    NotFound(String),

    /// Links must join two distinct nodes
    #[error("self link rejected: {link_type} {key} -> {key}")]
    SelfLink {
        /// Link type name
        link_type: String,
        /// The node on both ends
        key: String,
    },

    /// The same typed edge was added twice
    #[error("duplicate link: {link_type} {from} -> {to}")]
    DuplicateLink {
        /// Link type name
        link_type: String,
        /// Source key
        from: String,
        /// Target key
        to: String,
    },

    /// Removing an edge that does not exist
    #[error("link not found: {link_type} {from} -> {to}")]
    LinkNotFound {
        /// Link type name
        link_type: String,
        /// Source key
        from: String,
        /// Target key
        to: String,
    },

    /// A single-valued lookup found zero or several values
    #[error("expected exactly one {link_type} link from {from}, found {found}")]
    UnexpectedArity {
        /// Link type name
        link_type: String,
        /// Source key
        from: String,
        /// Number of values present
        found: usize,
    },

    /// The removal validator refused
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}
