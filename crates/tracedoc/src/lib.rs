//! # Tracedoc: Requirements Traceability Core
//!
//! Tracedoc turns a parsed forest of requirement documents into a queryable
//! traceability index, decides which generated artifacts are stale, and
//! compares two revisions of a document tree.
//!
//! ## Components
//!
//! - [`graph`]: typed bidirectional node/link store keyed by MID
//! - [`cycle`]: iterative cycle detection over lazily described graphs
//! - [`index`]: the two-pass index builder, queries and edit operations
//! - [`ledger`]: input → output freshness tracking persisted as JSONL
//! - [`diff`]: content hashing, cross-tree correspondence and field diffs
//! - [`config`]: project configuration in `.tracedoc/config.yaml`
//!
//! ## Quick Start
//!
//! ```
//! use tracedoc::domain::{Document, Forest, Requirement};
//! use tracedoc::index::TraceabilityIndex;
//!
//! let forest = Forest::new(vec![
//!     Document::new("System", "system.sdoc")
//!         .with_node(Requirement::new().with_uid("SYS-1").with_title("Braking"))
//!         .with_node(Requirement::new().with_uid("SYS-2").with_parent("SYS-1")),
//! ]);
//! let index = TraceabilityIndex::build(forest)?;
//!
//! let child = index.get_node_by_uid("SYS-2")?;
//! assert_eq!(index.get_parent_requirements(child).len(), 1);
//! # Ok::<(), tracedoc::Error>(())
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod cycle;
pub mod diff;
pub mod domain;
pub mod error;
pub mod graph;
pub mod index;
pub mod ledger;

pub use config::ProjectConfig;
pub use cycle::{CycleDetector, CycleError};
pub use domain::{Forest, Mid};
pub use error::{Error, GraphError, NodeLocation, Result};
pub use graph::GraphStore;
pub use index::{IndexWarning, TraceabilityIndex};
pub use ledger::DependencyLedger;
