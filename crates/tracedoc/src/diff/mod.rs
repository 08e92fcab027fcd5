//! Change analysis between two revisions of a document tree.
//!
//! Each revision is built into its own [`TraceabilityIndex`] and analyzed
//! into a [`DiffSnapshot`]: an MD5 content hash per node plus identity
//! indices used to find the counterpart of a node in the other revision.
//! [`compute_change_stats`] then walks both trees, pairs corresponding
//! requirements with a shared token and records what was added, removed or
//! modified, down to character-level opcodes per changed field.
//!
//! ```
//! use tracedoc::diff::{DiffSnapshot, compute_change_stats};
//! use tracedoc::domain::{Document, Forest, Requirement};
//! use tracedoc::index::TraceabilityIndex;
//!
//! let old = TraceabilityIndex::build(Forest::new(vec![
//!     Document::new("Spec", "spec.sdoc")
//!         .with_node(Requirement::new().with_uid("REQ-1").with_statement("Stop.")),
//! ]))?;
//! let new = TraceabilityIndex::build(Forest::new(vec![
//!     Document::new("Spec", "spec.sdoc")
//!         .with_node(Requirement::new().with_uid("REQ-1").with_statement("Halt.")),
//! ]))?;
//!
//! let stats = compute_change_stats(&DiffSnapshot::analyze(&old), &DiffSnapshot::analyze(&new));
//! assert_eq!(stats.counters().requirements_modified, 1);
//! # Ok::<(), tracedoc::Error>(())
//! ```
//!
//! [`TraceabilityIndex`]: crate::index::TraceabilityIndex

mod snapshot;
mod stats;
mod text;

pub use snapshot::DiffSnapshot;
pub use stats::{
    Change, ChangeCounters, ChangeKind, ChangeStats, DocumentChange, FieldChange,
    RequirementChange, SectionChange, Side, compute_change_stats,
};
pub use text::{DiffOpcode, OpTag, diff_opcodes, similarity_ratio};
