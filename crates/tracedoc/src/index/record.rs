//! Arena records stored in the index's graph store.

use crate::domain::{Mid, Reference, Requirement, field};
use std::fmt;
use std::path::{Path, PathBuf};

/// Common read surface of anything that can take part in traceability.
pub trait Traceable {
    /// Machine identifier.
    fn mid(&self) -> Mid;

    /// Human identifier, if assigned.
    fn uid(&self) -> Option<&str>;

    /// Display title, if the node has one.
    fn title(&self) -> Option<&str>;

    /// First value of a named field.
    fn field_value(&self, name: &str) -> Option<&str>;

    /// Declared references; empty for nodes that cannot declare any.
    fn references(&self) -> &[Reference];

    /// `STATEMENT` value, if any.
    fn statement(&self) -> Option<&str> {
        self.field_value(field::STATEMENT)
    }

    /// `RATIONALE` value, if any.
    fn rationale(&self) -> Option<&str> {
        self.field_value(field::RATIONALE)
    }
}

impl Traceable for Requirement {
    fn mid(&self) -> Mid {
        self.mid
    }

    fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    fn title(&self) -> Option<&str> {
        Requirement::title(self)
    }

    fn field_value(&self, name: &str) -> Option<&str> {
        self.field(name)
    }

    fn references(&self) -> &[Reference] {
        &self.references
    }
}

/// Payload of a [`NodeRecord`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Document root
    Document {
        /// Optional human identifier
        uid: Option<String>,
        /// Document title
        title: String,
        /// Source path relative to the project root
        path: PathBuf,
    },
    /// Section heading
    Section {
        /// Optional human identifier
        uid: Option<String>,
        /// Section title
        title: String,
    },
    /// Requirement, kept whole
    Requirement(Requirement),
    /// Prose block, flattened to plain text
    FreeText {
        /// Text with anchor and link markers
        text: String,
    },
    /// Anchor inside prose
    Anchor {
        /// Anchor UID
        uid: String,
        /// Display title
        title: Option<String>,
    },
    /// Inline link inside prose
    InlineLink {
        /// UID the link points to
        target_uid: String,
    },
}

/// Discriminant of [`NodeKind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeTag {
    /// [`NodeKind::Document`]
    Document,
    /// [`NodeKind::Section`]
    Section,
    /// [`NodeKind::Requirement`]
    Requirement,
    /// [`NodeKind::FreeText`]
    FreeText,
    /// [`NodeKind::Anchor`]
    Anchor,
    /// [`NodeKind::InlineLink`]
    InlineLink,
}

impl fmt::Display for NodeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Document => "document",
            Self::Section => "section",
            Self::Requirement => "requirement",
            Self::FreeText => "free text",
            Self::Anchor => "anchor",
            Self::InlineLink => "inline link",
        };
        f.write_str(name)
    }
}

/// One node of the flattened forest.
///
/// Ownership is expressed with MIDs: `parent` and `children` mirror the
/// document tree and `document` points at the owning document root (a
/// document points at itself).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    /// Machine identifier
    pub mid: Mid,
    /// Enclosing node; `None` for documents
    pub parent: Option<Mid>,
    /// Owning document
    pub document: Mid,
    /// Nested nodes in document order
    pub children: Vec<Mid>,
    /// Node payload
    pub kind: NodeKind,
}

impl NodeRecord {
    /// Discriminant of the payload.
    #[must_use]
    pub fn tag(&self) -> NodeTag {
        match &self.kind {
            NodeKind::Document { .. } => NodeTag::Document,
            NodeKind::Section { .. } => NodeTag::Section,
            NodeKind::Requirement(_) => NodeTag::Requirement,
            NodeKind::FreeText { .. } => NodeTag::FreeText,
            NodeKind::Anchor { .. } => NodeTag::Anchor,
            NodeKind::InlineLink { .. } => NodeTag::InlineLink,
        }
    }

    /// The wrapped requirement, if this is one.
    #[must_use]
    pub fn as_requirement(&self) -> Option<&Requirement> {
        match &self.kind {
            NodeKind::Requirement(requirement) => Some(requirement),
            _ => None,
        }
    }

    /// Whether this is a requirement.
    #[must_use]
    pub fn is_requirement(&self) -> bool {
        matches!(self.kind, NodeKind::Requirement(_))
    }

    /// Source path, for document records.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match &self.kind {
            NodeKind::Document { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Plain text, for free-text records.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::FreeText { text } => Some(text),
            _ => None,
        }
    }

    /// UID if present, otherwise the MID; for log and warning messages.
    #[must_use]
    pub fn label(&self) -> String {
        self.uid()
            .map_or_else(|| self.mid.to_string(), ToString::to_string)
    }
}

impl Traceable for NodeRecord {
    fn mid(&self) -> Mid {
        self.mid
    }

    fn uid(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Document { uid, .. } | NodeKind::Section { uid, .. } => uid.as_deref(),
            NodeKind::Requirement(requirement) => requirement.uid.as_deref(),
            NodeKind::Anchor { uid, .. } => Some(uid),
            NodeKind::FreeText { .. } | NodeKind::InlineLink { .. } => None,
        }
    }

    fn title(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Document { title, .. } | NodeKind::Section { title, .. } => Some(title),
            NodeKind::Requirement(requirement) => requirement.title(),
            NodeKind::Anchor { title, .. } => title.as_deref(),
            NodeKind::FreeText { .. } | NodeKind::InlineLink { .. } => None,
        }
    }

    fn field_value(&self, name: &str) -> Option<&str> {
        self.as_requirement().and_then(|r| r.field(name))
    }

    fn references(&self) -> &[Reference] {
        self.as_requirement().map_or(&[], |r| r.references.as_slice())
    }
}
