//! Requirement nodes, their fields and their references.

use super::Mid;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Well-known field names.
pub mod field {
    /// Requirement title
    pub const TITLE: &str = "TITLE";
    /// Requirement statement
    pub const STATEMENT: &str = "STATEMENT";
    /// Requirement rationale
    pub const RATIONALE: &str = "RATIONALE";
    /// Reviewer comment; may repeat
    pub const COMMENT: &str = "COMMENT";

    /// Fields compared when scoring two requirements for correspondence.
    pub const SIGNIFICANT: [&str; 3] = [TITLE, STATEMENT, RATIONALE];
}

/// One named field value, kept in grammar order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field name, e.g. `STATEMENT`
    pub name: String,

    /// Raw field text
    pub value: String,
}

impl Field {
    /// Create a field.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Whether this field is a reviewer comment.
    #[must_use]
    pub fn is_comment(&self) -> bool {
        self.name == field::COMMENT
    }
}

/// Kind of a [`Reference`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// The target UID is a parent of the declaring requirement
    Parent,
    /// The target UID is a child of the declaring requirement
    Child,
    /// The target is a source file path
    File,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parent => write!(f, "Parent"),
            Self::Child => write!(f, "Child"),
            Self::File => write!(f, "File"),
        }
    }
}

/// Typed reference declared on a requirement
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    /// Reference kind
    pub kind: ReferenceKind,

    /// Target UID, or a relative path for file references
    pub target: String,

    /// Optional relation role, e.g. `Refines`
    #[serde(default)]
    pub role: Option<String>,
}

impl Reference {
    /// Parent reference to `uid`.
    pub fn parent(uid: impl Into<String>) -> Self {
        Self {
            kind: ReferenceKind::Parent,
            target: uid.into(),
            role: None,
        }
    }

    /// Child reference to `uid`.
    pub fn child(uid: impl Into<String>) -> Self {
        Self {
            kind: ReferenceKind::Child,
            target: uid.into(),
            role: None,
        }
    }

    /// File reference to a project-relative path.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            kind: ReferenceKind::File,
            target: path.into(),
            role: None,
        }
    }

    /// Attach a role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }
}

/// A requirement node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    /// Machine identifier
    #[serde(default)]
    pub mid: Mid,

    /// Optional human identifier
    #[serde(default)]
    pub uid: Option<String>,

    /// Grammar element name, e.g. `REQUIREMENT`
    #[serde(default = "default_node_type")]
    pub node_type: String,

    /// Field values in grammar order
    #[serde(default)]
    pub fields: Vec<Field>,

    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// Parent, child and file references
    #[serde(default)]
    pub references: Vec<Reference>,
}

fn default_node_type() -> String {
    "REQUIREMENT".to_string()
}

impl Default for Requirement {
    fn default() -> Self {
        Self {
            mid: Mid::new(),
            uid: None,
            node_type: default_node_type(),
            fields: Vec::new(),
            tags: Vec::new(),
            references: Vec::new(),
        }
    }
}

impl Requirement {
    /// Create an empty requirement of type `REQUIREMENT`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the UID.
    #[must_use]
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Append a field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(Field::new(name, value));
        self
    }

    /// Append a `TITLE` field.
    #[must_use]
    pub fn with_title(self, title: impl Into<String>) -> Self {
        self.with_field(field::TITLE, title)
    }

    /// Append a `STATEMENT` field.
    #[must_use]
    pub fn with_statement(self, statement: impl Into<String>) -> Self {
        self.with_field(field::STATEMENT, statement)
    }

    /// Append a `RATIONALE` field.
    #[must_use]
    pub fn with_rationale(self, rationale: impl Into<String>) -> Self {
        self.with_field(field::RATIONALE, rationale)
    }

    /// Append a `COMMENT` field.
    #[must_use]
    pub fn with_comment(self, comment: impl Into<String>) -> Self {
        self.with_field(field::COMMENT, comment)
    }

    /// Add a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Add a reference.
    #[must_use]
    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.references.push(reference);
        self
    }

    /// Add a parent reference.
    #[must_use]
    pub fn with_parent(self, uid: impl Into<String>) -> Self {
        self.with_reference(Reference::parent(uid))
    }

    /// First value of the named field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }

    /// `TITLE` value, if any.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.field(field::TITLE)
    }

    /// `STATEMENT` value, if any.
    #[must_use]
    pub fn statement(&self) -> Option<&str> {
        self.field(field::STATEMENT)
    }

    /// `RATIONALE` value, if any.
    #[must_use]
    pub fn rationale(&self) -> Option<&str> {
        self.field(field::RATIONALE)
    }

    /// All `COMMENT` values in order.
    pub fn comments(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.is_comment())
            .map(|f| f.value.as_str())
    }

    /// References of one kind, in declaration order.
    pub fn references_of(&self, kind: ReferenceKind) -> impl Iterator<Item = &Reference> {
        self.references.iter().filter(move |r| r.kind == kind)
    }

    /// UIDs this requirement names as parents.
    pub fn parent_uids(&self) -> impl Iterator<Item = &str> {
        self.references_of(ReferenceKind::Parent)
            .map(|r| r.target.as_str())
    }
}
