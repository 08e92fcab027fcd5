//! Domain types for parsed requirement documents.
//!
//! A parser hands the engine a [`Forest`]: an ordered list of [`Document`]s,
//! each owning a tree of [`Node`]s. Every node carries a [`Mid`], a
//! machine identifier used only as an internal key, and most nodes may also
//! carry a human-assigned UID that other nodes reference.

mod requirement;

pub use requirement::{Field, Reference, ReferenceKind, Requirement, field};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Machine identifier of a node.
///
/// Assigned at creation and never displayed to readers. Unlike a UID it is
/// always present, so it keys every internal map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mid(Uuid);

impl Mid {
    /// Generate a fresh random MID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for Mid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Mid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl From<Uuid> for Mid {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Everything one load hands to the index builder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Forest {
    /// Documents in load order
    pub documents: Vec<Document>,
}

impl Forest {
    /// Create a forest from documents.
    #[must_use]
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }
}

/// Root of one parsed source file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Machine identifier
    #[serde(default)]
    pub mid: Mid,

    /// Optional human identifier
    #[serde(default)]
    pub uid: Option<String>,

    /// Document title
    pub title: String,

    /// Source path, relative to the project root
    pub path: PathBuf,

    /// Top-level content in document order
    #[serde(default)]
    pub content: Vec<Node>,
}

impl Document {
    /// Create an empty document.
    pub fn new(title: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            mid: Mid::new(),
            uid: None,
            title: title.into(),
            path: path.into(),
            content: Vec::new(),
        }
    }

    /// Set the document UID.
    #[must_use]
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Append a top-level node.
    #[must_use]
    pub fn with_node(mut self, node: impl Into<Node>) -> Self {
        self.content.push(node.into());
        self
    }
}

/// A content node inside a document or section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    /// Titled grouping of further content
    Section(Section),
    /// A requirement with fields and relations
    Requirement(Requirement),
    /// Prose that may embed anchors and inline links
    FreeText(FreeText),
}

impl Node {
    /// MID of the wrapped node.
    #[must_use]
    pub fn mid(&self) -> Mid {
        match self {
            Self::Section(section) => section.mid,
            Self::Requirement(requirement) => requirement.mid,
            Self::FreeText(text) => text.mid,
        }
    }
}

impl From<Section> for Node {
    fn from(section: Section) -> Self {
        Self::Section(section)
    }
}

impl From<Requirement> for Node {
    fn from(requirement: Requirement) -> Self {
        Self::Requirement(requirement)
    }
}

impl From<FreeText> for Node {
    fn from(text: FreeText) -> Self {
        Self::FreeText(text)
    }
}

/// Titled section owning nested content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    /// Machine identifier
    #[serde(default)]
    pub mid: Mid,

    /// Optional human identifier
    #[serde(default)]
    pub uid: Option<String>,

    /// Section title
    pub title: String,

    /// Nested content in document order
    #[serde(default)]
    pub content: Vec<Node>,
}

impl Section {
    /// Create an empty section.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            mid: Mid::new(),
            uid: None,
            title: title.into(),
            content: Vec::new(),
        }
    }

    /// Set the section UID.
    #[must_use]
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Append a nested node.
    #[must_use]
    pub fn with_node(mut self, node: impl Into<Node>) -> Self {
        self.content.push(node.into());
        self
    }
}

/// Block of prose
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreeText {
    /// Machine identifier
    #[serde(default)]
    pub mid: Mid,

    /// Text runs, anchors and inline links in order
    #[serde(default)]
    pub parts: Vec<TextPart>,
}

impl FreeText {
    /// Create free text from a single run.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            mid: Mid::new(),
            parts: vec![TextPart::Text(text.into())],
        }
    }

    /// Append a part.
    #[must_use]
    pub fn with_part(mut self, part: TextPart) -> Self {
        self.parts.push(part);
        self
    }

    /// Plain text rendering used for hashing and comparison.
    ///
    /// Anchors and links are rendered as their UIDs in `[[...]]` markers so a
    /// retargeted link counts as a content change.
    #[must_use]
    pub fn plain_text(&self) -> String {
        let mut text = String::new();
        for part in &self.parts {
            match part {
                TextPart::Text(run) => text.push_str(run),
                TextPart::Anchor(anchor) => {
                    text.push_str("[[ANCHOR: ");
                    text.push_str(&anchor.uid);
                    text.push_str("]]");
                }
                TextPart::InlineLink(link) => {
                    text.push_str("[[LINK: ");
                    text.push_str(&link.target_uid);
                    text.push_str("]]");
                }
            }
        }
        text
    }
}

/// One piece of a [`FreeText`] block
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "part", content = "value", rename_all = "snake_case")]
pub enum TextPart {
    /// Literal text
    Text(String),
    /// Named link target
    Anchor(Anchor),
    /// Link to any node carrying a UID
    InlineLink(InlineLink),
}

/// Link target embedded in prose; its UID shares the global UID namespace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anchor {
    /// Machine identifier
    #[serde(default)]
    pub mid: Mid,

    /// Anchor UID
    pub uid: String,

    /// Display title
    #[serde(default)]
    pub title: Option<String>,
}

impl Anchor {
    /// Create an anchor.
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            mid: Mid::new(),
            uid: uid.into(),
            title: None,
        }
    }
}

/// Reference from prose to a UID
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlineLink {
    /// Machine identifier
    #[serde(default)]
    pub mid: Mid,

    /// UID of the linked node or anchor
    pub target_uid: String,
}

impl InlineLink {
    /// Create an inline link.
    pub fn new(target_uid: impl Into<String>) -> Self {
        Self {
            mid: Mid::new(),
            target_uid: target_uid.into(),
        }
    }
}
