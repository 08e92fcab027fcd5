//! Recoverable problems found while building the index.

use std::fmt;
use std::path::PathBuf;

/// A problem the builder worked around.
///
/// **Effect** of every variant: the offending relation or link is pruned
/// and the build continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexWarning {
    /// A parent reference names a UID that does not exist
    UnresolvedParent {
        /// Declaring requirement (UID, or MID if it has none)
        requirement: String,
        /// The missing UID
        target: String,
        /// Document declaring the reference
        document: PathBuf,
    },

    /// A child reference names a UID that does not exist
    UnresolvedChild {
        /// Declaring requirement
        requirement: String,
        /// The missing UID
        target: String,
        /// Document declaring the reference
        document: PathBuf,
    },

    /// A parent or child reference names a node that is not a requirement
    NonRequirementTarget {
        /// Declaring requirement
        requirement: String,
        /// UID of the section, anchor or document named
        target: String,
        /// Document declaring the reference
        document: PathBuf,
    },

    /// An inline link points at a UID that does not exist
    UnresolvedInlineLink {
        /// The missing UID
        target: String,
        /// Document containing the link
        document: PathBuf,
    },
}

impl IndexWarning {
    /// Stable identifier of the warning kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnresolvedParent { .. } => "unresolved_parent",
            Self::UnresolvedChild { .. } => "unresolved_child",
            Self::NonRequirementTarget { .. } => "non_requirement_target",
            Self::UnresolvedInlineLink { .. } => "unresolved_inline_link",
        }
    }

    /// The UID that could not be used.
    #[must_use]
    pub fn target(&self) -> &str {
        match self {
            Self::UnresolvedParent { target, .. }
            | Self::UnresolvedChild { target, .. }
            | Self::NonRequirementTarget { target, .. }
            | Self::UnresolvedInlineLink { target, .. } => target,
        }
    }
}

impl fmt::Display for IndexWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedParent {
                requirement,
                target,
                document,
            } => write!(
                f,
                "{}: requirement {requirement} references parent requirement which doesn't exist: {target}",
                document.display()
            ),
            Self::UnresolvedChild {
                requirement,
                target,
                document,
            } => write!(
                f,
                "{}: requirement {requirement} references child requirement which doesn't exist: {target}",
                document.display()
            ),
            Self::NonRequirementTarget {
                requirement,
                target,
                document,
            } => write!(
                f,
                "{}: requirement {requirement} relates to {target}, which is not a requirement",
                document.display()
            ),
            Self::UnresolvedInlineLink { target, document } => write!(
                f,
                "{}: inline link references an object with a UID that does not exist: {target}",
                document.display()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_parent_message_names_both_uids() {
        let warning = IndexWarning::UnresolvedParent {
            requirement: "REQ-2".to_string(),
            target: "REQ-404".to_string(),
            document: PathBuf::from("docs/brakes.sdoc"),
        };
        let message = warning.to_string();
        assert!(message.starts_with("docs/brakes.sdoc"));
        assert!(message.contains("REQ-2"));
        assert!(message.contains("REQ-404"));
        assert_eq!(warning.kind(), "unresolved_parent");
        assert_eq!(warning.target(), "REQ-404");
    }
}
