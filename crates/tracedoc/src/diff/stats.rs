//! Change records between two analyzed trees.

use super::snapshot::DiffSnapshot;
use super::text::{DiffOpcode, diff_opcodes, similarity_ratio};
use crate::domain::{Mid, Requirement, field};
use crate::index::{NodeRecord, NodeTag, Traceable};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

/// Which tree of the comparison a node belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// The older tree
    Left,
    /// The newer tree
    Right,
}

impl Side {
    /// The other tree.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// How a node changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// Only in the right tree
    Added,
    /// Only in the left tree
    Removed,
    /// In both trees with different content
    Modified,
}

impl ChangeKind {
    fn unmatched(side: Side) -> Self {
        match side {
            Side::Left => Self::Removed,
            Side::Right => Self::Added,
        }
    }
}

/// One changed field of a matched requirement pair, or one unpaired comment.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    /// Field name
    pub name: String,
    /// Left value, if the left requirement has the field
    pub lhs: Option<String>,
    /// Right value, if the right requirement has the field
    pub rhs: Option<String>,
    /// Character diff; empty unless both values are present
    pub opcodes: Vec<DiffOpcode>,
}

impl FieldChange {
    fn new(name: &str, lhs: Option<&str>, rhs: Option<&str>) -> Self {
        let opcodes = match (lhs, rhs) {
            (Some(l), Some(r)) => diff_opcodes(l, r),
            _ => Vec::new(),
        };
        Self {
            name: name.to_string(),
            lhs: lhs.map(ToString::to_string),
            rhs: rhs.map(ToString::to_string),
            opcodes,
        }
    }
}

/// A requirement added, removed or modified.
#[derive(Debug, Clone, PartialEq)]
pub struct RequirementChange {
    /// Change kind
    pub kind: ChangeKind,
    /// Pairing token, for modified requirements
    pub token: Option<String>,
    /// Left requirement
    pub lhs: Option<Mid>,
    /// Right requirement
    pub rhs: Option<Mid>,
    /// Changed fields, comments last
    pub field_changes: Vec<FieldChange>,
}

/// A section added, removed or modified.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionChange {
    /// Change kind
    pub kind: ChangeKind,
    /// Pairing token, for modified sections
    pub token: Option<String>,
    /// Left section
    pub lhs: Option<Mid>,
    /// Right section
    pub rhs: Option<Mid>,
    /// The UID differs or the section has no counterpart
    pub uid_modified: bool,
    /// The title differs or the section has no counterpart
    pub title_modified: bool,
    /// Character diff of the titles, for matched sections
    pub title_opcodes: Vec<DiffOpcode>,
}

/// A document whose UID or title changed, or that has no counterpart.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChange {
    /// Left document
    pub lhs: Option<Mid>,
    /// Right document
    pub rhs: Option<Mid>,
    /// The UID differs or the document has no counterpart
    pub uid_modified: bool,
    /// The title differs or the document has no counterpart
    pub title_modified: bool,
    /// Character diff of the titles, for matched documents
    pub title_opcodes: Vec<DiffOpcode>,
}

/// Any recorded change
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Document-level change
    Document(DocumentChange),
    /// Section-level change
    Section(SectionChange),
    /// Requirement-level change
    Requirement(RequirementChange),
}

/// Per-kind change counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct ChangeCounters {
    pub documents_modified: usize,
    pub sections_added: usize,
    pub sections_removed: usize,
    pub sections_modified: usize,
    pub requirements_added: usize,
    pub requirements_removed: usize,
    pub requirements_modified: usize,
}

impl ChangeCounters {
    /// All requirement changes.
    #[must_use]
    pub fn requirements(&self) -> usize {
        self.requirements_added + self.requirements_removed + self.requirements_modified
    }

    /// All section changes.
    #[must_use]
    pub fn sections(&self) -> usize {
        self.sections_added + self.sections_removed + self.sections_modified
    }

    /// Requirement summary such as `2 removed, 1 modified, 2 added`.
    #[must_use]
    pub fn requirements_summary(&self) -> String {
        summary(
            self.requirements_removed,
            self.requirements_modified,
            self.requirements_added,
        )
    }

    /// Section summary such as `1 removed, 3 added`.
    #[must_use]
    pub fn sections_summary(&self) -> String {
        summary(
            self.sections_removed,
            self.sections_modified,
            self.sections_added,
        )
    }
}

fn summary(removed: usize, modified: usize, added: usize) -> String {
    [(removed, "removed"), (modified, "modified"), (added, "added")]
        .into_iter()
        .filter(|(count, _)| *count > 0)
        .map(|(count, label)| format!("{count} {label}"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for ChangeCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} document(s) modified, {} section change(s), {} requirement change(s)",
            self.documents_modified,
            self.sections(),
            self.requirements()
        )
    }
}

/// Everything that changed between two trees.
#[derive(Debug, Clone, Default)]
pub struct ChangeStats {
    changes: Vec<Change>,
    by_node: HashMap<(Side, Mid), usize>,
    tokens: HashMap<(Side, Mid), String>,
    counters: ChangeCounters,
}

impl ChangeStats {
    /// All changes, left tree first, in document order.
    #[must_use]
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// The change recorded for a node, if any.
    #[must_use]
    pub fn find_change(&self, side: Side, mid: Mid) -> Option<&Change> {
        self.by_node
            .get(&(side, mid))
            .and_then(|i| self.changes.get(*i))
    }

    /// Pairing token shared by a requirement and its counterpart.
    #[must_use]
    pub fn token(&self, side: Side, mid: Mid) -> Option<&str> {
        self.tokens.get(&(side, mid)).map(String::as_str)
    }

    /// Per-kind counts.
    #[must_use]
    pub fn counters(&self) -> &ChangeCounters {
        &self.counters
    }

    /// Number of recorded changes.
    #[must_use]
    pub fn total_changes(&self) -> usize {
        self.changes.len()
    }

    fn record(&mut self, change: Change, nodes: [Option<(Side, Mid)>; 2]) {
        match &change {
            Change::Document(_) => self.counters.documents_modified += 1,
            Change::Section(section) => match section.kind {
                ChangeKind::Added => self.counters.sections_added += 1,
                ChangeKind::Removed => self.counters.sections_removed += 1,
                ChangeKind::Modified => self.counters.sections_modified += 1,
            },
            Change::Requirement(requirement) => match requirement.kind {
                ChangeKind::Added => self.counters.requirements_added += 1,
                ChangeKind::Removed => self.counters.requirements_removed += 1,
                ChangeKind::Modified => self.counters.requirements_modified += 1,
            },
        }
        let position = self.changes.len();
        self.changes.push(change);
        for node in nodes.into_iter().flatten() {
            self.by_node.insert(node, position);
        }
    }

    fn has_change(&self, side: Side, mid: Mid) -> bool {
        self.by_node.contains_key(&(side, mid))
    }
}

/// Compare two analyzed trees.
///
/// Every requirement that has a counterpart receives a token shared with
/// it, whether or not its content changed. Change records are produced
/// only for content that differs: a requirement whose hash also exists in
/// the other tree is unchanged.
#[must_use]
pub fn compute_change_stats(lhs: &DiffSnapshot<'_>, rhs: &DiffSnapshot<'_>) -> ChangeStats {
    let mut stats = ChangeStats::default();
    walk(lhs, rhs, Side::Left, &mut stats);
    walk(rhs, lhs, Side::Right, &mut stats);
    debug!(
        changes = stats.total_changes(),
        tokens = stats.tokens.len(),
        "Computed change stats"
    );
    stats
}

/// Orders a node of `side` and its counterpart as `(left, right)`.
fn pair<T>(side: Side, this: T, other: T) -> (T, T) {
    match side {
        Side::Left => (this, other),
        Side::Right => (other, this),
    }
}

fn walk(this: &DiffSnapshot<'_>, other: &DiffSnapshot<'_>, side: Side, stats: &mut ChangeStats) {
    let other_side = side.opposite();

    for document in this.index().documents() {
        if !stats.has_change(side, document.mid) {
            compare_document(document, other, side, stats);
        }

        for node in this.index().iter_document(document).into_iter().skip(1) {
            match node.tag() {
                NodeTag::Section => compare_section(node, this, other, side, stats),
                NodeTag::Requirement => {
                    let counterpart = this.find_correspondence(node, other);

                    if let Some(counterpart) = counterpart
                        && stats.token(side, node.mid).is_none()
                        && stats.token(other_side, counterpart.mid).is_none()
                    {
                        let token = Uuid::new_v4().simple().to_string();
                        stats.tokens.insert((side, node.mid), token.clone());
                        stats.tokens.insert((other_side, counterpart.mid), token);
                    }

                    compare_requirement(node, counterpart, this, other, side, stats);
                }
                _ => {}
            }
        }
    }
}

fn compare_document(
    document: &NodeRecord,
    other: &DiffSnapshot<'_>,
    side: Side,
    stats: &mut ChangeStats,
) {
    let counterpart = document
        .path()
        .and_then(|path| other.document_by_path(path));

    let (uid_modified, title_modified, title_opcodes) = match counterpart {
        Some(counterpart) => {
            let (l, r) = pair(side, document, counterpart);
            let title_modified = l.title() != r.title();
            let opcodes = if title_modified {
                diff_opcodes(l.title().unwrap_or_default(), r.title().unwrap_or_default())
            } else {
                Vec::new()
            };
            (l.uid() != r.uid(), title_modified, opcodes)
        }
        None => (true, true, Vec::new()),
    };
    if !uid_modified && !title_modified {
        return;
    }

    let (lhs, rhs) = pair(side, Some(document.mid), counterpart.map(|c| c.mid));
    stats.record(
        Change::Document(DocumentChange {
            lhs,
            rhs,
            uid_modified,
            title_modified,
            title_opcodes,
        }),
        [
            Some((side, document.mid)),
            counterpart.map(|c| (side.opposite(), c.mid)),
        ],
    );
}

fn compare_section(
    section: &NodeRecord,
    this: &DiffSnapshot<'_>,
    other: &DiffSnapshot<'_>,
    side: Side,
    stats: &mut ChangeStats,
) {
    if stats.has_change(side, section.mid) {
        return;
    }
    if this
        .hash_of(section.mid)
        .is_some_and(|hash| other.contains_section_hash(hash))
    {
        return;
    }

    let counterpart = section
        .uid()
        .and_then(|uid| other.node_by_uid(uid))
        .filter(|c| c.tag() == NodeTag::Section);

    let change = match counterpart {
        Some(counterpart) => {
            let (l, r) = pair(side, section, counterpart);
            let title_modified = l.title() != r.title();
            let title_opcodes = if title_modified {
                diff_opcodes(l.title().unwrap_or_default(), r.title().unwrap_or_default())
            } else {
                Vec::new()
            };
            SectionChange {
                kind: ChangeKind::Modified,
                token: Some(Uuid::new_v4().simple().to_string()),
                lhs: Some(l.mid),
                rhs: Some(r.mid),
                uid_modified: false,
                title_modified,
                title_opcodes,
            }
        }
        None => {
            let (lhs, rhs) = pair(side, Some(section.mid), None);
            SectionChange {
                kind: ChangeKind::unmatched(side),
                token: None,
                lhs,
                rhs,
                uid_modified: true,
                title_modified: true,
                title_opcodes: Vec::new(),
            }
        }
    };
    stats.record(
        Change::Section(change),
        [
            Some((side, section.mid)),
            counterpart.map(|c| (side.opposite(), c.mid)),
        ],
    );
}

fn compare_requirement(
    node: &NodeRecord,
    counterpart: Option<&NodeRecord>,
    this: &DiffSnapshot<'_>,
    other: &DiffSnapshot<'_>,
    side: Side,
    stats: &mut ChangeStats,
) {
    if stats.has_change(side, node.mid) {
        return;
    }
    if this
        .hash_of(node.mid)
        .is_some_and(|hash| other.contains_requirement_hash(hash))
    {
        return;
    }

    let paired = counterpart.and_then(|c| Some((c.mid, c.as_requirement()?)));
    let change = match (paired, node.as_requirement()) {
        (Some((other_mid, other_requirement)), Some(requirement)) => {
            let (l, r) = pair(side, requirement, other_requirement);
            let (lhs, rhs) = pair(side, node.mid, other_mid);
            RequirementChange {
                kind: ChangeKind::Modified,
                token: stats.token(side, node.mid).map(ToString::to_string),
                lhs: Some(lhs),
                rhs: Some(rhs),
                field_changes: field_changes(l, r),
            }
        }
        _ => {
            let (lhs, rhs) = pair(side, Some(node.mid), None);
            RequirementChange {
                kind: ChangeKind::unmatched(side),
                token: None,
                lhs,
                rhs,
                field_changes: Vec::new(),
            }
        }
    };
    stats.record(
        Change::Requirement(change),
        [
            Some((side, node.mid)),
            counterpart.map(|c| (side.opposite(), c.mid)),
        ],
    );
}

/// Changed non-comment fields in declaration order, then paired comments.
fn field_changes(lhs: &Requirement, rhs: &Requirement) -> Vec<FieldChange> {
    let mut seen = HashSet::new();
    let names: Vec<&str> = lhs
        .fields
        .iter()
        .chain(&rhs.fields)
        .filter(|f| !f.is_comment())
        .map(|f| f.name.as_str())
        .filter(|name| seen.insert(*name))
        .collect();

    let mut changes: Vec<FieldChange> = names
        .into_iter()
        .filter_map(|name| {
            let (l, r) = (lhs.field(name), rhs.field(name));
            (l != r).then(|| FieldChange::new(name, l, r))
        })
        .collect();

    changes.extend(comment_changes(
        &lhs.comments().collect::<Vec<_>>(),
        &rhs.comments().collect::<Vec<_>>(),
    ));
    changes
}

/// Pair comments by best similarity; identical pairs are not changes.
fn comment_changes(lhs: &[&str], rhs: &[&str]) -> Vec<FieldChange> {
    let mut left_used = vec![false; lhs.len()];
    let mut right_used = vec![false; rhs.len()];
    let mut changes = Vec::new();

    let mut candidates: Vec<(f64, usize, usize)> = Vec::with_capacity(lhs.len() * rhs.len());
    for (i, l) in lhs.iter().enumerate() {
        for (j, r) in rhs.iter().enumerate() {
            candidates.push((similarity_ratio(l, r), i, j));
        }
    }
    // Stable, so earlier pairs win ties
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

    for (_, i, j) in candidates {
        if left_used[i] || right_used[j] {
            continue;
        }
        left_used[i] = true;
        right_used[j] = true;
        if lhs[i] != rhs[j] {
            changes.push(FieldChange::new(field::COMMENT, Some(lhs[i]), Some(rhs[j])));
        }
    }

    for (i, comment) in lhs.iter().enumerate() {
        if !left_used[i] {
            changes.push(FieldChange::new(field::COMMENT, Some(*comment), None));
        }
    }
    for (j, comment) in rhs.iter().enumerate() {
        if !right_used[j] {
            changes.push(FieldChange::new(field::COMMENT, None, Some(*comment)));
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_comments_are_not_changes() {
        let changes = comment_changes(
            &["looks good", "check units"],
            &["check units", "looks good"],
        );
        assert!(changes.is_empty());
    }

    #[test]
    fn edited_comment_pairs_with_its_closest_match() {
        let changes = comment_changes(
            &["check the units", "looks good"],
            &["looks good", "check the unit"],
        );
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].lhs.as_deref(), Some("check the units"));
        assert_eq!(changes[0].rhs.as_deref(), Some("check the unit"));
        assert!(!changes[0].opcodes.is_empty());
    }

    #[test]
    fn unpaired_comments_are_one_sided() {
        let changes = comment_changes(&["old"], &[]);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].rhs, None);
        assert!(changes[0].opcodes.is_empty());
    }

    #[test]
    fn changed_and_missing_fields_are_reported() {
        let lhs = Requirement::new()
            .with_title("Brake")
            .with_statement("Stop within 40 m")
            .with_rationale("Safety");
        let rhs = Requirement::new()
            .with_title("Brake")
            .with_statement("Stop within 45 m");

        let changes = field_changes(&lhs, &rhs);

        let names: Vec<&str> = changes.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec![field::STATEMENT, field::RATIONALE]);
        assert_eq!(changes[1].rhs, None);
    }

    #[test]
    fn summary_skips_zero_counts() {
        let counters = ChangeCounters {
            requirements_removed: 2,
            requirements_added: 1,
            ..ChangeCounters::default()
        };
        assert_eq!(counters.requirements_summary(), "2 removed, 1 added");
        assert_eq!(counters.requirements(), 3);
    }
}
