//! Content hashes and identity indices of one analyzed index.

use super::text::similarity_ratio;
use crate::domain::{Mid, ReferenceKind, Requirement, field};
use crate::index::{NodeKind, NodeRecord, Traceable, TraceabilityIndex};
use md5::{Digest, Md5};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

static NEXT_SNAPSHOT: AtomicU64 = AtomicU64::new(0);

/// Read-only view of one tree prepared for comparison with another.
#[derive(Debug)]
pub struct DiffSnapshot<'a> {
    id: u64,
    index: &'a TraceabilityIndex,
    hashes: HashMap<Mid, String>,
    document_hashes: HashSet<String>,
    section_hashes: HashSet<String>,
    requirement_hashes: HashSet<String>,
    free_text_hashes: HashSet<String>,
    by_uid: HashMap<&'a str, Mid>,
    by_title: HashMap<&'a str, Vec<Mid>>,
    by_statement: HashMap<&'a str, Vec<Mid>>,
    by_path: HashMap<&'a Path, Mid>,
    by_section_title: HashMap<&'a str, Vec<Mid>>,
    by_text: HashMap<String, Vec<Mid>>,
    /// Requirements with neither title nor statement
    unnamed: Vec<Mid>,
    /// Correspondence of this tree's nodes, per counterpart snapshot
    matches: RefCell<HashMap<(u64, Mid), Option<Mid>>>,
}

impl<'a> DiffSnapshot<'a> {
    /// Hash every node of `index` and build the identity indices.
    #[must_use]
    pub fn analyze(index: &'a TraceabilityIndex) -> Self {
        let mut snapshot = Self {
            id: NEXT_SNAPSHOT.fetch_add(1, Ordering::Relaxed),
            index,
            hashes: HashMap::new(),
            document_hashes: HashSet::new(),
            section_hashes: HashSet::new(),
            requirement_hashes: HashSet::new(),
            free_text_hashes: HashSet::new(),
            by_uid: HashMap::new(),
            by_title: HashMap::new(),
            by_statement: HashMap::new(),
            by_path: HashMap::new(),
            by_section_title: HashMap::new(),
            by_text: HashMap::new(),
            unnamed: Vec::new(),
            matches: RefCell::new(HashMap::new()),
        };

        for document in index.documents() {
            snapshot.analyze_document(document);
        }
        debug!(
            documents = snapshot.document_hashes.len(),
            requirements = snapshot.requirement_hashes.len(),
            sections = snapshot.section_hashes.len(),
            "Analyzed tree for comparison"
        );
        snapshot
    }

    fn analyze_document(&mut self, document: &'a NodeRecord) {
        if let Some(path) = document.path() {
            self.by_path.insert(path, document.mid);
        }
        if let Some(uid) = document.uid() {
            self.by_uid.insert(uid, document.mid);
        }

        let mut document_hasher = Md5::new();
        document_hasher.update(document.title().unwrap_or_default().as_bytes());

        for node in self.index.iter_document(document).into_iter().skip(1) {
            if let Some(uid) = node.uid() {
                self.by_uid.insert(uid, node.mid);
            }
            let hash = match &node.kind {
                NodeKind::Section { title, .. } => {
                    self.by_section_title
                        .entry(title)
                        .or_default()
                        .push(node.mid);
                    let hash = md5_hex(title.as_bytes());
                    self.section_hashes.insert(hash.clone());
                    hash
                }
                NodeKind::Requirement(requirement) => {
                    if let Some(title) = requirement.title() {
                        self.by_title.entry(title).or_default().push(node.mid);
                    }
                    if let Some(statement) = requirement.statement() {
                        self.by_statement
                            .entry(statement)
                            .or_default()
                            .push(node.mid);
                    }
                    if requirement.title().is_none() && requirement.statement().is_none() {
                        self.unnamed.push(node.mid);
                    }
                    let hash = requirement_hash(node);
                    self.requirement_hashes.insert(hash.clone());
                    hash
                }
                NodeKind::FreeText { text } => {
                    let hash = md5_hex(normalize(text).as_bytes());
                    self.by_text
                        .entry(hash.clone())
                        .or_default()
                        .push(node.mid);
                    self.free_text_hashes.insert(hash.clone());
                    hash
                }
                // Covered by the hash of the enclosing free text
                NodeKind::Anchor { .. }
                | NodeKind::InlineLink { .. }
                | NodeKind::Document { .. } => {
                    continue;
                }
            };
            document_hasher.update(hash.as_bytes());
            self.hashes.insert(node.mid, hash);
        }

        let hash = hex(&document_hasher.finalize());
        self.document_hashes.insert(hash.clone());
        self.hashes.insert(document.mid, hash);
    }

    /// The analyzed index.
    #[must_use]
    pub fn index(&self) -> &'a TraceabilityIndex {
        self.index
    }

    /// Content hash of a node of this tree.
    #[must_use]
    pub fn hash_of(&self, mid: Mid) -> Option<&str> {
        self.hashes.get(&mid).map(String::as_str)
    }

    /// Whether some document of this tree has `hash`.
    #[must_use]
    pub fn contains_document_hash(&self, hash: &str) -> bool {
        self.document_hashes.contains(hash)
    }

    /// Whether some section of this tree has `hash`.
    #[must_use]
    pub fn contains_section_hash(&self, hash: &str) -> bool {
        self.section_hashes.contains(hash)
    }

    /// Whether some requirement of this tree has `hash`.
    #[must_use]
    pub fn contains_requirement_hash(&self, hash: &str) -> bool {
        self.requirement_hashes.contains(hash)
    }

    /// Whether some free text of this tree has `hash`.
    #[must_use]
    pub fn contains_free_text_hash(&self, hash: &str) -> bool {
        self.free_text_hashes.contains(hash)
    }

    /// Node carrying `uid` in this tree.
    #[must_use]
    pub fn node_by_uid(&self, uid: &str) -> Option<&'a NodeRecord> {
        self.by_uid
            .get(uid)
            .and_then(|mid| self.index.get_node_by_mid_weak(*mid))
    }

    /// Requirements titled `title` in this tree.
    #[must_use]
    pub fn requirements_by_title(&self, title: &str) -> Vec<&'a NodeRecord> {
        self.lookup(&self.by_title, title)
    }

    /// Requirements whose statement is exactly `statement`.
    #[must_use]
    pub fn requirements_by_statement(&self, statement: &str) -> Vec<&'a NodeRecord> {
        self.lookup(&self.by_statement, statement)
    }

    /// Document loaded from `path` in this tree.
    #[must_use]
    pub fn document_by_path(&self, path: &Path) -> Option<&'a NodeRecord> {
        self.by_path
            .get(path)
            .and_then(|mid| self.index.get_node_by_mid_weak(*mid))
    }

    /// Sections titled `title` in this tree.
    #[must_use]
    pub fn sections_by_title(&self, title: &str) -> Vec<&'a NodeRecord> {
        self.lookup(&self.by_section_title, title)
    }

    fn lookup(&self, map: &HashMap<&'a str, Vec<Mid>>, key: &str) -> Vec<&'a NodeRecord> {
        map.get(key)
            .into_iter()
            .flatten()
            .filter_map(|mid| self.index.get_node_by_mid_weak(*mid))
            .collect()
    }

    /// The node of `other` that `node` (from this tree) corresponds to.
    ///
    /// 1. A node with the same UID and kind matches outright. A same-UID
    ///    node of another kind means there is no counterpart.
    /// 2. Documents match by source path. Sections match by title,
    ///    preferring one in the document at the same path. Free text matches
    ///    by content and inline links by position inside matched free text.
    /// 3. Requirements with the same title are candidates, or with the same
    ///    statement for an untitled requirement, or every other requirement
    ///    with neither for one that has neither. Candidates that are among
    ///    the node's declared parents are excluded.
    /// 4. The candidate with the best mean similarity over the shared
    ///    title, statement and rationale wins; the first one wins ties. A
    ///    candidate found by scoring alone must share at least one field.
    ///
    /// Results are memoized per node and counterpart snapshot.
    pub fn find_correspondence<'b>(
        &self,
        node: &NodeRecord,
        other: &DiffSnapshot<'b>,
    ) -> Option<&'b NodeRecord> {
        let key = (other.id, node.mid);
        if let Some(known) = self.matches.borrow().get(&key) {
            return known.and_then(|mid| other.index.get_node_by_mid_weak(mid));
        }

        let found = self.match_node(node, other);
        self.matches
            .borrow_mut()
            .insert(key, found.map(|n| n.mid));
        found
    }

    fn match_node<'b>(
        &self,
        node: &NodeRecord,
        other: &DiffSnapshot<'b>,
    ) -> Option<&'b NodeRecord> {
        if let Some(uid) = node.uid()
            && let Some(hit) = other.node_by_uid(uid)
        {
            return (hit.tag() == node.tag()).then_some(hit);
        }

        match &node.kind {
            NodeKind::Document { path, .. } => other.document_by_path(path),
            NodeKind::Section { title, .. } => {
                let candidates = other.sections_by_title(title);
                let path = self.document_path(node);
                candidates
                    .iter()
                    .find(|c| path.is_some() && other.document_path(c) == path)
                    .or_else(|| candidates.first())
                    .copied()
            }
            NodeKind::FreeText { text } => other
                .by_text
                .get(&md5_hex(normalize(text).as_bytes()))
                .and_then(|mids| mids.first())
                .and_then(|mid| other.index.get_node_by_mid_weak(*mid)),
            NodeKind::InlineLink { .. } => {
                let parent = self.index.get_node_by_mid_weak(node.parent?)?;
                let position = parent.children.iter().position(|mid| *mid == node.mid)?;
                let counterpart = self.find_correspondence(parent, other)?;
                let hit = other
                    .index
                    .get_node_by_mid_weak(*counterpart.children.get(position)?)?;
                (hit.kind == node.kind).then_some(hit)
            }
            NodeKind::Requirement(requirement) => match_requirement(requirement, node, other),
            NodeKind::Anchor { .. } => None,
        }
    }

    fn document_path(&self, node: &NodeRecord) -> Option<&'a Path> {
        self.index
            .get_node_by_mid_weak(node.document)
            .and_then(NodeRecord::path)
    }
}

fn match_requirement<'b>(
    requirement: &Requirement,
    node: &NodeRecord,
    other: &DiffSnapshot<'b>,
) -> Option<&'b NodeRecord> {
    let (candidates, scored_only) = match (requirement.title(), requirement.statement()) {
        (Some(title), _) => (other.requirements_by_title(title), false),
        (None, Some(statement)) => (other.requirements_by_statement(statement), false),
        (None, None) => {
            let unnamed = other
                .unnamed
                .iter()
                .filter_map(|mid| other.index.get_node_by_mid_weak(*mid))
                .collect();
            (unnamed, true)
        }
    };
    let parents: HashSet<&str> = requirement.parent_uids().collect();

    let mut best: Option<(&'b NodeRecord, f64)> = None;
    for candidate in candidates {
        if candidate.uid().is_some_and(|uid| parents.contains(uid)) {
            continue;
        }
        let score = field_similarity(node, candidate);
        if scored_only && score <= 0.0 {
            continue;
        }
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((candidate, score));
        }
    }
    best.map(|(candidate, _)| candidate)
}

/// Mean similarity over the significant fields both nodes have.
pub(crate) fn field_similarity(lhs: &impl Traceable, rhs: &impl Traceable) -> f64 {
    let ratios: Vec<f64> = field::SIGNIFICANT
        .iter()
        .filter_map(|name| Some(similarity_ratio(lhs.field_value(name)?, rhs.field_value(name)?)))
        .collect();
    if ratios.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let count = ratios.len() as f64;
    ratios.iter().sum::<f64>() / count
}

fn requirement_hash(node: &NodeRecord) -> String {
    let mut hasher = Md5::new();
    if let Some(requirement) = node.as_requirement() {
        hasher.update(requirement.node_type.as_bytes());
        hasher.update([0u8]);
        for field in requirement.fields.iter().filter(|f| !f.is_comment()) {
            hasher.update(field.name.as_bytes());
            hasher.update([0u8]);
            hasher.update(normalize(&field.value).as_bytes());
            hasher.update([0u8]);
        }
        for reference in &requirement.references {
            if reference.kind == ReferenceKind::File {
                continue;
            }
            hasher.update(reference.kind.to_string().as_bytes());
            hasher.update(reference.target.as_bytes());
            if let Some(role) = &reference.role {
                hasher.update(role.as_bytes());
            }
            hasher.update([0u8]);
        }
    }
    hex(&hasher.finalize())
}

fn normalize(text: &str) -> String {
    text.replace("\r\n", "\n")
}

fn md5_hex(bytes: &[u8]) -> String {
    hex(&Md5::digest(bytes))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(32), |mut out, byte| {
        let _ = write!(out, "{byte:02x}");
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Document, Forest, Requirement, Section};
    use rstest::rstest;

    fn build(requirements: Vec<Requirement>) -> TraceabilityIndex {
        let document = requirements
            .into_iter()
            .fold(Document::new("Spec", "spec.sdoc"), Document::with_node);
        TraceabilityIndex::build(Forest::new(vec![document])).unwrap()
    }

    #[test]
    fn comments_do_not_change_the_hash() {
        let plain = build(vec![Requirement::new().with_uid("REQ-1").with_statement("Stop")]);
        let commented = build(vec![
            Requirement::new()
                .with_uid("REQ-1")
                .with_statement("Stop")
                .with_comment("reviewed"),
        ]);
        let (a, b) = (DiffSnapshot::analyze(&plain), DiffSnapshot::analyze(&commented));

        let mid = plain.get_node_by_uid("REQ-1").unwrap().mid;
        let hash = a.hash_of(mid).unwrap();
        assert!(b.contains_requirement_hash(hash));
    }

    #[rstest]
    #[case::statement(Requirement::new().with_uid("REQ-1").with_statement("Halt"))]
    #[case::relation(Requirement::new().with_uid("REQ-1").with_statement("Stop").with_parent("REQ-0"))]
    #[case::node_type({
        let mut r = Requirement::new().with_uid("REQ-1").with_statement("Stop");
        r.node_type = "TEST_CASE".to_string();
        r
    })]
    fn significant_changes_change_the_hash(#[case] changed: Requirement) {
        let original = build(vec![Requirement::new().with_uid("REQ-1").with_statement("Stop")]);
        let changed = build(vec![changed]);
        let (a, b) = (DiffSnapshot::analyze(&original), DiffSnapshot::analyze(&changed));

        let mid = original.get_node_by_uid("REQ-1").unwrap().mid;
        assert!(!b.contains_requirement_hash(a.hash_of(mid).unwrap()));
    }

    #[test]
    fn crlf_and_lf_hash_alike() {
        let unix = build(vec![Requirement::new().with_statement("line one\nline two")]);
        let windows = build(vec![Requirement::new().with_statement("line one\r\nline two")]);
        let (a, b) = (DiffSnapshot::analyze(&unix), DiffSnapshot::analyze(&windows));

        let mid = unix.requirements().next().unwrap().mid;
        assert!(b.contains_requirement_hash(a.hash_of(mid).unwrap()));
    }

    #[test]
    fn document_hash_covers_content() {
        let before = TraceabilityIndex::build(Forest::new(vec![
            Document::new("Spec", "spec.sdoc").with_node(Section::new("Brakes")),
        ]))
        .unwrap();
        let after = TraceabilityIndex::build(Forest::new(vec![
            Document::new("Spec", "spec.sdoc").with_node(Section::new("Steering")),
        ]))
        .unwrap();
        let (a, b) = (DiffSnapshot::analyze(&before), DiffSnapshot::analyze(&after));

        let document = before.documents().next().unwrap();
        assert!(!b.contains_document_hash(a.hash_of(document.mid).unwrap()));
        assert!(a.document_by_path(Path::new("spec.sdoc")).is_some());
    }

    #[test]
    fn same_uid_of_another_kind_has_no_counterpart() {
        let lhs = build(vec![Requirement::new().with_uid("X-1").with_title("Brake")]);
        let rhs = TraceabilityIndex::build(Forest::new(vec![
            Document::new("Spec", "spec.sdoc")
                .with_node(Section::new("Brake").with_uid("X-1"))
                .with_node(Requirement::new().with_title("Brake")),
        ]))
        .unwrap();
        let (a, b) = (DiffSnapshot::analyze(&lhs), DiffSnapshot::analyze(&rhs));

        let node = lhs.get_node_by_uid("X-1").unwrap();
        assert!(a.find_correspondence(node, &b).is_none());
    }

    #[test]
    fn untitled_requirement_matches_by_statement() {
        let lhs = build(vec![Requirement::new().with_statement("The car shall stop.")]);
        let rhs = build(vec![
            Requirement::new().with_statement("Unrelated."),
            Requirement::new().with_statement("The car shall stop."),
        ]);
        let (a, b) = (DiffSnapshot::analyze(&lhs), DiffSnapshot::analyze(&rhs));

        let node = lhs.requirements().next().unwrap();
        let found = a.find_correspondence(node, &b).unwrap();
        assert_eq!(found.statement(), Some("The car shall stop."));
    }

    #[test]
    fn declared_parent_is_not_a_candidate() {
        let lhs = build(vec![
            Requirement::new()
                .with_uid("REQ-2")
                .with_title("Brake")
                .with_parent("REQ-1"),
        ]);
        let rhs = build(vec![Requirement::new().with_uid("REQ-1").with_title("Brake")]);
        let (a, b) = (DiffSnapshot::analyze(&lhs), DiffSnapshot::analyze(&rhs));

        let node = lhs.get_node_by_uid("REQ-2").unwrap();
        assert!(a.find_correspondence(node, &b).is_none());
    }

    #[test]
    fn best_scoring_candidate_wins() {
        let lhs = build(vec![
            Requirement::new()
                .with_title("Brake")
                .with_statement("The car shall stop within 40 m."),
        ]);
        let rhs = build(vec![
            Requirement::new()
                .with_uid("FAR")
                .with_title("Brake")
                .with_statement("Lights shall blink."),
            Requirement::new()
                .with_uid("NEAR")
                .with_title("Brake")
                .with_statement("The car shall stop within 45 m."),
        ]);
        let (a, b) = (DiffSnapshot::analyze(&lhs), DiffSnapshot::analyze(&rhs));

        let node = lhs.requirements().next().unwrap();
        assert_eq!(a.find_correspondence(node, &b).unwrap().uid(), Some("NEAR"));
    }
}
