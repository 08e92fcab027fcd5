//! The traceability index.
//!
//! Built once per load from a [`Forest`](crate::domain::Forest) by
//! [`TraceabilityIndex::build`], then queried read-only by renderers. The
//! interactive edit operations in this module mutate it through the same
//! graph-store primitives the builder uses.
//!
//! All nodes live in a [`GraphStore`] keyed by [`Mid`]. Relations are typed
//! links between MIDs:
//!
//! | Link | Direction |
//! |------|-----------|
//! | [`LinkType::ParentRelation`] | child requirement → parent requirement |
//! | [`LinkType::ChildRelation`] | parent requirement → child requirement |
//! | [`LinkType::IncomingLink`] | link target → inline link node |
//!
//! Document-level dependencies are kept in a `petgraph` graph whose edges
//! point from the document declaring a cross-document parent to the
//! document owning that parent.

mod builder;
mod edit;
mod file_traceability;
mod record;
mod warning;

pub use file_traceability::FileTraceability;
pub use record::{NodeKind, NodeRecord, NodeTag, Traceable};
pub use warning::IndexWarning;

use crate::domain::{Forest, Mid};
use crate::error::{Error, Result};
use crate::graph::GraphStore;
use petgraph::Direction;
use petgraph::graphmap::DiGraphMap;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// Link types stored in the index's graph store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkType {
    /// Child requirement → parent requirement
    ParentRelation,
    /// Parent requirement → child requirement
    ChildRelation,
    /// Link target → inline link node
    IncomingLink,
}

/// Longest relation chains starting at a node or inside a document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReferenceDepth {
    /// Longest chain of parents
    pub parents: usize,
    /// Longest chain of children
    pub children: usize,
}

impl ReferenceDepth {
    /// The larger of the two depths.
    #[must_use]
    pub fn max(&self) -> usize {
        self.parents.max(self.children)
    }
}

pub(crate) type NodeStore = GraphStore<Mid, NodeRecord, LinkType>;

/// Queryable graph of documents, requirements and their relations.
#[derive(Debug)]
pub struct TraceabilityIndex {
    store: NodeStore,
    documents: Vec<Mid>,
    uid_map: HashMap<String, Mid>,
    /// Role per `(child, parent)` relation
    roles: HashMap<(Mid, Mid), Option<String>>,
    /// Tag histogram per document
    tags: HashMap<Mid, BTreeMap<String, usize>>,
    file_traceability: FileTraceability,
    /// Edge weight counts the requirement relations behind it
    document_graph: DiGraphMap<Mid, usize>,
    depths: HashMap<Mid, ReferenceDepth>,
    document_depths: HashMap<Mid, ReferenceDepth>,
    warnings: Vec<IndexWarning>,
}

impl TraceabilityIndex {
    /// Build an index from a parsed forest.
    ///
    /// # Errors
    ///
    /// Fails without producing an index on a duplicate UID or MID, or on any
    /// parent/child relation cycle. Unresolved references are pruned and
    /// reported through [`warnings`](Self::warnings) instead.
    pub fn build(forest: Forest) -> Result<Self> {
        builder::IndexBuilder::new().build(forest)
    }

    fn empty() -> Self {
        Self {
            store: NodeStore::new(),
            documents: Vec::new(),
            uid_map: HashMap::new(),
            roles: HashMap::new(),
            tags: HashMap::new(),
            file_traceability: FileTraceability::new(),
            document_graph: DiGraphMap::new(),
            depths: HashMap::new(),
            document_depths: HashMap::new(),
            warnings: Vec::new(),
        }
    }

    // ========== Lookup ==========

    /// Node by MID.
    ///
    /// # Errors
    ///
    /// [`Error::Graph`] if no node has this MID.
    pub fn get_node_by_mid(&self, mid: Mid) -> Result<&NodeRecord> {
        Ok(self.store.get_node(&mid)?)
    }

    /// Node by MID, or `None`.
    #[must_use]
    pub fn get_node_by_mid_weak(&self, mid: Mid) -> Option<&NodeRecord> {
        self.store.get_node_weak(&mid)
    }

    /// Node by UID.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownUid`] if no node has this UID.
    pub fn get_node_by_uid(&self, uid: &str) -> Result<&NodeRecord> {
        self.get_node_by_uid_weak(uid)
            .ok_or_else(|| Error::UnknownUid(uid.to_string()))
    }

    /// Node by UID, or `None`.
    #[must_use]
    pub fn get_node_by_uid_weak(&self, uid: &str) -> Option<&NodeRecord> {
        self.uid_map
            .get(uid)
            .and_then(|mid| self.store.get_node_weak(mid))
    }

    /// Whether some node carries `uid`.
    #[must_use]
    pub fn has_uid(&self, uid: &str) -> bool {
        self.uid_map.contains_key(uid)
    }

    /// Document roots in load order.
    pub fn documents(&self) -> impl Iterator<Item = &NodeRecord> {
        self.documents
            .iter()
            .filter_map(|mid| self.store.get_node_weak(mid))
    }

    /// Document loaded from `path`.
    #[must_use]
    pub fn document_by_path(&self, path: &Path) -> Option<&NodeRecord> {
        self.documents().find(|doc| doc.path() == Some(path))
    }

    /// The document owning `node`.
    ///
    /// # Errors
    ///
    /// [`Error::Graph`] if the owning document is missing.
    pub fn document_of(&self, node: &NodeRecord) -> Result<&NodeRecord> {
        self.get_node_by_mid(node.document)
    }

    /// Every node of `document` in depth-first document order, root first.
    #[must_use]
    pub fn iter_document(&self, document: &NodeRecord) -> Vec<&NodeRecord> {
        let mut ordered = Vec::new();
        let mut stack = vec![document.mid];
        while let Some(mid) = stack.pop() {
            if let Some(node) = self.store.get_node_weak(&mid) {
                ordered.push(node);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        ordered
    }

    /// Every requirement in load order.
    pub fn requirements(&self) -> impl Iterator<Item = &NodeRecord> {
        self.documents()
            .flat_map(|doc| self.iter_document(doc))
            .filter(|node| node.is_requirement())
    }

    /// Total number of stored nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.store.node_count()
    }

    // ========== Relations ==========

    /// Resolved parents of `node`, in declaration order.
    #[must_use]
    pub fn get_parent_requirements(&self, node: &NodeRecord) -> Vec<&NodeRecord> {
        self.linked(LinkType::ParentRelation, node.mid)
    }

    /// Resolved children of `node`, in resolution order.
    #[must_use]
    pub fn get_children_requirements(&self, node: &NodeRecord) -> Vec<&NodeRecord> {
        self.linked(LinkType::ChildRelation, node.mid)
    }

    /// Whether `node` has any resolved parent.
    #[must_use]
    pub fn has_parent_requirements(&self, node: &NodeRecord) -> bool {
        !self
            .store
            .get_link_values(LinkType::ParentRelation, &node.mid)
            .is_empty()
    }

    /// Whether `node` has any resolved child.
    #[must_use]
    pub fn has_children_requirements(&self, node: &NodeRecord) -> bool {
        !self
            .store
            .get_link_values(LinkType::ChildRelation, &node.mid)
            .is_empty()
    }

    /// Parents of `node` paired with the role of each relation.
    #[must_use]
    pub fn get_parent_relations_with_roles(
        &self,
        node: &NodeRecord,
    ) -> Vec<(&NodeRecord, Option<&str>)> {
        self.get_parent_requirements(node)
            .into_iter()
            .map(|parent| (parent, self.role(node.mid, parent.mid)))
            .collect()
    }

    /// Children of `node` paired with the role of each relation.
    #[must_use]
    pub fn get_child_relations_with_roles(
        &self,
        node: &NodeRecord,
    ) -> Vec<(&NodeRecord, Option<&str>)> {
        self.get_children_requirements(node)
            .into_iter()
            .map(|child| (child, self.role(child.mid, node.mid)))
            .collect()
    }

    /// Parents of `node` whose relation has exactly `role`.
    #[must_use]
    pub fn get_parent_relations_with_role(
        &self,
        node: &NodeRecord,
        role: Option<&str>,
    ) -> Vec<&NodeRecord> {
        self.get_parent_relations_with_roles(node)
            .into_iter()
            .filter(|(_, r)| *r == role)
            .map(|(parent, _)| parent)
            .collect()
    }

    /// Children of `node` whose relation has exactly `role`.
    #[must_use]
    pub fn get_child_relations_with_role(
        &self,
        node: &NodeRecord,
        role: Option<&str>,
    ) -> Vec<&NodeRecord> {
        self.get_child_relations_with_roles(node)
            .into_iter()
            .filter(|(_, r)| *r == role)
            .map(|(child, _)| child)
            .collect()
    }

    /// Inline link nodes pointing at `node`.
    #[must_use]
    pub fn get_incoming_links(&self, node: &NodeRecord) -> Vec<&NodeRecord> {
        self.linked(LinkType::IncomingLink, node.mid)
    }

    fn linked(&self, link_type: LinkType, mid: Mid) -> Vec<&NodeRecord> {
        self.store
            .get_link_values(link_type, &mid)
            .iter()
            .filter_map(|m| self.store.get_node_weak(m))
            .collect()
    }

    fn role(&self, child: Mid, parent: Mid) -> Option<&str> {
        self.roles.get(&(child, parent)).and_then(Option::as_deref)
    }

    // ========== File traceability ==========

    /// Source files named by `requirement`.
    #[must_use]
    pub fn get_requirement_file_links(&self, requirement: &NodeRecord) -> &[String] {
        self.file_traceability.files_for(requirement.mid)
    }

    /// Requirements naming the source file `path`.
    #[must_use]
    pub fn get_source_file_requirements(&self, path: &str) -> Vec<&NodeRecord> {
        self.file_traceability
            .requirements_for(path)
            .iter()
            .filter_map(|mid| self.store.get_node_weak(mid))
            .collect()
    }

    /// The file traceability sub-index.
    #[must_use]
    pub fn file_traceability(&self) -> &FileTraceability {
        &self.file_traceability
    }

    // ========== Tags ==========

    /// Tag counts of `document`, in natural order (`tag2` before `tag10`).
    #[must_use]
    pub fn get_counted_tags(&self, document: &NodeRecord) -> Vec<(&str, usize)> {
        let mut counted: Vec<(&str, usize)> = self
            .tags
            .get(&document.mid)
            .map(|histogram| histogram.iter().map(|(t, c)| (t.as_str(), *c)).collect())
            .unwrap_or_default();
        counted.sort_by(|(a, _), (b, _)| natural_cmp(a, b));
        counted
    }

    /// Whether any requirement of `document` is tagged.
    #[must_use]
    pub fn has_tags(&self, document: &NodeRecord) -> bool {
        self.tags
            .get(&document.mid)
            .is_some_and(|histogram| !histogram.is_empty())
    }

    // ========== Documents ==========

    /// Documents owning parents of requirements in `document`.
    #[must_use]
    pub fn document_dependencies(&self, document: &NodeRecord) -> Vec<&NodeRecord> {
        self.document_neighbors(document.mid, Direction::Outgoing)
    }

    /// Documents whose requirements have parents in `document`.
    #[must_use]
    pub fn document_dependents(&self, document: &NodeRecord) -> Vec<&NodeRecord> {
        self.document_neighbors(document.mid, Direction::Incoming)
    }

    /// Documents related to `document` in either direction, without repeats.
    ///
    /// These must be regenerated together with `document`.
    #[must_use]
    pub fn linked_documents(&self, document: &NodeRecord) -> Vec<&NodeRecord> {
        let mut seen = HashSet::new();
        self.document_dependencies(document)
            .into_iter()
            .chain(self.document_dependents(document))
            .filter(|doc| seen.insert(doc.mid))
            .collect()
    }

    fn document_neighbors(&self, mid: Mid, direction: Direction) -> Vec<&NodeRecord> {
        if !self.document_graph.contains_node(mid) {
            return Vec::new();
        }
        let mut neighbors: Vec<&NodeRecord> = self
            .document_graph
            .neighbors_directed(mid, direction)
            .filter_map(|m| self.store.get_node_weak(&m))
            .collect();
        let order: HashMap<Mid, usize> = self
            .documents
            .iter()
            .enumerate()
            .map(|(i, m)| (*m, i))
            .collect();
        neighbors.sort_by_key(|doc| order.get(&doc.mid).copied().unwrap_or(usize::MAX));
        neighbors
    }

    // ========== Depth ==========

    /// Longest parent and child chains inside `document`.
    #[must_use]
    pub fn document_reference_depth(&self, document: &NodeRecord) -> ReferenceDepth {
        self.document_depths
            .get(&document.mid)
            .copied()
            .unwrap_or_default()
    }

    /// Length of the longest chain of parents above `node`.
    #[must_use]
    pub fn parent_depth(&self, node: &NodeRecord) -> usize {
        self.depths.get(&node.mid).map_or(0, |d| d.parents)
    }

    /// Length of the longest chain of children below `node`.
    #[must_use]
    pub fn child_depth(&self, node: &NodeRecord) -> usize {
        self.depths.get(&node.mid).map_or(0, |d| d.children)
    }

    // ========== Diagnostics ==========

    /// Recoverable problems found while building.
    #[must_use]
    pub fn warnings(&self) -> &[IndexWarning] {
        &self.warnings
    }
}

/// Compare with digit runs taken as numbers: `REQ-2 < REQ-10`.
pub(crate) fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();
    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let l_num = take_digits(&mut left);
                let r_num = take_digits(&mut right);
                let by_value = l_num
                    .trim_start_matches('0')
                    .len()
                    .cmp(&r_num.trim_start_matches('0').len())
                    .then_with(|| {
                        l_num
                            .trim_start_matches('0')
                            .cmp(r_num.trim_start_matches('0'))
                    });
                if by_value != Ordering::Equal {
                    return by_value;
                }
            }
            (Some(l), Some(r)) => {
                let by_char = l.to_lowercase().cmp(r.to_lowercase());
                if by_char != Ordering::Equal {
                    return by_char;
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
        digits.push(c);
    }
    digits
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("tag2", "tag10", Ordering::Less)]
    #[case("REQ-10", "REQ-9", Ordering::Greater)]
    #[case("alpha", "Beta", Ordering::Less)]
    #[case("a01", "a1", Ordering::Less)]
    #[case("same", "same", Ordering::Equal)]
    #[case("ab", "abc", Ordering::Less)]
    fn natural_order(#[case] a: &str, #[case] b: &str, #[case] expected: Ordering) {
        assert_eq!(natural_cmp(a, b), expected);
    }

    #[test]
    fn reference_depth_max_picks_larger_direction() {
        let depth = ReferenceDepth {
            parents: 2,
            children: 5,
        };
        assert_eq!(depth.max(), 5);
    }
}
