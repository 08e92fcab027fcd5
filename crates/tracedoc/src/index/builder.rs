//! Two-pass construction of the traceability index.
//!
//! **Pass 1** walks every document depth-first and registers each node
//! under its MID and UID. UID uniqueness is enforced here across the whole
//! forest. Requirements contribute their tags and file links immediately;
//! their parent and child references are queued as pending relations
//! because the referenced UID may not have been seen yet.
//!
//! **Pass 2** resolves the queued relations and inline links against the
//! complete UID map, pruning unresolved ones with a warning, then proves
//! both the parent view and the child view acyclic and computes relation
//! depths.

use super::record::{NodeKind, NodeRecord, NodeTag, Traceable};
use super::{IndexWarning, LinkType, NodeStore, ReferenceDepth, TraceabilityIndex};
use crate::cycle::{CycleDetector, CycleError};
use crate::domain::{
    Anchor, Document, Forest, InlineLink, Mid, Node, ReferenceKind, Requirement, Section, TextPart,
};
use crate::error::{Error, NodeLocation, Result};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// A parent or child reference waiting for pass 2.
#[derive(Debug)]
struct PendingRelation {
    /// Requirement declaring the reference
    declared_by: Mid,
    /// UID named by the reference
    target_uid: String,
    role: Option<String>,
    kind: ReferenceKind,
}

/// An inline link waiting for pass 2.
#[derive(Debug)]
struct PendingLink {
    link: Mid,
    target_uid: String,
    document: Mid,
}

pub(super) struct IndexBuilder {
    index: TraceabilityIndex,
    pending_relations: Vec<PendingRelation>,
    pending_links: Vec<PendingLink>,
}

impl IndexBuilder {
    pub(super) fn new() -> Self {
        Self {
            index: TraceabilityIndex::empty(),
            pending_relations: Vec::new(),
            pending_links: Vec::new(),
        }
    }

    pub(super) fn build(mut self, forest: Forest) -> Result<TraceabilityIndex> {
        let document_count = forest.documents.len();

        for document in forest.documents {
            self.register_document(document)?;
        }
        debug!(
            pass = 1,
            documents = document_count,
            nodes = self.index.store.node_count(),
            uids = self.index.uid_map.len(),
            pending_relations = self.pending_relations.len(),
            pending_links = self.pending_links.len(),
            "Registered nodes"
        );

        self.resolve_relations()?;
        self.resolve_inline_links()?;
        debug!(
            pass = 2,
            parent_relations = self.index.store.link_count(LinkType::ParentRelation),
            inline_links = self.index.store.link_count(LinkType::IncomingLink),
            warnings = self.index.warnings.len(),
            "Resolved references"
        );

        self.check_cycles()?;
        self.index.compute_depths();
        self.index.install_removal_validator();

        info!(
            documents = document_count,
            nodes = self.index.store.node_count(),
            warnings = self.index.warnings.len(),
            "Built traceability index"
        );
        Ok(self.index)
    }

    // ========== Pass 1 ==========

    fn register_document(&mut self, document: Document) -> Result<()> {
        let Document {
            mid,
            uid,
            title,
            path,
            content,
        } = document;

        self.insert(record(mid, None, mid, NodeKind::Document { uid, title, path }))?;
        self.index.documents.push(mid);

        let mut children = Vec::with_capacity(content.len());
        for node in content {
            children.push(self.register_node(node, mid, mid)?);
        }
        self.set_children(mid, children)
    }

    fn register_node(&mut self, node: Node, parent: Mid, document: Mid) -> Result<Mid> {
        match node {
            Node::Section(Section {
                mid,
                uid,
                title,
                content,
            }) => {
                self.insert(record(
                    mid,
                    Some(parent),
                    document,
                    NodeKind::Section { uid, title },
                ))?;
                let mut children = Vec::with_capacity(content.len());
                for child in content {
                    children.push(self.register_node(child, mid, document)?);
                }
                self.set_children(mid, children)?;
                Ok(mid)
            }
            Node::Requirement(requirement) => {
                let mid = requirement.mid;
                self.collect_requirement(&requirement, document);
                self.insert(record(
                    mid,
                    Some(parent),
                    document,
                    NodeKind::Requirement(requirement),
                ))?;
                Ok(mid)
            }
            Node::FreeText(text) => {
                let mid = text.mid;
                let plain = text.plain_text();
                self.insert(record(
                    mid,
                    Some(parent),
                    document,
                    NodeKind::FreeText { text: plain },
                ))?;

                let mut children = Vec::new();
                for part in text.parts {
                    match part {
                        TextPart::Text(_) => {}
                        TextPart::Anchor(Anchor {
                            mid: anchor,
                            uid,
                            title,
                        }) => {
                            self.insert(record(
                                anchor,
                                Some(mid),
                                document,
                                NodeKind::Anchor { uid, title },
                            ))?;
                            children.push(anchor);
                        }
                        TextPart::InlineLink(InlineLink {
                            mid: link,
                            target_uid,
                        }) => {
                            self.pending_links.push(PendingLink {
                                link,
                                target_uid: target_uid.clone(),
                                document,
                            });
                            self.insert(record(
                                link,
                                Some(mid),
                                document,
                                NodeKind::InlineLink { target_uid },
                            ))?;
                            children.push(link);
                        }
                    }
                }
                self.set_children(mid, children)?;
                Ok(mid)
            }
        }
    }

    /// Tags, file links and pending relations of one requirement.
    fn collect_requirement(&mut self, requirement: &Requirement, document: Mid) {
        if !requirement.tags.is_empty() {
            let histogram = self.index.tags.entry(document).or_default();
            let tags: BTreeSet<&String> = requirement.tags.iter().collect();
            for tag in tags {
                *histogram.entry(tag.clone()).or_insert(0) += 1;
            }
        }

        for reference in &requirement.references {
            match reference.kind {
                ReferenceKind::File => self
                    .index
                    .file_traceability
                    .register(requirement.mid, &reference.target),
                ReferenceKind::Parent | ReferenceKind::Child => {
                    self.pending_relations.push(PendingRelation {
                        declared_by: requirement.mid,
                        target_uid: reference.target.clone(),
                        role: reference.role.clone(),
                        kind: reference.kind,
                    });
                }
            }
        }
    }

    fn insert(&mut self, record: NodeRecord) -> Result<()> {
        if self.index.store.has_node(&record.mid) {
            return Err(Error::DuplicateMid(record.mid));
        }
        if let Some(uid) = record.uid() {
            if let Some(existing) = self.index.uid_map.get(uid) {
                let first = self.location(self.index.store.get_node(existing)?);
                return Err(Error::DuplicateUid {
                    uid: uid.to_string(),
                    first,
                    second: self.location(&record),
                });
            }
            self.index.uid_map.insert(uid.to_string(), record.mid);
        }
        self.index.store.add_node(record.mid, record)?;
        Ok(())
    }

    fn set_children(&mut self, mid: Mid, children: Vec<Mid>) -> Result<()> {
        self.index.store.get_node_mut(&mid)?.children = children;
        Ok(())
    }

    fn location(&self, record: &NodeRecord) -> NodeLocation {
        let document = if record.mid == record.document {
            Some(record)
        } else {
            self.index.store.get_node_weak(&record.document)
        };
        let (path, document_title) = match document.map(|doc| &doc.kind) {
            Some(NodeKind::Document { path, title, .. }) => (path.clone(), title.clone()),
            _ => (PathBuf::new(), String::new()),
        };
        NodeLocation {
            document: path,
            document_title,
            title: record.title().map(ToString::to_string),
        }
    }

    // ========== Pass 2 ==========

    fn resolve_relations(&mut self) -> Result<()> {
        for relation in std::mem::take(&mut self.pending_relations) {
            let declaring = self.index.store.get_node(&relation.declared_by)?;
            let label = declaring.label();
            let document = self.index.document_path(declaring.document);

            let Some(&target) = self.index.uid_map.get(&relation.target_uid) else {
                warn!(
                    requirement = %label,
                    target = %relation.target_uid,
                    kind = %relation.kind,
                    "Pruned relation to unknown UID"
                );
                let warning = match relation.kind {
                    ReferenceKind::Child => IndexWarning::UnresolvedChild {
                        requirement: label,
                        target: relation.target_uid,
                        document,
                    },
                    _ => IndexWarning::UnresolvedParent {
                        requirement: label,
                        target: relation.target_uid,
                        document,
                    },
                };
                self.index.warnings.push(warning);
                continue;
            };

            if target == relation.declared_by {
                return Err(CycleError {
                    uid: label.clone(),
                    cycle: vec![label],
                }
                .into());
            }

            if self.index.store.get_node(&target)?.tag() != NodeTag::Requirement {
                warn!(
                    requirement = %label,
                    target = %relation.target_uid,
                    "Pruned relation to a node that is not a requirement"
                );
                self.index.warnings.push(IndexWarning::NonRequirementTarget {
                    requirement: label,
                    target: relation.target_uid,
                    document,
                });
                continue;
            }

            let (child, parent) = match relation.kind {
                ReferenceKind::Child => (target, relation.declared_by),
                _ => (relation.declared_by, target),
            };
            self.index.link_relation(child, parent, relation.role)?;
        }
        Ok(())
    }

    fn resolve_inline_links(&mut self) -> Result<()> {
        for pending in std::mem::take(&mut self.pending_links) {
            if let Some(&target) = self.index.uid_map.get(&pending.target_uid) {
                self.index
                    .store
                    .add_link(LinkType::IncomingLink, target, pending.link)?;
            } else {
                let document = self.index.document_path(pending.document);
                warn!(
                    target = %pending.target_uid,
                    document = %document.display(),
                    "Inline link to unknown UID"
                );
                self.index.warnings.push(IndexWarning::UnresolvedInlineLink {
                    target: pending.target_uid,
                    document,
                });
            }
        }
        Ok(())
    }

    fn check_cycles(&self) -> Result<()> {
        let mut parents = CycleDetector::new();
        let mut children = CycleDetector::new();

        let uids: Vec<String> = self
            .index
            .requirements()
            .filter_map(|node| node.uid().map(ToString::to_string))
            .collect();

        for uid in &uids {
            parents.check_node(uid, |u: &String| {
                self.index.related_uids(LinkType::ParentRelation, u)
            })?;
            children.check_node(uid, |u: &String| {
                self.index.related_uids(LinkType::ChildRelation, u)
            })?;
        }
        debug!(requirements = uids.len(), "Relations are acyclic");
        Ok(())
    }
}

fn record(mid: Mid, parent: Option<Mid>, document: Mid, kind: NodeKind) -> NodeRecord {
    NodeRecord {
        mid,
        parent,
        document,
        children: Vec::new(),
        kind,
    }
}

// Relation plumbing shared by the builder and the edit operations.
impl TraceabilityIndex {
    /// Link `child -> parent` in both views. Returns `false` if the
    /// relation already exists.
    pub(super) fn link_relation(
        &mut self,
        child: Mid,
        parent: Mid,
        role: Option<String>,
    ) -> Result<bool> {
        if self.store.has_link(LinkType::ParentRelation, &child, &parent) {
            return Ok(false);
        }
        self.store.add_link(LinkType::ParentRelation, child, parent)?;
        self.store.add_link(LinkType::ChildRelation, parent, child)?;
        self.roles.insert((child, parent), role);

        let child_document = self.store.get_node(&child)?.document;
        let parent_document = self.store.get_node(&parent)?.document;
        if child_document != parent_document {
            if let Some(weight) = self
                .document_graph
                .edge_weight_mut(child_document, parent_document)
            {
                *weight += 1;
            } else {
                self.document_graph
                    .add_edge(child_document, parent_document, 1);
            }
        }
        Ok(true)
    }

    /// Drop one relation behind the `child_document -> parent_document` edge.
    pub(super) fn release_document_edge(&mut self, child_document: Mid, parent_document: Mid) {
        if child_document == parent_document {
            return;
        }
        let remaining = match self
            .document_graph
            .edge_weight_mut(child_document, parent_document)
        {
            Some(weight) => {
                *weight = weight.saturating_sub(1);
                *weight
            }
            None => return,
        };
        if remaining == 0 {
            self.document_graph
                .remove_edge(child_document, parent_document);
        }
    }

    /// UIDs one hop away from `uid` along `link_type`.
    pub(crate) fn related_uids(&self, link_type: LinkType, uid: &str) -> Vec<String> {
        let Some(mid) = self.uid_map.get(uid) else {
            return Vec::new();
        };
        self.store
            .get_link_values(link_type, mid)
            .iter()
            .filter_map(|m| self.store.get_node_weak(m))
            .filter_map(|node| node.uid().map(ToString::to_string))
            .collect()
    }

    pub(super) fn document_path(&self, document: Mid) -> PathBuf {
        self.store
            .get_node_weak(&document)
            .and_then(NodeRecord::path)
            .map(PathBuf::from)
            .unwrap_or_default()
    }

    /// Recompute per-requirement and per-document depths.
    pub(super) fn compute_depths(&mut self) {
        let requirements: Vec<(Mid, Mid)> = self
            .requirements()
            .map(|node| (node.mid, node.document))
            .collect();

        let mids: Vec<Mid> = requirements.iter().map(|(mid, _)| *mid).collect();
        let parents = self.chain_depths(LinkType::ParentRelation, &mids);
        let children = self.chain_depths(LinkType::ChildRelation, &mids);

        self.depths.clear();
        self.document_depths.clear();
        for (mid, document) in requirements {
            let depth = ReferenceDepth {
                parents: parents.get(&mid).copied().unwrap_or_default(),
                children: children.get(&mid).copied().unwrap_or_default(),
            };
            self.depths.insert(mid, depth);
            let document_depth = self.document_depths.entry(document).or_default();
            document_depth.parents = document_depth.parents.max(depth.parents);
            document_depth.children = document_depth.children.max(depth.children);
        }
    }

    /// Longest chain below each of `starts` along `link_type`, in levels.
    ///
    /// One post-order walk over the acyclic view: a node's depth is one more
    /// than the deepest node it links to, and zero when it links nowhere.
    fn chain_depths(&self, link_type: LinkType, starts: &[Mid]) -> HashMap<Mid, usize> {
        let mut depths: HashMap<Mid, usize> = HashMap::new();
        let mut expanded = HashSet::new();

        for start in starts {
            let mut stack = vec![(*start, false)];
            while let Some((mid, done)) = stack.pop() {
                if depths.contains_key(&mid) {
                    continue;
                }
                let next = self.store.get_link_values(link_type, &mid);
                if done {
                    let depth = next
                        .iter()
                        .filter_map(|m| depths.get(m))
                        .map(|d| d + 1)
                        .max()
                        .unwrap_or(0);
                    depths.insert(mid, depth);
                } else if expanded.insert(mid) {
                    stack.push((mid, true));
                    stack.extend(
                        next.iter()
                            .filter(|m| !depths.contains_key(*m))
                            .map(|m| (*m, false)),
                    );
                }
            }
        }
        depths
    }

    pub(super) fn install_removal_validator(&mut self) {
        self.store.set_removal_validator(Box::new(removal_guard));
    }
}

/// Refuses to remove nodes that others still point at or that still own
/// content.
pub(super) fn removal_guard(store: &NodeStore, mid: &Mid) -> std::result::Result<(), String> {
    let node = store.get_node(mid).map_err(|e| e.to_string())?;

    let anchors = node
        .children
        .iter()
        .filter(|child| {
            store
                .get_node_weak(child)
                .is_some_and(|c| c.tag() == NodeTag::Anchor)
        });
    let incoming = store.get_link_values(LinkType::IncomingLink, mid).len()
        + anchors
            .map(|anchor| store.get_link_values(LinkType::IncomingLink, anchor).len())
            .sum::<usize>();
    if incoming > 0 {
        return Err(format!(
            "{} {} is the target of {incoming} inline link(s)",
            node.tag(),
            node.label()
        ));
    }

    let children = store.get_link_values(LinkType::ChildRelation, mid).len();
    if children > 0 {
        return Err(format!(
            "requirement {} still has {children} child requirement(s)",
            node.label()
        ));
    }

    if matches!(node.tag(), NodeTag::Document | NodeTag::Section) && !node.children.is_empty() {
        return Err(format!(
            "{} {} still owns {} node(s)",
            node.tag(),
            node.label(),
            node.children.len()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FreeText, Reference};

    fn doc(path: &str) -> Document {
        Document::new(path.to_uppercase(), path)
    }

    #[test]
    fn pass_one_records_tree_shape() {
        let requirement = Requirement::new().with_uid("REQ-1").with_title("Brake");
        let requirement_mid = requirement.mid;
        let section = Section::new("Chassis").with_node(requirement);
        let section_mid = section.mid;
        let document = doc("a.sdoc").with_node(section);
        let document_mid = document.mid;

        let index = TraceabilityIndex::build(Forest::new(vec![document])).unwrap();

        let node = index.get_node_by_mid(requirement_mid).unwrap();
        assert_eq!(node.parent, Some(section_mid));
        assert_eq!(node.document, document_mid);
        assert_eq!(
            index.get_node_by_mid(section_mid).unwrap().children,
            vec![requirement_mid]
        );
    }

    #[test]
    fn repeated_mid_is_fatal() {
        let requirement = Requirement::new().with_uid("REQ-1");
        let mut clone = requirement.clone();
        clone.uid = Some("REQ-2".to_string());
        let document = doc("a.sdoc").with_node(requirement).with_node(clone);

        let err = TraceabilityIndex::build(Forest::new(vec![document])).unwrap_err();
        assert!(matches!(err, Error::DuplicateMid(_)));
    }

    #[test]
    fn anchors_share_the_uid_namespace() {
        let text = FreeText::new("x").with_part(TextPart::Anchor(Anchor::new("REQ-1")));
        let document = doc("a.sdoc")
            .with_node(Requirement::new().with_uid("REQ-1"))
            .with_node(text);

        let err = TraceabilityIndex::build(Forest::new(vec![document])).unwrap_err();
        assert!(matches!(err, Error::DuplicateUid { ref uid, .. } if uid == "REQ-1"));
    }

    #[test]
    fn relation_declared_from_both_sides_is_stored_once() {
        let document = doc("a.sdoc")
            .with_node(
                Requirement::new()
                    .with_uid("PARENT")
                    .with_reference(Reference::child("CHILD")),
            )
            .with_node(Requirement::new().with_uid("CHILD").with_parent("PARENT"));

        let index = TraceabilityIndex::build(Forest::new(vec![document])).unwrap();

        let parent = index.get_node_by_uid("PARENT").unwrap();
        assert_eq!(index.get_children_requirements(parent).len(), 1);
        assert!(index.warnings().is_empty());
    }

    #[test]
    fn relation_to_section_is_pruned() {
        let document = doc("a.sdoc")
            .with_node(Section::new("Chassis").with_uid("SECT-1"))
            .with_node(Requirement::new().with_uid("REQ-1").with_parent("SECT-1"));

        let index = TraceabilityIndex::build(Forest::new(vec![document])).unwrap();

        assert_eq!(index.warnings().len(), 1);
        assert_eq!(index.warnings()[0].kind(), "non_requirement_target");
        let requirement = index.get_node_by_uid("REQ-1").unwrap();
        assert!(!index.has_parent_requirements(requirement));
    }

    #[test]
    fn self_reference_is_a_one_node_cycle() {
        let document =
            doc("a.sdoc").with_node(Requirement::new().with_uid("REQ-1").with_parent("REQ-1"));

        let err = TraceabilityIndex::build(Forest::new(vec![document])).unwrap_err();
        let Error::Cycle(cycle) = err else {
            panic!("expected a cycle error");
        };
        assert_eq!(cycle.cycle, vec!["REQ-1"]);
    }

    #[test]
    fn repeated_tag_counts_once_per_requirement() {
        let document = doc("a.sdoc").with_node(
            Requirement::new()
                .with_uid("REQ-1")
                .with_tag("safety")
                .with_tag("safety"),
        );
        let mut index = TraceabilityIndex::build(Forest::new(vec![document])).unwrap();

        let document = index.documents().next().unwrap();
        assert_eq!(index.get_counted_tags(document), vec![("safety", 1)]);

        let mid = index.get_node_by_uid("REQ-1").unwrap().mid;
        index.remove_node(mid).unwrap();
        let document = index.documents().next().unwrap();
        assert!(!index.has_tags(document));
    }

    #[test]
    fn long_chain_depth_counts_every_level() {
        let length = 300;
        let document = (1..length).fold(
            doc("a.sdoc").with_node(Requirement::new().with_uid("REQ-0")),
            |document, n| {
                document.with_node(
                    Requirement::new()
                        .with_uid(format!("REQ-{n}"))
                        .with_parent(format!("REQ-{}", n - 1)),
                )
            },
        );

        let mut index = TraceabilityIndex::build(Forest::new(vec![document])).unwrap();

        let top = index.get_node_by_uid("REQ-0").unwrap();
        let bottom = index.get_node_by_uid(&format!("REQ-{}", length - 1)).unwrap();
        assert_eq!(index.parent_depth(bottom), length - 1);
        assert_eq!(index.child_depth(top), length - 1);

        let bottom = bottom.mid;
        index.remove_node(bottom).unwrap();
        let top = index.get_node_by_uid("REQ-0").unwrap();
        assert_eq!(index.child_depth(top), length - 2);
    }

    #[test]
    fn depth_follows_longest_chain() {
        // REQ-4 reaches REQ-1 both directly and through REQ-3 -> REQ-2
        let document = doc("a.sdoc")
            .with_node(Requirement::new().with_uid("REQ-1"))
            .with_node(Requirement::new().with_uid("REQ-2").with_parent("REQ-1"))
            .with_node(Requirement::new().with_uid("REQ-3").with_parent("REQ-2"))
            .with_node(
                Requirement::new()
                    .with_uid("REQ-4")
                    .with_parent("REQ-3")
                    .with_parent("REQ-1"),
            );

        let index = TraceabilityIndex::build(Forest::new(vec![document])).unwrap();

        let top = index.get_node_by_uid("REQ-1").unwrap();
        let bottom = index.get_node_by_uid("REQ-4").unwrap();
        assert_eq!(index.parent_depth(bottom), 3);
        assert_eq!(index.child_depth(top), 3);
        assert_eq!(index.parent_depth(top), 0);

        let document = index.documents().next().unwrap();
        assert_eq!(
            index.document_reference_depth(document),
            ReferenceDepth {
                parents: 3,
                children: 3
            }
        );
    }
}
