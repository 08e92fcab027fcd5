//! Interactive edits of a built index.
//!
//! Every edit keeps the invariants the builder established: relations stay
//! acyclic and mirrored in both views, roles and document edges follow the
//! relations, and depths are recomputed afterwards.

use super::builder::removal_guard;
use super::record::{NodeKind, NodeRecord, NodeTag, Traceable};
use super::{LinkType, TraceabilityIndex};
use crate::cycle::CycleDetector;
use crate::domain::Mid;
use crate::error::{Error, GraphError, Result};
use std::collections::BTreeSet;
use tracing::debug;

impl TraceabilityIndex {
    /// Check that `child_uid -> parent_uid` may be added.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownUid`] / [`Error::NotARequirement`] for bad endpoints
    /// - [`GraphError::DuplicateLink`] if the relation already exists
    /// - [`Error::Cycle`] if the relation would close a loop
    pub fn validate_parent_relation(&self, child_uid: &str, parent_uid: &str) -> Result<()> {
        let child = self.requirement_by_uid(child_uid)?;
        let parent = self.requirement_by_uid(parent_uid)?;

        if self
            .store
            .has_link(LinkType::ParentRelation, &child.mid, &parent.mid)
        {
            return Err(GraphError::DuplicateLink {
                link_type: format!("{:?}", LinkType::ParentRelation),
                from: child_uid.to_string(),
                to: parent_uid.to_string(),
            }
            .into());
        }

        CycleDetector::check_candidate_edge(
            &child_uid.to_string(),
            &parent_uid.to_string(),
            |uid: &String| self.related_uids(LinkType::ParentRelation, uid),
        )?;
        Ok(())
    }

    /// Make `parent_uid` a parent of `child_uid`.
    ///
    /// # Errors
    ///
    /// Whatever [`validate_parent_relation`](Self::validate_parent_relation)
    /// reports; the index is unchanged on error.
    pub fn add_parent_relation(
        &mut self,
        child_uid: &str,
        parent_uid: &str,
        role: Option<&str>,
    ) -> Result<()> {
        self.validate_parent_relation(child_uid, parent_uid)?;
        let child = self.requirement_by_uid(child_uid)?.mid;
        let parent = self.requirement_by_uid(parent_uid)?.mid;

        self.link_relation(child, parent, role.map(ToString::to_string))?;
        self.compute_depths();
        debug!(child = child_uid, parent = parent_uid, ?role, "Added parent relation");
        Ok(())
    }

    /// Remove the relation `child_uid -> parent_uid` from both views.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownUid`] / [`Error::NotARequirement`] for bad endpoints,
    /// [`GraphError::LinkNotFound`] if the relation does not exist.
    pub fn remove_parent_relation(&mut self, child_uid: &str, parent_uid: &str) -> Result<()> {
        let child = self.requirement_by_uid(child_uid)?;
        let parent = self.requirement_by_uid(parent_uid)?;
        let (child, child_document) = (child.mid, child.document);
        let (parent, parent_document) = (parent.mid, parent.document);

        self.store
            .remove_link(LinkType::ParentRelation, &child, &parent)?;
        self.store
            .remove_link(LinkType::ChildRelation, &parent, &child)?;
        self.roles.remove(&(child, parent));
        self.release_document_edge(child_document, parent_document);

        self.compute_depths();
        debug!(child = child_uid, parent = parent_uid, "Removed parent relation");
        Ok(())
    }

    /// Remove a node from the index.
    ///
    /// The removal guard refuses nodes still referenced by inline links,
    /// requirements that still have children, and documents or sections
    /// that still own content. Removing free text also removes its anchors
    /// and inline links.
    ///
    /// # Errors
    ///
    /// [`GraphError::NotFound`] if absent, [`GraphError::ConstraintViolation`]
    /// if the guard refuses.
    pub fn remove_node(&mut self, mid: Mid) -> Result<NodeRecord> {
        // Relations are dropped by the store, so remember them first
        let parents: Vec<Mid> = self
            .store
            .get_link_values(LinkType::ParentRelation, &mid)
            .to_vec();

        // Free-text parts go first, once the whole block is known to be removable
        let parts = match self.store.get_node_weak(&mid) {
            Some(node) if node.tag() == NodeTag::FreeText => node.children.clone(),
            _ => Vec::new(),
        };
        if !parts.is_empty() {
            for key in std::iter::once(&mid).chain(&parts) {
                removal_guard(&self.store, key).map_err(GraphError::ConstraintViolation)?;
            }
        }
        for part in &parts {
            let part = self.store.remove_node(part)?;
            if let Some(uid) = part.uid() {
                self.uid_map.remove(uid);
            }
        }

        let removed = self.store.remove_node(&mid)?;

        for parent in parents {
            self.roles.remove(&(mid, parent));
            if let Some(parent_document) = self.store.get_node_weak(&parent).map(|p| p.document) {
                self.release_document_edge(removed.document, parent_document);
            }
        }
        if let Some(uid) = removed.uid() {
            self.uid_map.remove(uid);
        }
        if let Some(owner) = removed.parent
            && let Ok(owner) = self.store.get_node_mut(&owner)
        {
            owner.children.retain(|child| *child != mid);
        }

        match &removed.kind {
            NodeKind::Requirement(requirement) => {
                self.file_traceability.remove_requirement(mid);
                if let Some(histogram) = self.tags.get_mut(&removed.document) {
                    let tags: BTreeSet<&String> = requirement.tags.iter().collect();
                    for tag in tags {
                        if let Some(count) = histogram.get_mut(tag) {
                            *count = count.saturating_sub(1);
                            if *count == 0 {
                                histogram.remove(tag);
                            }
                        }
                    }
                }
            }
            NodeKind::Document { .. } => {
                self.documents.retain(|document| *document != mid);
                self.document_graph.remove_node(mid);
                self.tags.remove(&mid);
            }
            NodeKind::Section { .. }
            | NodeKind::FreeText { .. }
            | NodeKind::Anchor { .. }
            | NodeKind::InlineLink { .. } => {}
        }

        self.compute_depths();
        debug!(node = %removed.label(), kind = %removed.tag(), "Removed node");
        Ok(removed)
    }

    fn requirement_by_uid(&self, uid: &str) -> Result<&NodeRecord> {
        let node = self.get_node_by_uid(uid)?;
        if node.tag() != NodeTag::Requirement {
            return Err(Error::NotARequirement {
                uid: uid.to_string(),
            });
        }
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Anchor, Document, Forest, FreeText, InlineLink, Requirement, Section, TextPart,
    };

    fn index(documents: Vec<Document>) -> TraceabilityIndex {
        TraceabilityIndex::build(Forest::new(documents)).unwrap()
    }

    fn chain() -> TraceabilityIndex {
        index(vec![
            Document::new("Chain", "chain.sdoc")
                .with_node(Requirement::new().with_uid("A"))
                .with_node(Requirement::new().with_uid("B").with_parent("A"))
                .with_node(Requirement::new().with_uid("C").with_parent("B")),
        ])
    }

    #[test]
    fn closing_edge_is_rejected_with_its_cycle() {
        let index = chain();
        let err = index.validate_parent_relation("A", "C").unwrap_err();
        let Error::Cycle(cycle) = err else {
            panic!("expected a cycle error");
        };
        assert_eq!(cycle.cycle, vec!["A", "C", "B"]);
    }

    #[test]
    fn existing_relation_is_rejected() {
        let index = chain();
        let err = index.validate_parent_relation("B", "A").unwrap_err();
        assert!(matches!(err, Error::Graph(GraphError::DuplicateLink { .. })));
    }

    #[test]
    fn section_endpoint_is_rejected() {
        let index = index(vec![
            Document::new("Doc", "doc.sdoc")
                .with_node(Section::new("Intro").with_uid("SECT-1"))
                .with_node(Requirement::new().with_uid("REQ-1")),
        ]);
        let err = index.validate_parent_relation("REQ-1", "SECT-1").unwrap_err();
        assert!(matches!(err, Error::NotARequirement { ref uid } if uid == "SECT-1"));
    }

    #[test]
    fn add_then_remove_relation_restores_depths() {
        let mut index = chain();
        index.add_parent_relation("C", "A", Some("refines")).unwrap();

        let c = index.get_node_by_uid("C").unwrap();
        assert_eq!(index.get_parent_relations_with_role(c, Some("refines")).len(), 1);
        assert_eq!(index.parent_depth(c), 2);

        index.remove_parent_relation("B", "A").unwrap();
        let b = index.get_node_by_uid("B").unwrap();
        let c = index.get_node_by_uid("C").unwrap();
        assert_eq!(index.parent_depth(b), 0);
        assert_eq!(index.parent_depth(c), 1);
        let a = index.get_node_by_uid("A").unwrap();
        assert_eq!(index.get_children_requirements(a).len(), 1);
    }

    #[test]
    fn removing_a_parent_with_children_is_refused() {
        let mut index = chain();
        let a = index.get_node_by_uid("A").unwrap().mid;
        let err = index.remove_node(a).unwrap_err();
        assert!(matches!(err, Error::Graph(GraphError::ConstraintViolation(_))));
        assert!(index.has_uid("A"));
    }

    #[test]
    fn removing_a_leaf_clears_relations_and_cross_document_edges() {
        let mut index = index(vec![
            Document::new("Top", "top.sdoc").with_node(Requirement::new().with_uid("A")),
            Document::new("Low", "low.sdoc").with_node(
                Requirement::new()
                    .with_uid("B")
                    .with_parent("A")
                    .with_tag("safety"),
            ),
        ]);
        let b = index.get_node_by_uid("B").unwrap().mid;

        let removed = index.remove_node(b).unwrap();

        assert_eq!(removed.label(), "B");
        assert!(!index.has_uid("B"));
        let a = index.get_node_by_uid("A").unwrap();
        assert!(!index.has_children_requirements(a));
        let low = index.documents().nth(1).unwrap();
        assert!(low.children.is_empty());
        assert!(index.document_dependencies(low).is_empty());
        assert!(!index.has_tags(low));
    }

    #[test]
    fn linked_anchor_blocks_free_text_removal() {
        let text = FreeText::new("see ").with_part(TextPart::Anchor(Anchor::new("ANCHOR-1")));
        let text_mid = text.mid;
        let mut index = index(vec![
            Document::new("Doc", "doc.sdoc").with_node(text).with_node(
                FreeText::new("link ").with_part(TextPart::InlineLink(InlineLink::new("ANCHOR-1"))),
            ),
        ]);

        assert!(index.remove_node(text_mid).is_err());
        assert!(index.has_uid("ANCHOR-1"));
    }

    #[test]
    fn refused_free_text_removal_keeps_its_parts() {
        let text = FreeText::new("see ")
            .with_part(TextPart::InlineLink(InlineLink::new("REQ-1")))
            .with_part(TextPart::Anchor(Anchor::new("ANCHOR-1")));
        let text_mid = text.mid;
        let mut index = index(vec![
            Document::new("Doc", "doc.sdoc")
                .with_node(Requirement::new().with_uid("REQ-1"))
                .with_node(text)
                .with_node(
                    FreeText::new("link ")
                        .with_part(TextPart::InlineLink(InlineLink::new("ANCHOR-1"))),
                ),
        ]);
        let before = index.node_count();

        let err = index.remove_node(text_mid).unwrap_err();

        assert!(matches!(err, Error::Graph(GraphError::ConstraintViolation(_))));
        assert_eq!(index.node_count(), before);
        assert!(index.has_uid("ANCHOR-1"));
        let requirement = index.get_node_by_uid("REQ-1").unwrap();
        assert_eq!(index.get_incoming_links(requirement).len(), 1);
        let text = index.get_node_by_mid(text_mid).unwrap();
        assert_eq!(text.children.len(), 2);
    }

    #[test]
    fn free_text_removal_drops_its_links() {
        let text = FreeText::new("see ")
            .with_part(TextPart::InlineLink(InlineLink::new("REQ-1")))
            .with_part(TextPart::Anchor(Anchor::new("ANCHOR-1")));
        let text_mid = text.mid;
        let mut index = index(vec![
            Document::new("Doc", "doc.sdoc")
                .with_node(Requirement::new().with_uid("REQ-1"))
                .with_node(text),
        ]);
        let before = index.node_count();

        index.remove_node(text_mid).unwrap();

        assert_eq!(index.node_count(), before - 3);
        let requirement = index.get_node_by_uid("REQ-1").unwrap();
        assert!(index.get_incoming_links(requirement).is_empty());
        let document = index.documents().next().unwrap();
        assert_eq!(document.children, vec![requirement.mid]);
    }

    #[test]
    fn unlinked_free_text_takes_its_anchors_along() {
        let text = FreeText::new("see ").with_part(TextPart::Anchor(Anchor::new("ANCHOR-1")));
        let text_mid = text.mid;
        let mut index = index(vec![Document::new("Doc", "doc.sdoc").with_node(text)]);
        let before = index.node_count();

        index.remove_node(text_mid).unwrap();

        assert!(!index.has_uid("ANCHOR-1"));
        assert_eq!(index.node_count(), before - 2);
    }
}
