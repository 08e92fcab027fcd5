//! Integration tests for editing a built index.

mod common;

use common::{build, req, system_and_software};
use std::path::Path;
use tracedoc::domain::{Document, Section};
use tracedoc::index::Traceable;
use tracedoc::{Error, GraphError};

// -- Relations --

#[test]
fn adding_a_cross_document_relation_links_the_documents() {
    let mut index = build(vec![
        Document::new("Top", "top.sdoc").with_node(req("TOP-1", "Top")),
        Document::new("Low", "low.sdoc").with_node(req("LOW-1", "Low")),
    ]);
    let top = index.document_by_path(Path::new("top.sdoc")).unwrap().mid;

    index
        .add_parent_relation("LOW-1", "TOP-1", Some("derives"))
        .unwrap();

    let low = index.document_by_path(Path::new("low.sdoc")).unwrap();
    assert_eq!(index.document_dependencies(low)[0].mid, top);
    let child = index.get_node_by_uid("LOW-1").unwrap();
    assert_eq!(
        index.get_parent_relations_with_roles(child)[0].1,
        Some("derives")
    );
    assert_eq!(index.parent_depth(child), 1);
}

#[test]
fn removing_the_last_relation_unlinks_the_documents() {
    let mut index = build(system_and_software());

    index.remove_parent_relation("SW-1", "SYS-1").unwrap();
    let software = index
        .document_by_path(Path::new("docs/software.sdoc"))
        .unwrap();
    assert_eq!(
        index.document_dependencies(software).len(),
        1,
        "SW-2 still has parents in the system document"
    );

    index.remove_parent_relation("SW-2", "SYS-1").unwrap();
    index.remove_parent_relation("SW-2", "SYS-2").unwrap();
    let software = index
        .document_by_path(Path::new("docs/software.sdoc"))
        .unwrap();
    assert!(index.document_dependencies(software).is_empty());
}

#[test]
fn removing_a_missing_relation_fails() {
    let mut index = build(system_and_software());

    let err = index
        .remove_parent_relation("SYS-1", "SYS-2")
        .expect_err("there is no such relation");
    assert!(matches!(err, Error::Graph(GraphError::LinkNotFound { .. })));
}

#[test]
fn validation_reports_bad_endpoints() {
    let index = build(vec![
        Document::new("Doc", "doc.sdoc")
            .with_node(Section::new("Intro").with_uid("SEC-1"))
            .with_node(req("REQ-1", "One")),
    ]);

    assert!(matches!(
        index.validate_parent_relation("REQ-1", "NOPE"),
        Err(Error::UnknownUid(ref uid)) if uid == "NOPE"
    ));
    assert!(matches!(
        index.validate_parent_relation("REQ-1", "SEC-1"),
        Err(Error::NotARequirement { .. })
    ));
}

// -- Node removal --

#[test]
fn parent_with_children_cannot_be_removed() {
    let mut index = build(system_and_software());
    let sys1 = index.get_node_by_uid("SYS-1").unwrap().mid;

    let err = index.remove_node(sys1).expect_err("SYS-1 still has children");
    assert!(matches!(err, Error::ConstraintViolation(_)), "{err:?}");
    assert!(index.has_uid("SYS-1"));
}

#[test]
fn removing_a_child_releases_relations_tags_and_files() {
    let mut index = build(system_and_software());
    let before = index.node_count();
    let sw1 = index.get_node_by_uid("SW-1").unwrap().mid;

    let removed = index.remove_node(sw1).unwrap();
    assert_eq!(removed.uid(), Some("SW-1"));
    assert_eq!(index.node_count(), before - 1);
    assert!(!index.has_uid("SW-1"));
    assert!(index.get_source_file_requirements("src/brake.rs").is_empty());

    let sys1 = index.get_node_by_uid("SYS-1").unwrap();
    let children: Vec<_> = index
        .get_children_requirements(sys1)
        .into_iter()
        .filter_map(Traceable::uid)
        .collect();
    assert_eq!(children, vec!["SW-2"]);
}

#[test]
fn emptied_tree_can_be_removed_bottom_up() {
    let mut index = build(vec![
        Document::new("Doc", "doc.sdoc")
            .with_node(Section::new("Intro").with_node(req("REQ-1", "One").with_tag("x"))),
    ]);
    let document = index.document_by_path(Path::new("doc.sdoc")).unwrap().mid;
    let section = index.get_node_by_mid(document).unwrap().children[0];
    let requirement = index.get_node_by_uid("REQ-1").unwrap().mid;

    assert!(index.remove_node(section).is_err(), "section still owns REQ-1");
    index.remove_node(requirement).unwrap();
    index.remove_node(section).unwrap();
    index.remove_node(document).unwrap();

    assert_eq!(index.node_count(), 0);
    assert_eq!(index.documents().count(), 0);
}
