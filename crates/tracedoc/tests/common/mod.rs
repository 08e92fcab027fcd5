//! Common fixtures shared across integration tests.

#![allow(dead_code)]

use std::fs::File;
use std::path::Path;
use std::sync::Once;
use std::time::{Duration, SystemTime};
use tracedoc::domain::{Document, Forest, Reference, Requirement, Section};
use tracedoc::index::TraceabilityIndex;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Route `tracing` output to the test harness; filter with `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Build an index, failing the test on error.
pub fn build(documents: Vec<Document>) -> TraceabilityIndex {
    init_tracing();
    TraceabilityIndex::build(Forest::new(documents)).expect("index build failed")
}

/// Build an index, returning the error the build is expected to produce.
pub fn build_err(documents: Vec<Document>) -> tracedoc::Error {
    init_tracing();
    TraceabilityIndex::build(Forest::new(documents)).expect_err("index build should fail")
}

/// A requirement with a UID and a title.
pub fn req(uid: &str, title: &str) -> Requirement {
    Requirement::new().with_uid(uid).with_title(title)
}

/// Two-level system/software fixture:
///
/// ```text
/// system.sdoc    SYS-1 Braking ─┬─ SW-1 (software.sdoc, role "refines")
///                SYS-2 Steering │
/// software.sdoc  Controls       └─ SW-2 (also child of SYS-2)
///                  SW-1, SW-2
/// ```
pub fn system_and_software() -> Vec<Document> {
    vec![
        Document::new("System", "docs/system.sdoc")
            .with_uid("DOC-SYS")
            .with_node(req("SYS-1", "Braking").with_tag("safety"))
            .with_node(req("SYS-2", "Steering").with_tag("safety").with_tag("ux")),
        Document::new("Software", "docs/software.sdoc").with_node(
            Section::new("Controls")
                .with_node(
                    req("SW-1", "Brake controller")
                        .with_reference(Reference::parent("SYS-1").with_role("refines"))
                        .with_reference(Reference::file("src/brake.rs")),
                )
                .with_node(
                    req("SW-2", "Stability control")
                        .with_parent("SYS-1")
                        .with_parent("SYS-2")
                        .with_tag("tag10")
                        .with_tag("tag2"),
                ),
        ),
    ]
}

/// Create `path` with its modification time set to `age` before now.
pub fn touch_aged(path: &Path, age: Duration) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("failed to create parent dirs");
    }
    let file = File::create(path).expect("failed to create file");
    file.set_modified(SystemTime::now() - age)
        .expect("failed to set mtime");
}
