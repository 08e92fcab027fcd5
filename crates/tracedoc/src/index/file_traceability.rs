//! Requirement ↔ source file links.

use crate::domain::Mid;
use std::collections::{BTreeMap, HashMap};

/// Bidirectional map between requirements and the source files they name.
///
/// Paths are project-relative, normalized to forward slashes without a
/// leading `./`.
#[derive(Debug, Clone, Default)]
pub struct FileTraceability {
    requirement_to_files: HashMap<Mid, Vec<String>>,
    file_to_requirements: BTreeMap<String, Vec<Mid>>,
}

impl FileTraceability {
    /// Create an empty sub-index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `requirement` names `path`. Repeats are ignored.
    pub fn register(&mut self, requirement: Mid, path: &str) {
        let path = normalize(path);
        let files = self.requirement_to_files.entry(requirement).or_default();
        if files.contains(&path) {
            return;
        }
        files.push(path.clone());
        self.file_to_requirements
            .entry(path)
            .or_default()
            .push(requirement);
    }

    /// Files named by `requirement`, in declaration order.
    #[must_use]
    pub fn files_for(&self, requirement: Mid) -> &[String] {
        self.requirement_to_files
            .get(&requirement)
            .map_or(&[], Vec::as_slice)
    }

    /// Requirements naming `path`, in registration order.
    #[must_use]
    pub fn requirements_for(&self, path: &str) -> &[Mid] {
        self.file_to_requirements
            .get(&normalize(path))
            .map_or(&[], Vec::as_slice)
    }

    /// Every referenced source file, sorted.
    pub fn source_files(&self) -> impl Iterator<Item = &str> {
        self.file_to_requirements.keys().map(String::as_str)
    }

    /// Drop all links of `requirement`.
    pub fn remove_requirement(&mut self, requirement: Mid) {
        let Some(files) = self.requirement_to_files.remove(&requirement) else {
            return;
        };
        for file in files {
            if let Some(requirements) = self.file_to_requirements.get_mut(&file) {
                requirements.retain(|mid| *mid != requirement);
                if requirements.is_empty() {
                    self.file_to_requirements.remove(&file);
                }
            }
        }
    }
}

fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    path.strip_prefix("./").unwrap_or(&path).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("src/brake.rs", "src/brake.rs")]
    #[case("./src/brake.rs", "src/brake.rs")]
    #[case("src\\brake.rs", "src/brake.rs")]
    fn paths_are_normalized(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize(input), expected);
    }

    #[test]
    fn links_are_bidirectional_and_deduplicated() {
        let (a, b) = (Mid::new(), Mid::new());
        let mut files = FileTraceability::new();
        files.register(a, "src/brake.rs");
        files.register(a, "./src/brake.rs");
        files.register(a, "src/abs.rs");
        files.register(b, "src/brake.rs");

        assert_eq!(files.files_for(a), ["src/brake.rs", "src/abs.rs"]);
        assert_eq!(files.requirements_for("src/brake.rs"), [a, b]);
        assert_eq!(
            files.source_files().collect::<Vec<_>>(),
            vec!["src/abs.rs", "src/brake.rs"]
        );
    }

    #[test]
    fn remove_requirement_cleans_both_sides() {
        let (a, b) = (Mid::new(), Mid::new());
        let mut files = FileTraceability::new();
        files.register(a, "src/abs.rs");
        files.register(a, "src/brake.rs");
        files.register(b, "src/brake.rs");

        files.remove_requirement(a);

        assert!(files.files_for(a).is_empty());
        assert_eq!(files.requirements_for("src/brake.rs"), [b]);
        assert_eq!(files.source_files().collect::<Vec<_>>(), vec!["src/brake.rs"]);
    }
}
