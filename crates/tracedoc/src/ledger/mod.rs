//! Input → output freshness tracking across builds.
//!
//! Renderers report every `(input, output)` pair they produce into the
//! current generation. At the end of a build [`DependencyLedger::resolve`]
//! compares modification times over the current and the previous
//! generation, computes what must be regenerated, and persists the current
//! generation for the next run.
//!
//! The ledger never yields a false negative: missing files and unreadable
//! metadata count as stale.

mod cache;

pub use cache::CACHE_VERSION;

use crate::config::ProjectConfig;
use crate::error::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// What one input produced during a build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Files generated from the input
    pub outputs: BTreeSet<PathBuf>,
    /// Inputs to regenerate whenever this one is stale
    pub dependents: BTreeSet<PathBuf>,
}

/// Two-generation freshness ledger.
#[derive(Debug)]
pub struct DependencyLedger {
    cache_path: PathBuf,
    /// Newer than an output means the output is stale
    engine_last_update: Option<SystemTime>,
    now: BTreeMap<PathBuf, LedgerEntry>,
    prev: BTreeMap<PathBuf, LedgerEntry>,
    stale_outputs: BTreeSet<PathBuf>,
    stale_inputs: BTreeSet<PathBuf>,
}

impl DependencyLedger {
    /// Open the ledger cached at `cache_path`.
    ///
    /// A missing or corrupt cache starts an empty previous generation.
    #[must_use]
    pub fn load(cache_path: impl Into<PathBuf>, engine_last_update: Option<SystemTime>) -> Self {
        let cache_path = cache_path.into();
        let prev = cache::load(&cache_path);
        Self {
            cache_path,
            engine_last_update,
            now: BTreeMap::new(),
            prev,
            stale_outputs: BTreeSet::new(),
            stale_inputs: BTreeSet::new(),
        }
    }

    /// Open the ledger of a project, using its cache location and engine
    /// timestamp.
    #[must_use]
    pub fn for_project(config: &ProjectConfig) -> Self {
        Self::load(config.ledger_path(), config.engine_last_update())
    }

    /// Path of the persisted cache.
    #[must_use]
    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Record that `output` was generated from `input` in this build.
    pub fn add_dependency(&mut self, input: impl Into<PathBuf>, output: impl Into<PathBuf>) {
        self.now
            .entry(input.into())
            .or_default()
            .outputs
            .insert(output.into());
    }

    /// Record that `dependent` must be regenerated whenever `input` is.
    pub fn add_dependent(&mut self, input: impl Into<PathBuf>, dependent: impl Into<PathBuf>) {
        self.now
            .entry(input.into())
            .or_default()
            .dependents
            .insert(dependent.into());
    }

    /// Compute the must-regenerate set, then persist this generation.
    ///
    /// Afterwards the current generation becomes the previous one and a new,
    /// empty current generation starts.
    ///
    /// # Errors
    ///
    /// Fails only if the cache cannot be written; the computed set is still
    /// available through [`must_regenerate_set`](Self::must_regenerate_set).
    pub fn resolve(&mut self) -> Result<&BTreeSet<PathBuf>> {
        let mut outputs = BTreeSet::new();
        let mut inputs = BTreeSet::new();
        let mut dependents = BTreeSet::new();

        for (input, entry) in self.now.iter().chain(&self.prev) {
            let stale: Vec<&PathBuf> = entry
                .outputs
                .iter()
                .filter(|output| is_stale(input, output, self.engine_last_update))
                .collect();
            if stale.is_empty() {
                continue;
            }
            if input.is_file() {
                inputs.insert(input.clone());
            }
            outputs.extend(stale.into_iter().cloned());
            dependents.extend(entry.dependents.iter().cloned());
        }

        for dependent in dependents {
            for generation in [&self.now, &self.prev] {
                if let Some(entry) = generation.get(&dependent) {
                    outputs.extend(entry.outputs.iter().cloned());
                }
            }
            inputs.insert(dependent);
        }

        debug!(
            inputs = inputs.len(),
            outputs = outputs.len(),
            "Resolved must-regenerate set"
        );
        self.stale_outputs = outputs;
        self.stale_inputs = inputs;

        self.prev = std::mem::take(&mut self.now);
        cache::save(&self.cache_path, &self.prev)?;
        Ok(&self.stale_outputs)
    }

    /// Whether `output` was found stale by the last [`resolve`](Self::resolve).
    #[must_use]
    pub fn must_regenerate(&self, output: &Path) -> bool {
        self.stale_outputs.contains(output)
    }

    /// Whether `input` has a stale output or depends on a stale input.
    #[must_use]
    pub fn must_generate_input(&self, input: &Path) -> bool {
        self.stale_inputs.contains(input)
    }

    /// Every output found stale by the last [`resolve`](Self::resolve).
    #[must_use]
    pub fn must_regenerate_set(&self) -> &BTreeSet<PathBuf> {
        &self.stale_outputs
    }

    /// The generation being recorded.
    #[must_use]
    pub fn current(&self) -> &BTreeMap<PathBuf, LedgerEntry> {
        &self.now
    }

    /// The generation loaded from the cache or left by the last resolve.
    #[must_use]
    pub fn previous(&self) -> &BTreeMap<PathBuf, LedgerEntry> {
        &self.prev
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

fn is_stale(input: &Path, output: &Path, engine_last_update: Option<SystemTime>) -> bool {
    let Some(output_time) = modified(output) else {
        return true;
    };
    let Some(input_time) = modified(input) else {
        return true;
    };
    input_time > output_time || engine_last_update.is_some_and(|engine| engine > output_time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;
    use tempfile::TempDir;

    fn touch(path: &Path, time: SystemTime) {
        let file = File::create(path).unwrap();
        file.set_modified(time).unwrap();
    }

    #[test]
    fn equal_times_are_fresh() {
        let dir = TempDir::new().unwrap();
        let (input, output) = (dir.path().join("a.sdoc"), dir.path().join("a.html"));
        let time = SystemTime::now();
        touch(&input, time);
        touch(&output, time);

        assert!(!is_stale(&input, &output, None));
        assert!(!is_stale(&input, &output, Some(time)));
    }

    #[test]
    fn engine_update_invalidates_outputs() {
        let dir = TempDir::new().unwrap();
        let (input, output) = (dir.path().join("a.sdoc"), dir.path().join("a.html"));
        let time = SystemTime::now() - Duration::from_secs(60);
        touch(&input, time);
        touch(&output, time);

        assert!(is_stale(&input, &output, Some(SystemTime::now())));
    }

    #[test]
    fn missing_input_is_stale_but_not_scheduled() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("gone.html");
        touch(&output, SystemTime::now());
        let input = dir.path().join("gone.sdoc");

        let mut ledger = DependencyLedger::load(dir.path().join("cache.jsonl"), None);
        ledger.add_dependency(&input, &output);
        ledger.resolve().unwrap();

        assert!(ledger.must_regenerate(&output));
        assert!(!ledger.must_generate_input(&input));
    }

    #[test]
    fn resolve_rotates_generations() {
        let dir = TempDir::new().unwrap();
        let mut ledger = DependencyLedger::load(dir.path().join("cache.jsonl"), None);
        ledger.add_dependency("a.sdoc", "a.html");

        ledger.resolve().unwrap();

        assert!(ledger.current().is_empty());
        assert_eq!(ledger.previous().len(), 1);
        assert!(dir.path().join("cache.jsonl").is_file());
    }
}
