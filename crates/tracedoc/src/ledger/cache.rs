//! On-disk format of the dependency ledger.
//!
//! A JSONL file whose first record is a header; every following record is
//! one input with its outputs and dependent inputs:
//!
//! ```text
//! {"record":"header","version":1,"saved_at":"2026-10-19T08:00:00Z"}
//! {"record":"entry","input":"docs/a.sdoc","outputs":["html/a.html"],"dependents":[]}
//! ```

use super::LedgerEntry;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracedoc_jsonl::{read_jsonl_resilient, write_jsonl_atomic_iter};
use tracing::{debug, warn};

/// Bumped whenever the record layout changes; older caches are discarded.
pub const CACHE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum CacheRecord {
    Header {
        version: u32,
        saved_at: DateTime<Utc>,
    },
    Entry {
        input: PathBuf,
        outputs: BTreeSet<PathBuf>,
        #[serde(default)]
        dependents: BTreeSet<PathBuf>,
    },
}

/// Read a cache written by [`save`]. Never fails: anything unusable yields
/// an empty map.
pub(super) fn load(path: &Path) -> BTreeMap<PathBuf, LedgerEntry> {
    if !path.exists() {
        debug!(path = %path.display(), "No dependency cache yet");
        return BTreeMap::new();
    }

    let (records, warnings) = match read_jsonl_resilient::<CacheRecord, _>(path) {
        Ok(loaded) => loaded,
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "Unreadable dependency cache, starting empty"
            );
            return BTreeMap::new();
        }
    };
    for warning in &warnings {
        warn!(
            path = %path.display(),
            line = warning.line_number,
            error = %warning.error,
            "Skipped dependency cache line"
        );
    }

    let mut records = records.into_iter();
    match records.next() {
        Some(CacheRecord::Header { version, .. }) if version == CACHE_VERSION => {}
        Some(CacheRecord::Header { version, .. }) => {
            warn!(
                path = %path.display(),
                found = version,
                expected = CACHE_VERSION,
                "Dependency cache version mismatch, starting empty"
            );
            return BTreeMap::new();
        }
        _ => {
            warn!(path = %path.display(), "Dependency cache has no header, starting empty");
            return BTreeMap::new();
        }
    }

    let mut entries = BTreeMap::new();
    for record in records {
        if let CacheRecord::Entry {
            input,
            outputs,
            dependents,
        } = record
        {
            let entry: &mut LedgerEntry = entries.entry(input).or_default();
            entry.outputs.extend(outputs);
            entry.dependents.extend(dependents);
        }
    }
    debug!(path = %path.display(), inputs = entries.len(), "Loaded dependency cache");
    entries
}

/// Atomically replace the cache at `path` with `entries`.
pub(super) fn save(path: &Path, entries: &BTreeMap<PathBuf, LedgerEntry>) -> Result<()> {
    let header = CacheRecord::Header {
        version: CACHE_VERSION,
        saved_at: Utc::now(),
    };
    let records = std::iter::once(header).chain(entries.iter().map(|(input, entry)| {
        CacheRecord::Entry {
            input: input.clone(),
            outputs: entry.outputs.clone(),
            dependents: entry.dependents.clone(),
        }
    }));
    write_jsonl_atomic_iter(path, records)?;
    debug!(path = %path.display(), inputs = entries.len(), "Saved dependency cache");
    Ok(())
}
