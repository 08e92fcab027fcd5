//! Atomic write operations for JSONL files.
//!
//! Data is written to a sibling temporary file with a `.tmp` suffix,
//! flushed and synced, then renamed over the target. Renames within one
//! filesystem are atomic on POSIX, so a crash mid-write leaves the previous
//! file intact.
//!
//! # Examples
//!
//! ```no_run
//! use tracedoc_jsonl::write_jsonl_atomic;
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Record {
//!     id: u32,
//! }
//!
//! write_jsonl_atomic("data.jsonl", &[Record { id: 1 }, Record { id: 2 }])?;
//! # Ok::<(), tracedoc_jsonl::Error>(())
//! ```

use crate::{JsonlWriter, Result};
use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Atomically writes a slice of values to a JSONL file.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be created, a value fails
/// to serialize, or the final rename fails. The original file is left
/// unchanged on failure.
pub fn write_jsonl_atomic<T, P>(path: P, values: &[T]) -> Result<()>
where
    T: Serialize,
    P: AsRef<Path>,
{
    write_jsonl_atomic_iter(path, values.iter())
}

/// Atomically writes an iterator of values to a JSONL file.
///
/// Missing parent directories are created.
///
/// # Errors
///
/// See [`write_jsonl_atomic`].
pub fn write_jsonl_atomic_iter<T, I, P>(path: P, values: I) -> Result<()>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let temp_path = make_temp_path(path);

    if let Err(e) = write_to_temp_file(&temp_path, values) {
        if let Err(cleanup) = fs::remove_file(&temp_path) {
            warn!(
                path = %temp_path.display(),
                error = %cleanup,
                "Failed to remove temporary file"
            );
        }
        return Err(e);
    }

    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Appends `.tmp` to the file name: `a.jsonl` becomes `a.jsonl.tmp`.
fn make_temp_path(path: &Path) -> PathBuf {
    let mut temp_path = path.to_path_buf();
    let new_extension = match path.extension() {
        Some(ext) => {
            let mut new_ext = ext.to_os_string();
            new_ext.push(".tmp");
            new_ext
        }
        None => std::ffi::OsString::from("tmp"),
    };
    temp_path.set_extension(new_extension);
    temp_path
}

fn write_to_temp_file<T, I>(temp_path: &Path, values: I) -> Result<()>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let file = File::create(temp_path)?;
    let mut writer = JsonlWriter::new(file);
    writer.write_all(values)?;
    let file = writer.into_inner()?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde::Serializer;
    use tempfile::TempDir;

    #[rstest]
    #[case("/path/to/file.jsonl", "/path/to/file.jsonl.tmp")]
    #[case("/path/to/file", "/path/to/file.tmp")]
    #[case("/path/to/file.tar.gz", "/path/to/file.tar.gz.tmp")]
    #[case("data.jsonl", "data.jsonl.tmp")]
    fn make_temp_path_appends_suffix(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(make_temp_path(Path::new(input)), Path::new(expected));
    }

    #[test]
    fn atomic_write_replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("cache.jsonl");
        fs::write(&target, "old content\n").unwrap();

        write_jsonl_atomic(&target, &[42_u32]).unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "42\n");
        assert!(!dir.path().join("cache.jsonl.tmp").exists());
    }

    #[test]
    fn atomic_write_creates_missing_directories() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("nested").join("deeper").join("out.jsonl");

        write_jsonl_atomic::<u32, _>(&target, &[]).unwrap();

        assert!(target.exists());
        assert_eq!(fs::metadata(&target).unwrap().len(), 0);
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("refusing to serialize"))
        }
    }

    #[test]
    fn failed_write_keeps_original_and_removes_temp() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("keep.jsonl");
        fs::write(&target, "original\n").unwrap();

        let result = write_jsonl_atomic(&target, &[Unserializable]);

        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&target).unwrap(), "original\n");
        assert!(!dir.path().join("keep.jsonl.tmp").exists());
    }
}
