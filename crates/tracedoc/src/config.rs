//! Project configuration.
//!
//! Stored as YAML in `.tracedoc/config.yaml` at the project root:
//!
//! ```yaml
//! project-root: .
//! cache-dir: .tracedoc/cache
//! engine-paths:
//!   - templates
//! ```
//!
//! Relative paths are resolved against the directory containing
//! `.tracedoc/`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// Name of the tracedoc directory
pub const TRACEDOC_DIR_NAME: &str = ".tracedoc";

/// Name of the configuration file
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Default cache directory, relative to the project root
pub const DEFAULT_CACHE_DIR: &str = ".tracedoc/cache";

/// Name of the dependency ledger inside the cache directory
pub const LEDGER_FILE_NAME: &str = "dependencies.jsonl";

/// Maximum directory depth to traverse when searching for the project root
pub const MAX_TRAVERSAL_DEPTH: usize = 256;

/// Settings of one tracedoc project
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ProjectConfig {
    /// Root of the document tree
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,

    /// Where build caches live
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Files or directories whose changes invalidate every output
    #[serde(default)]
    pub engine_paths: Vec<PathBuf>,

    /// Directory containing `.tracedoc/`
    #[serde(skip)]
    base_dir: PathBuf,

    /// File this configuration was loaded from
    #[serde(skip)]
    config_file: Option<PathBuf>,
}

fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_DIR)
}

impl ProjectConfig {
    /// Defaults for a project rooted at `root`.
    #[must_use]
    pub fn default_for(root: &Path) -> Self {
        Self {
            project_root: default_project_root(),
            cache_dir: default_cache_dir(),
            engine_paths: Vec::new(),
            base_dir: root.to_path_buf(),
            config_file: None,
        }
    }

    /// Location of the configuration file for a project rooted at `root`.
    #[must_use]
    pub fn config_path(root: &Path) -> PathBuf {
        root.join(TRACEDOC_DIR_NAME).join(CONFIG_FILE_NAME)
    }

    /// Load configuration from a file
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if the file cannot be read, [`Error::Config`] if it is
    /// not valid YAML or names an empty cache directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut config: Self =
            serde_yaml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;

        if config.cache_dir.as_os_str().is_empty() {
            return Err(Error::Config(format!(
                "cache-dir must not be empty in {}",
                path.display()
            )));
        }

        // .tracedoc/config.yaml -> project directory
        config.base_dir = path
            .parent()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_default();
        config.config_file = Some(path.to_path_buf());
        debug!(path = %path.display(), "Loaded project configuration");
        Ok(config)
    }

    /// Load the configuration of the project rooted at `root`, falling back
    /// to defaults if it has none.
    ///
    /// # Errors
    ///
    /// As [`load`](Self::load), for a configuration file that exists.
    pub fn load_or_default(root: &Path) -> Result<Self> {
        let path = Self::config_path(root);
        if path.is_file() {
            Self::load(&path)
        } else {
            debug!(root = %root.display(), "No project configuration, using defaults");
            Ok(Self::default_for(root))
        }
    }

    /// Save configuration to a file, creating its directory.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if serialization fails, [`Error::Io`] if writing
    /// fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::Config(format!("YAML error: {e}")))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Resolved project root.
    #[must_use]
    pub fn project_root(&self) -> PathBuf {
        self.resolve(&self.project_root)
    }

    /// Resolved cache directory.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.resolve(&self.cache_dir)
    }

    /// Where the dependency ledger is persisted.
    #[must_use]
    pub fn ledger_path(&self) -> PathBuf {
        self.cache_dir().join(LEDGER_FILE_NAME)
    }

    /// Newest modification time among the engine paths and the
    /// configuration file itself.
    ///
    /// Directories are searched recursively. Unreadable entries are
    /// ignored; `None` means nothing could be inspected.
    #[must_use]
    pub fn engine_last_update(&self) -> Option<SystemTime> {
        self.engine_paths
            .iter()
            .map(|path| self.resolve(path))
            .chain(self.config_file.clone())
            .filter_map(|path| newest_mtime(&path))
            .max()
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

fn newest_mtime(path: &Path) -> Option<SystemTime> {
    let metadata = fs::metadata(path).ok()?;
    let own = metadata.modified().ok();
    if !metadata.is_dir() {
        return own;
    }
    let Ok(entries) = fs::read_dir(path) else {
        return own;
    };
    entries
        .filter_map(std::result::Result::ok)
        .filter_map(|entry| newest_mtime(&entry.path()))
        .chain(own)
        .max()
}

/// Find the project root by searching up the directory tree for a
/// `.tracedoc/` directory.
#[must_use]
pub fn find_project_root(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();
    let mut depth = 0;

    loop {
        if current.join(TRACEDOC_DIR_NAME).is_dir() {
            return Some(current);
        }

        depth += 1;
        if depth > MAX_TRAVERSAL_DEPTH || !current.pop() {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn defaults_resolve_against_root() {
        let config = ProjectConfig::default_for(Path::new("/work/project"));
        assert_eq!(
            config.ledger_path(),
            PathBuf::from("/work/project/.tracedoc/cache/dependencies.jsonl")
        );
        assert_eq!(config.project_root(), PathBuf::from("/work/project/."));
        assert_eq!(config.engine_last_update(), None);
    }

    #[test]
    fn save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = ProjectConfig::config_path(dir.path());

        let mut original = ProjectConfig::default_for(dir.path());
        original.cache_dir = PathBuf::from("build/cache");
        original.save(&path).unwrap();

        let loaded = ProjectConfig::load(&path).unwrap();
        assert_eq!(loaded.cache_dir, PathBuf::from("build/cache"));
        assert_eq!(loaded.ledger_path(), dir.path().join("build/cache/dependencies.jsonl"));
    }

    #[test]
    fn yaml_uses_kebab_case_keys() {
        let dir = TempDir::new().unwrap();
        let path = ProjectConfig::config_path(dir.path());
        ProjectConfig::default_for(dir.path()).save(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("cache-dir:"));
        assert!(content.contains("engine-paths:"));
        assert!(!content.contains("base_dir"));
    }

    #[test]
    fn invalid_yaml_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let path = ProjectConfig::config_path(dir.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "cache-dir: [unclosed").unwrap();

        assert!(matches!(ProjectConfig::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        assert!(ProjectConfig::load(&ProjectConfig::config_path(dir.path())).is_err());

        let config = ProjectConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(config.cache_dir, PathBuf::from(DEFAULT_CACHE_DIR));
    }

    #[test]
    fn engine_update_is_newest_file_below_engine_paths() {
        let dir = TempDir::new().unwrap();
        let templates = dir.path().join("templates/nested");
        fs::create_dir_all(&templates).unwrap();
        let newest = SystemTime::now() + Duration::from_secs(3600);
        File::create(templates.join("page.html"))
            .unwrap()
            .set_modified(newest)
            .unwrap();

        let mut config = ProjectConfig::default_for(dir.path());
        config.engine_paths.push(PathBuf::from("templates"));

        assert_eq!(config.engine_last_update(), Some(newest));
    }

    #[test]
    fn project_root_is_found_from_a_subdirectory() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(TRACEDOC_DIR_NAME)).unwrap();
        let nested = dir.path().join("docs/chapter");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_project_root(&nested), Some(dir.path().to_path_buf()));
    }
}
