//! Store handle for the catalog's persisted state.
//!
//! A `Store` is built once by the entry point and handed to every handler. It owns the
//! resolved root directory and the configuration loaded from it; nothing in the crate
//! reaches for a process-wide registry.

use crate::core::config::{self, CatalogConfig};
use crate::core::error::CatalogError;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming the store root when `--root` is not given.
pub const ROOT_ENV_VAR: &str = "CATALOG_HOME";
/// Store root used when neither flag nor environment names one.
pub const DEFAULT_ROOT_DIR: &str = ".catalog";

#[derive(Debug, Clone)]
pub struct Store {
    /// Absolute or caller-relative path to the store root directory
    pub root: PathBuf,
    pub config: CatalogConfig,
}

impl Store {
    /// Open the store at `root`, creating the directory and loading `catalog.toml`.
    pub fn open(root: &Path) -> Result<Self, CatalogError> {
        fs::create_dir_all(root).map_err(CatalogError::IoError)?;
        let config = config::load_config(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            config,
        })
    }

    /// Build a store with an explicit configuration (no file lookup).
    pub fn with_config(root: &Path, config: CatalogConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            config,
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.root.join(&self.config.database.file)
    }

    pub fn audit_log_path(&self) -> Option<PathBuf> {
        self.config
            .audit
            .enabled
            .then(|| self.root.join(&self.config.audit.file))
    }
}

/// Resolve the store root: explicit flag, then `CATALOG_HOME`, then `./.catalog`.
pub fn resolve_root(flag: Option<PathBuf>) -> PathBuf {
    if let Some(root) = flag {
        return root;
    }
    match std::env::var(ROOT_ENV_VAR) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v),
        _ => PathBuf::from(DEFAULT_ROOT_DIR),
    }
}
