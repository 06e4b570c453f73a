//! Store configuration loaded from `catalog.toml`.
//!
//! The file lives at the store root. A missing file means defaults; a present but
//! malformed file is an error.

use crate::core::error::CatalogError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "catalog.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CatalogConfig {
    /// Actor name recorded in audit events.
    pub actor: String,
    pub database: DatabaseConfig,
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file name, relative to the store root.
    pub file: String,
    pub busy_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
    /// JSONL file name, relative to the store root.
    pub file: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            actor: "catalog".to_string(),
            database: DatabaseConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            file: crate::core::schemas::CATALOG_DB_NAME.to_string(),
            busy_timeout_secs: 5,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file: "broker.events.jsonl".to_string(),
        }
    }
}

/// Load `catalog.toml` from the store root, falling back to defaults when absent.
pub fn load_config(root: &Path) -> Result<CatalogConfig, CatalogError> {
    let config_path = root.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        return Ok(CatalogConfig::default());
    }

    let content = fs::read_to_string(&config_path).map_err(CatalogError::IoError)?;
    let config: CatalogConfig = toml::from_str(&content).map_err(|e| {
        CatalogError::ConfigError(format!("{}: {}", config_path.display(), e))
    })?;

    if config.database.file.trim().is_empty() {
        return Err(CatalogError::ConfigError(
            "database.file must not be empty".to_string(),
        ));
    }
    Ok(config)
}
