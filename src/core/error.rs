use rusqlite;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Persistence error: {0}")]
    PersistenceError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Request failed with status {0}")]
    RequestFailed(u16),
}

impl CatalogError {
    /// Status code the request surface reports for this failure.
    pub fn status(&self) -> u16 {
        match self {
            CatalogError::ValidationError(_) | CatalogError::JsonError(_) => 400,
            CatalogError::NotFound(_) => 404,
            CatalogError::RequestFailed(status) => *status,
            _ => 500,
        }
    }

    /// Stable machine-readable code for response envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            CatalogError::PersistenceError(_) => "persistence_error",
            CatalogError::IoError(_) => "io_error",
            CatalogError::JsonError(_) => "invalid_json",
            CatalogError::ConfigError(_) => "config_error",
            CatalogError::ValidationError(_) => "validation_error",
            CatalogError::NotFound(_) => "not_found",
            CatalogError::RequestFailed(_) => "request_failed",
        }
    }
}
