//! Error types for fm-core

use thiserror::Error;

/// Core error type for Fundmerge
#[derive(Error, Debug)]
pub enum CoreError {
    /// C001: Configuration file not found
    #[error("[C001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// C002: Invalid configuration value
    #[error("[C002] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// C003: Failed to parse configuration file
    #[error("[C003] Config parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// C004: IO error with file path context
    #[error("[C004] Failed to read '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// C005: A header-keyed export lacks a column the adapter requires
    #[error("[C005] Source '{source_name}' has no {column} column (headers: {headers})")]
    MissingColumn {
        source_name: String,
        column: &'static str,
        headers: String,
    },

    /// C006: Header-keyed source file has no header row
    #[error("[C006] Source '{source_name}' is empty: expected a header row")]
    MissingHeader { source_name: String },
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
