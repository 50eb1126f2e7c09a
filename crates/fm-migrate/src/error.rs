//! Error types for fm-migrate

use fm_core::CoreError;
use fm_db::DbError;
use thiserror::Error;

/// Pipeline errors. Anything surfacing as this type aborts the current job;
/// per-row problems are counted in summaries instead.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// G001: A named export is not in the blob store
    #[error("[G001] Export '{name}' not found at {path}")]
    MissingFile { name: String, path: String },

    /// G002: An export name escapes the blob root
    #[error("[G002] Invalid export name '{name}': must be a relative path inside the blob root")]
    InvalidObjectName { name: String },

    /// G003: Pledge reconciliation requested for a donor-only source
    #[error("[G003] Source '{source_name}' does not carry pledges or has no campaign_id")]
    NotAPledgeSource { source_name: String },

    /// G004: A pipeline needs staging data that has not been loaded
    #[error("[G004] Source '{source_name}' has not been staged (missing table {table}); run `fm stage` first")]
    NotStaged { source_name: String, table: String },

    /// G005: Account merge preconditions failed
    #[error("[G005] Merge rejected: {reason}")]
    MergeRejected { reason: String },

    /// G006: Source name not present in configuration
    #[error("[G006] Unknown source '{name}'")]
    UnknownSource { name: String },

    /// G007: IO error with file path context
    #[error("[G007] IO error on '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// G008: JSON read or write failed
    #[error("[G008] JSON error in '{path}': {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Db(#[from] DbError),
}

/// Result type alias for MigrateError
pub type MigrateResult<T> = Result<T, MigrateError>;

impl MigrateError {
    /// True when the canonical store itself failed, as opposed to input or
    /// precondition problems.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, MigrateError::Db(_))
    }
}
