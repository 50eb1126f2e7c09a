//! fm-core - Core library for Fundmerge
//!
//! This crate provides the record types, field normalizers, delimited
//! readers, source adapters, and configuration parsing shared by the
//! migration pipeline and the CLI.

pub mod adapter;
pub mod config;
pub mod delimited;
pub mod error;
pub mod ids;
pub mod normalize;
pub mod record;

pub use adapter::{ExtractedRow, HeaderKeyedSchema, RowError, SourceAdapter};
pub use config::{
    AdministrativeConfig, Config, DatabaseConfig, SourceConfig, SourceFormat, WatchListPolicy,
};
pub use delimited::{read_rows, sniff_delimiter, DelimitedRows};
pub use error::{CoreError, CoreResult};
pub use ids::{LegacyId, SourceName};
pub use record::{
    CanonicalDonor, ConflictLogEntry, ConflictResolution, ConflictType, LegacyRow, LogStatus,
    MergeRecord, MigrationLogEntry, NormalizedDonorRecord, StagingPledgeRecord,
};
