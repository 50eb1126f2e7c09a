//! fm-db - Database layer for Fundmerge
//!
//! This crate provides the `Database` trait, its DuckDB implementation,
//! typed SQL values, and the embedded schema migrations for the canonical
//! store.

pub mod ddl;
pub mod duckdb;
pub mod error;
pub mod migration;
pub mod traits;
pub mod value;

pub use duckdb::DuckDbBackend;
pub use error::{DbError, DbResult};
pub use migration::run_migrations;
pub use traits::Database;
pub use value::SqlValue;
