//! Schema migration runner for the canonical store.
//!
//! Tracks applied migration versions in `schema_version` and runs any
//! unapplied migrations on each open.

use crate::ddl::MIGRATIONS;
use crate::error::{DbError, DbResult};
use crate::traits::Database;
use crate::value::SqlValue;

/// Ensure the `schema_version` table exists.
async fn ensure_version_table(db: &dyn Database) -> DbResult<()> {
    db.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
             version    BIGINT NOT NULL,
             applied_at TIMESTAMP NOT NULL DEFAULT now()
         );",
    )
    .await
    .map_err(|e| DbError::MigrationError(format!("failed to create schema_version table: {e}")))
}

/// Return the highest applied migration version, or 0 if none.
pub async fn current_version(db: &dyn Database) -> DbResult<i64> {
    let row = db
        .query_one(
            "SELECT CAST(COALESCE(MAX(version), 0) AS BIGINT) FROM schema_version",
            &[],
        )
        .await
        .map_err(|e| DbError::MigrationError(format!("failed to read schema version: {e}")))?;
    Ok(row
        .and_then(|r| r.first().and_then(SqlValue::as_i64))
        .unwrap_or(0))
}

/// Run all unapplied migrations against `db`.
///
/// Each migration runs as one batch; its version is recorded in
/// `schema_version` only after the batch succeeds. Returns the number of
/// migrations applied.
pub async fn run_migrations(db: &dyn Database) -> DbResult<usize> {
    ensure_version_table(db).await?;
    let current = current_version(db).await?;

    let mut applied = 0;
    for migration in MIGRATIONS {
        if migration.version <= current {
            continue;
        }
        log::debug!("Applying store migration v{:03}", migration.version);

        db.execute_batch(migration.sql).await.map_err(|e| {
            DbError::MigrationError(format!("migration v{:03} failed: {e}", migration.version))
        })?;

        db.execute_params(
            "INSERT INTO schema_version (version) VALUES (?)",
            &[SqlValue::Integer(migration.version)],
        )
        .await
        .map_err(|e| {
            DbError::MigrationError(format!(
                "failed to record migration v{:03}: {e}",
                migration.version
            ))
        })?;
        applied += 1;
    }
    Ok(applied)
}

#[cfg(test)]
#[path = "migration_test.rs"]
mod tests;
