//! Audit and conflict logging.
//!
//! Every pipeline decision becomes a [`MigrationLogEntry`] written to the
//! `migration_log` table and mirrored as one line of `migration.log`.
//! Conflicts go to `conflict_log` and are also collected in memory so the
//! run can end with a JSON snapshot. Audit write failures are counted and
//! logged but never abort a run.

use crate::error::{MigrateError, MigrateResult};
use fm_core::normalize::format_timestamp;
use fm_core::{ConflictLogEntry, LogStatus, MigrationLogEntry};
use fm_db::{Database, SqlValue};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Name of the human-readable trail inside the log directory.
pub const TRAIL_FILE: &str = "migration.log";

/// Short random id grouping every audit row of one run.
pub fn new_run_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

pub struct AuditLog {
    db: Arc<dyn Database>,
    run_id: String,
    log_dir: Option<PathBuf>,
    trail: Option<File>,
    conflicts: Vec<ConflictLogEntry>,
    write_failures: usize,
}

impl AuditLog {
    /// Audit log writing to the store and to `<log_dir>/migration.log`.
    ///
    /// The directory is created if needed; failing to open the trail is a
    /// fatal precondition.
    pub fn open(
        db: Arc<dyn Database>,
        run_id: impl Into<String>,
        log_dir: &Path,
    ) -> MigrateResult<Self> {
        std::fs::create_dir_all(log_dir).map_err(|e| MigrateError::Io {
            path: log_dir.display().to_string(),
            source: e,
        })?;
        let trail_path = log_dir.join(TRAIL_FILE);
        let trail = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&trail_path)
            .map_err(|e| MigrateError::Io {
                path: trail_path.display().to_string(),
                source: e,
            })?;

        Ok(Self {
            db,
            run_id: run_id.into(),
            log_dir: Some(log_dir.to_path_buf()),
            trail: Some(trail),
            conflicts: Vec::new(),
            write_failures: 0,
        })
    }

    /// Audit log that only writes to the store.
    pub fn store_only(db: Arc<dyn Database>, run_id: impl Into<String>) -> Self {
        Self {
            db,
            run_id: run_id.into(),
            log_dir: None,
            trail: None,
            conflicts: Vec::new(),
            write_failures: 0,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Conflicts recorded so far in this run.
    pub fn conflicts(&self) -> &[ConflictLogEntry] {
        &self.conflicts
    }

    /// Audit rows or lines that could not be written.
    pub fn write_failures(&self) -> usize {
        self.write_failures
    }

    /// Record one pipeline decision.
    pub async fn record(&mut self, entry: MigrationLogEntry) {
        match entry.status {
            LogStatus::Error => log::error!("{}", entry.message),
            LogStatus::Skipped | LogStatus::Conflict => log::warn!(
                "{} ({})",
                entry.message,
                entry.legacy_id.as_deref().unwrap_or("-")
            ),
            LogStatus::Info => log::info!("{}", entry.message),
            _ => log::debug!("{}", entry.to_log_line()),
        }

        let params = [
            SqlValue::from(self.run_id.as_str()),
            SqlValue::from(entry.legacy_id.as_deref()),
            SqlValue::from(entry.email.as_deref()),
            SqlValue::from(entry.status.as_str()),
            SqlValue::from(entry.message.as_str()),
            SqlValue::from(entry.canonical_id),
            SqlValue::from(format_timestamp(&entry.timestamp.naive_utc())),
        ];
        if let Err(e) = self
            .db
            .execute_params(
                "INSERT INTO migration_log (run_id, legacy_id, email, status, message, canonical_id, logged_at) \
                 VALUES (?, ?, ?, ?, ?, ?, CAST(? AS TIMESTAMP))",
                &params,
            )
            .await
        {
            log::error!("Failed to write migration_log row: {}", e);
            self.write_failures += 1;
        }

        if let Some(trail) = self.trail.as_mut() {
            if let Err(e) = writeln!(trail, "{}", entry.to_log_line()) {
                log::error!("Failed to append to {}: {}", TRAIL_FILE, e);
                self.write_failures += 1;
            }
        }
    }

    /// Record one identity collision.
    pub async fn conflict(&mut self, entry: ConflictLogEntry) {
        log::info!(
            "Conflict {} for {} ({}): {} - {}",
            entry.conflict_type,
            entry.email.as_deref().unwrap_or("-"),
            entry.legacy_id,
            entry.resolution,
            entry.details
        );

        let params = [
            SqlValue::from(self.run_id.as_str()),
            SqlValue::from(entry.legacy_id.as_str()),
            SqlValue::from(entry.email.as_deref()),
            SqlValue::from(entry.conflict_type.as_str()),
            SqlValue::from(entry.resolution.as_str()),
            SqlValue::from(entry.details.as_str()),
            SqlValue::from(entry.canonical_id),
        ];
        if let Err(e) = self
            .db
            .execute_params(
                "INSERT INTO conflict_log (run_id, legacy_id, email, conflict_type, resolution, details, canonical_id) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                &params,
            )
            .await
        {
            log::error!("Failed to write conflict_log row: {}", e);
            self.write_failures += 1;
        }

        self.conflicts.push(entry);
    }

    /// Write `conflicts-<run_id>.json` with every conflict of this run.
    ///
    /// Returns `None` when there is no log directory or nothing to write.
    pub fn write_conflict_snapshot(&self) -> MigrateResult<Option<PathBuf>> {
        let Some(dir) = &self.log_dir else {
            return Ok(None);
        };
        if self.conflicts.is_empty() {
            return Ok(None);
        }

        let path = dir.join(format!("conflicts-{}.json", self.run_id));
        let json =
            serde_json::to_string_pretty(&self.conflicts).map_err(|e| MigrateError::Json {
                path: path.display().to_string(),
                source: e,
            })?;
        std::fs::write(&path, json).map_err(|e| MigrateError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(Some(path))
    }
}

#[cfg(test)]
#[path = "audit_test.rs"]
mod tests;
