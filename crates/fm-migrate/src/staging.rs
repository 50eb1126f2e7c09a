//! Staging loader.
//!
//! Each source is loaded into its own `staging_<source>_donors` table (and
//! `staging_<source>_pledges` for sources that carry pledges). Tables are
//! truncated before every load so staging is always a snapshot of the
//! current file. Rows are extracted in file order and flushed in batches.

use crate::blob::BlobStore;
use crate::error::{MigrateError, MigrateResult};
use fm_core::normalize::{format_timestamp, parse_date};
use fm_core::{
    read_rows, ExtractedRow, LegacyId, LegacyRow, NormalizedDonorRecord, SourceAdapter,
    SourceConfig, SourceName,
};
use fm_db::value::{bool_or_false, optional_string, required_string};
use fm_db::{Database, SqlValue};
use serde::Serialize;
use std::fs::File;

const DONOR_COLUMNS: &[&str] = &[
    "line_no",
    "legacy_id",
    "email",
    "first_name",
    "last_name",
    "full_name",
    "donor_name",
    "created_at",
    "auth_user_id",
    "administrative",
    "raw_line",
];

const PLEDGE_COLUMNS: &[&str] = &[
    "line_no",
    "email",
    "amount_cents",
    "pledge_date",
    "reward_name",
    "raw_line",
];

fn donor_table_ddl(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
            line_no        BIGINT NOT NULL,
            legacy_id      VARCHAR NOT NULL,
            email          VARCHAR,
            first_name     VARCHAR,
            last_name      VARCHAR,
            full_name      VARCHAR,
            donor_name     VARCHAR,
            created_at     VARCHAR,
            auth_user_id   VARCHAR,
            administrative BOOLEAN NOT NULL,
            raw_line       VARCHAR NOT NULL
        )",
        table
    )
}

fn pledge_table_ddl(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
            line_no      BIGINT NOT NULL,
            email        VARCHAR,
            amount_cents BIGINT NOT NULL,
            pledge_date  VARCHAR,
            reward_name  VARCHAR,
            raw_line     VARCHAR NOT NULL
        )",
        table
    )
}

/// Tally of one source load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageSummary {
    pub source: String,
    /// Data rows in the file, header excluded
    pub rows_read: usize,
    pub donors_staged: usize,
    pub pledges_staged: usize,
    /// Rows that could not be read or extracted
    pub rows_skipped: usize,
    /// Rows whose staging insert failed
    pub write_failures: usize,
}

/// Rows waiting to be flushed to one staging table.
struct Batch<'t> {
    table: &'t str,
    columns: &'static [&'static str],
    rows: Vec<Vec<SqlValue>>,
    written: usize,
    failed: usize,
}

impl<'t> Batch<'t> {
    fn new(table: &'t str, columns: &'static [&'static str], capacity: usize) -> Self {
        Self {
            table,
            columns,
            rows: Vec::with_capacity(capacity),
            written: 0,
            failed: 0,
        }
    }

    /// Insert every buffered row. A failed batch is retried row by row.
    async fn flush(&mut self, db: &dyn Database) {
        if self.rows.is_empty() {
            return;
        }
        let rows = std::mem::take(&mut self.rows);
        match db.insert_rows(self.table, self.columns, &rows).await {
            Ok(n) => self.written += n,
            Err(e) => {
                log::warn!(
                    "Batch insert of {} rows into {} failed ({}); retrying row by row",
                    rows.len(),
                    self.table,
                    e
                );
                for row in &rows {
                    match db
                        .insert_rows(self.table, self.columns, std::slice::from_ref(row))
                        .await
                    {
                        Ok(n) => self.written += n,
                        Err(e) => {
                            log::error!("Failed to stage row into {}: {}", self.table, e);
                            self.failed += 1;
                        }
                    }
                }
            }
        }
    }
}

fn donor_values(line_no: u64, donor: &NormalizedDonorRecord, raw_line: &str) -> Vec<SqlValue> {
    vec![
        SqlValue::Integer(line_no as i64),
        SqlValue::from(donor.legacy_id.as_str()),
        SqlValue::from(donor.email.as_deref()),
        SqlValue::from(donor.first_name.as_deref()),
        SqlValue::from(donor.last_name.as_deref()),
        SqlValue::from(donor.full_name.as_deref()),
        SqlValue::from(donor.donor_name.as_deref()),
        SqlValue::from(donor.created_at.as_ref().map(format_timestamp)),
        SqlValue::from(donor.auth_user_id.as_deref()),
        SqlValue::Bool(donor.administrative),
        SqlValue::from(raw_line),
    ]
}

pub struct StagingLoader<'a> {
    db: &'a dyn Database,
    blobs: &'a dyn BlobStore,
    batch_size: usize,
}

impl<'a> StagingLoader<'a> {
    pub fn new(db: &'a dyn Database, blobs: &'a dyn BlobStore, batch_size: usize) -> Self {
        Self {
            db,
            blobs,
            batch_size: batch_size.max(1),
        }
    }

    /// Replace the staging tables of `source` with the current file.
    ///
    /// A missing file, a header-keyed file without a usable header, or a
    /// failure to create or truncate the tables aborts the load. Bad rows
    /// are skipped and counted.
    pub async fn stage(&self, source: &SourceConfig) -> MigrateResult<StageSummary> {
        let path = self.blobs.fetch(&source.file)?;
        let io_error = |e: std::io::Error| MigrateError::Io {
            path: path.display().to_string(),
            source: e,
        };
        let file = File::open(&path).map_err(io_error)?;
        let mut rows = read_rows(file).map_err(io_error)?;
        log::info!(
            "Staging '{}' from {} (delimiter {:?})",
            source.name,
            path.display(),
            rows.delimiter() as char
        );
        let mut summary = StageSummary {
            source: source.name.to_string(),
            ..Default::default()
        };

        let mut header: Option<LegacyRow> = None;
        if source.format.has_header() {
            for row in rows.by_ref() {
                match row {
                    Ok(row) => {
                        header = Some(row);
                        break;
                    }
                    Err(e) => {
                        log::warn!("Skipping {} row before header: {}", source.name, e);
                        summary.rows_skipped += 1;
                    }
                }
            }
        }
        let adapter = SourceAdapter::for_source(source, header.as_ref())?;

        let donor_table = source.name.donor_staging_table();
        let pledge_table = source.name.pledge_staging_table();
        self.reset_table(&donor_table, &donor_table_ddl(&donor_table))
            .await?;
        if source.format.yields_pledges() {
            self.reset_table(&pledge_table, &pledge_table_ddl(&pledge_table))
                .await?;
        }

        let mut donors = Batch::new(&donor_table, DONOR_COLUMNS, self.batch_size);
        let mut pledges = Batch::new(&pledge_table, PLEDGE_COLUMNS, self.batch_size);

        for row in rows.by_ref() {
            summary.rows_read += 1;
            let extracted = row.and_then(|row| adapter.extract(&row).map(|x| (row, x)));
            let (row, ExtractedRow { donor, pledge }) = match extracted {
                Ok(ok) => ok,
                Err(e) => {
                    log::warn!("Skipping {} row: {}", source.name, e);
                    summary.rows_skipped += 1;
                    continue;
                }
            };

            donors
                .rows
                .push(donor_values(row.line_no, &donor, &row.raw_line));
            if let Some(p) = pledge {
                pledges.rows.push(vec![
                    SqlValue::Integer(p.line_no as i64),
                    SqlValue::from(p.email.as_deref()),
                    SqlValue::Integer(p.amount_cents),
                    SqlValue::from(p.pledge_date.as_ref().map(format_timestamp)),
                    SqlValue::from(p.reward_name.as_deref()),
                    SqlValue::from(p.raw_line),
                ]);
            }

            if donors.rows.len() >= self.batch_size {
                donors.flush(self.db).await;
            }
            if pledges.rows.len() >= self.batch_size {
                pledges.flush(self.db).await;
            }
        }
        donors.flush(self.db).await;
        pledges.flush(self.db).await;
        let unreadable = rows.finish().map_err(io_error)?;
        log::debug!("{} unreadable rows in '{}'", unreadable, source.file);

        summary.donors_staged = donors.written;
        summary.pledges_staged = pledges.written;
        summary.write_failures = donors.failed + pledges.failed;

        log::info!(
            "Staged '{}': {} rows read, {} donors, {} pledges, {} skipped, {} write failures",
            summary.source,
            summary.rows_read,
            summary.donors_staged,
            summary.pledges_staged,
            summary.rows_skipped,
            summary.write_failures
        );
        Ok(summary)
    }

    async fn reset_table(&self, table: &str, ddl: &str) -> MigrateResult<()> {
        self.db.execute(ddl).await?;
        let cleared = self.db.execute(&format!("DELETE FROM {}", table)).await?;
        log::debug!("Cleared {} previous rows from {}", cleared, table);
        Ok(())
    }
}

/// Fail with [`MigrateError::NotStaged`] unless `table` exists.
pub(crate) async fn ensure_staged(
    db: &dyn Database,
    source: &SourceName,
    table: &str,
) -> MigrateResult<()> {
    if db.relation_exists(table).await? {
        Ok(())
    } else {
        Err(MigrateError::NotStaged {
            source_name: source.to_string(),
            table: table.to_string(),
        })
    }
}

/// Staged donor records of `source`, in file order.
pub async fn load_staged_donors(
    db: &dyn Database,
    source: &SourceName,
) -> MigrateResult<Vec<NormalizedDonorRecord>> {
    let table = source.donor_staging_table();
    ensure_staged(db, source, &table).await?;

    let sql = format!(
        "SELECT legacy_id, email, first_name, last_name, full_name, donor_name, \
         created_at, auth_user_id, administrative FROM {} ORDER BY line_no",
        table
    );
    let rows = db.query_rows(&sql, &[]).await?;
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(legacy_id) = LegacyId::try_new(required_string(&row, 0, "legacy_id")?) else {
            log::warn!("Ignoring staged {} row with an empty legacy id", source);
            continue;
        };
        let mut record = NormalizedDonorRecord::new(legacy_id, source.clone());
        record.email = optional_string(&row, 1);
        record.first_name = optional_string(&row, 2);
        record.last_name = optional_string(&row, 3);
        record.full_name = optional_string(&row, 4);
        record.donor_name = optional_string(&row, 5);
        record.created_at = optional_string(&row, 6).and_then(|s| parse_date(&s));
        record.auth_user_id = optional_string(&row, 7);
        record.administrative = bool_or_false(&row, 8);
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
#[path = "staging_test.rs"]
mod tests;
