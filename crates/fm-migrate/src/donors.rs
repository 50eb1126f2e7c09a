//! Reads and writes against the canonical `donors` table.

use crate::error::MigrateResult;
use fm_core::normalize::{format_timestamp, parse_date};
use fm_core::{CanonicalDonor, NormalizedDonorRecord};
use fm_db::value::{bool_or_false, optional_string, required_i64, required_string};
use fm_db::{Database, DbError, SqlValue};

const DONOR_COLUMNS: &str = "id, email, first_name, last_name, full_name, donor_name, \
     CAST(created_at AS VARCHAR), legacy_id, auth_user_id, deleted, notes";

fn donor_from_row(row: &[SqlValue]) -> MigrateResult<CanonicalDonor> {
    Ok(CanonicalDonor {
        id: required_i64(row, 0, "donors.id")?,
        email: required_string(row, 1, "donors.email")?,
        first_name: optional_string(row, 2),
        last_name: optional_string(row, 3),
        full_name: optional_string(row, 4),
        donor_name: optional_string(row, 5),
        created_at: optional_string(row, 6).and_then(|s| parse_date(&s)),
        legacy_id: optional_string(row, 7),
        auth_user_id: optional_string(row, 8),
        deleted: bool_or_false(row, 9),
        notes: optional_string(row, 10),
    })
}

/// Every active donor, lowest id first.
pub async fn load_active_donors(db: &dyn Database) -> MigrateResult<Vec<CanonicalDonor>> {
    let sql = format!(
        "SELECT {} FROM donors WHERE NOT deleted ORDER BY id",
        DONOR_COLUMNS
    );
    db.query_rows(&sql, &[])
        .await?
        .iter()
        .map(|row| donor_from_row(row))
        .collect()
}

/// One donor by id, deleted or not.
pub async fn get_donor(db: &dyn Database, id: i64) -> MigrateResult<Option<CanonicalDonor>> {
    let sql = format!("SELECT {} FROM donors WHERE id = ?", DONOR_COLUMNS);
    match db.query_one(&sql, &[SqlValue::Integer(id)]).await? {
        Some(row) => Ok(Some(donor_from_row(&row)?)),
        None => Ok(None),
    }
}

/// Insert a donor built from `record` under `email` and return it as stored.
pub async fn insert_donor(
    db: &dyn Database,
    record: &NormalizedDonorRecord,
    email: &str,
    auth_user_id: Option<&str>,
    notes: &str,
) -> MigrateResult<CanonicalDonor> {
    let params = [
        SqlValue::from(email),
        SqlValue::from(record.first_name.as_deref()),
        SqlValue::from(record.last_name.as_deref()),
        SqlValue::from(record.full_name.as_deref()),
        SqlValue::from(record.donor_name.as_deref()),
        SqlValue::from(record.created_at.as_ref().map(format_timestamp)),
        SqlValue::from(record.legacy_id.as_str()),
        SqlValue::from(auth_user_id),
        SqlValue::from(notes),
    ];
    let row = db
        .query_one(
            "INSERT INTO donors (email, first_name, last_name, full_name, donor_name, created_at, legacy_id, auth_user_id, notes) \
             VALUES (?, ?, ?, ?, ?, CAST(? AS TIMESTAMP), ?, ?, ?) RETURNING id",
            &params,
        )
        .await?
        .ok_or_else(|| DbError::ExecutionError("INSERT INTO donors returned no id".to_string()))?;

    Ok(CanonicalDonor {
        id: required_i64(&row, 0, "donors.id")?,
        email: email.to_string(),
        first_name: record.first_name.clone(),
        last_name: record.last_name.clone(),
        full_name: record.full_name.clone(),
        donor_name: record.donor_name.clone(),
        created_at: record.created_at,
        legacy_id: Some(record.legacy_id.to_string()),
        auth_user_id: auth_user_id.map(str::to_string),
        deleted: false,
        notes: Some(notes.to_string()),
    })
}

/// Write back every mergeable field and the notes of `donor`.
pub async fn update_donor(db: &dyn Database, donor: &CanonicalDonor) -> MigrateResult<()> {
    let params = [
        SqlValue::from(donor.first_name.as_deref()),
        SqlValue::from(donor.last_name.as_deref()),
        SqlValue::from(donor.full_name.as_deref()),
        SqlValue::from(donor.donor_name.as_deref()),
        SqlValue::from(donor.created_at.as_ref().map(format_timestamp)),
        SqlValue::from(donor.legacy_id.as_deref()),
        SqlValue::from(donor.auth_user_id.as_deref()),
        SqlValue::from(donor.notes.as_deref()),
        SqlValue::Integer(donor.id),
    ];
    db.execute_params(
        "UPDATE donors SET first_name = ?, last_name = ?, full_name = ?, donor_name = ?, \
         created_at = CAST(? AS TIMESTAMP), legacy_id = ?, auth_user_id = ?, notes = ?, updated_at = now() \
         WHERE id = ?",
        &params,
    )
    .await?;
    Ok(())
}

/// Append a line to a free-text notes field.
pub fn append_note(notes: Option<&str>, line: &str) -> String {
    match notes {
        Some(existing) if !existing.is_empty() => format!("{}\n{}", existing, line),
        _ => line.to_string(),
    }
}
