//! Headerless user-table dump.
//!
//! Column order: `id, email, first_name, last_name, full_name,
//! display_name, created_at, role[, auth_user_id]`. NULLs are written as
//! `\N` and missing dates as `0000-00-00 00:00:00`.

use super::{ensure_width, ExtractedRow, RowError};
use crate::ids::{LegacyId, SourceName};
use crate::normalize::{normalize_email, normalize_name, normalize_text, parse_date, parse_flag};
use crate::record::{LegacyRow, NormalizedDonorRecord};

/// Typed view of one user-table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LegacyUserRow<'a> {
    pub id: &'a str,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub full_name: &'a str,
    pub display_name: &'a str,
    pub created_at: &'a str,
    pub role: &'a str,
    pub auth_user_id: Option<&'a str>,
}

impl<'a> LegacyUserRow<'a> {
    pub const MIN_COLUMNS: usize = 8;

    pub fn decode(row: &'a LegacyRow) -> Result<Self, RowError> {
        ensure_width(row, Self::MIN_COLUMNS)?;
        Ok(Self {
            id: row.field(0),
            email: row.field(1),
            first_name: row.field(2),
            last_name: row.field(3),
            full_name: row.field(4),
            display_name: row.field(5),
            created_at: row.field(6),
            role: row.field(7),
            auth_user_id: row.fields.get(8),
        })
    }
}

#[derive(Debug, Clone)]
pub struct LegacyUsersAdapter {
    pub(crate) source: SourceName,
}

impl LegacyUsersAdapter {
    pub fn new(source: SourceName) -> Self {
        Self { source }
    }

    pub fn extract(&self, row: &LegacyRow) -> Result<ExtractedRow, RowError> {
        let typed = LegacyUserRow::decode(row)?;
        let legacy_id = normalize_text(typed.id)
            .and_then(LegacyId::try_new)
            .ok_or(RowError::MissingLegacyId {
                line_no: row.line_no,
            })?;

        let mut donor = NormalizedDonorRecord::new(legacy_id, self.source.clone());
        donor.email = normalize_email(typed.email);
        donor.first_name = normalize_name(typed.first_name);
        donor.last_name = normalize_name(typed.last_name);
        let joined = match (&donor.first_name, &donor.last_name) {
            (Some(f), Some(l)) => Some(format!("{} {}", f, l)),
            _ => None,
        };
        donor.full_name = normalize_name(typed.full_name).or(joined);
        donor.donor_name = normalize_text(typed.display_name);
        donor.created_at = parse_date(typed.created_at);
        donor.auth_user_id = typed.auth_user_id.and_then(normalize_text);
        donor.administrative = parse_flag(typed.role);

        Ok(ExtractedRow {
            donor,
            pledge: None,
        })
    }
}
