//! Source adapters: one per legacy export layout.
//!
//! Each adapter decodes a [`LegacyRow`] into its own typed row struct and
//! then into canonical records. Adding a legacy source means adding one
//! variant here and one module beside this file.

mod header_keyed;
mod legacy_users;
mod positional_pledges;

pub use header_keyed::{HeaderKeyedAdapter, HeaderKeyedSchema};
pub use legacy_users::LegacyUsersAdapter;
pub use positional_pledges::PositionalPledgesAdapter;

use crate::config::{SourceConfig, SourceFormat};
use crate::error::CoreResult;
use crate::ids::SourceName;
use crate::normalize::normalize_name;
use crate::record::{LegacyRow, NormalizedDonorRecord, StagingPledgeRecord};
use thiserror::Error;

/// Why a single row could not be extracted. Rows failing this way are
/// skipped and counted; they never abort a load.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    #[error("line {line_no}: expected at least {expected} columns, found {found}")]
    TooFewColumns {
        line_no: u64,
        expected: usize,
        found: usize,
    },

    #[error("line {line_no}: missing legacy id")]
    MissingLegacyId { line_no: u64 },

    #[error("line {line_no}: unreadable row: {message}")]
    Unreadable { line_no: u64, message: String },
}

/// What one legacy row contributes to staging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedRow {
    pub donor: NormalizedDonorRecord,
    pub pledge: Option<StagingPledgeRecord>,
}

/// The closed set of legacy layouts.
#[derive(Debug, Clone)]
pub enum SourceAdapter {
    LegacyUsers(LegacyUsersAdapter),
    HeaderKeyed(HeaderKeyedAdapter),
    PositionalPledges(PositionalPledgesAdapter),
}

impl SourceAdapter {
    /// Build the adapter for a source.
    ///
    /// `header` is the file's first row and is required for header-keyed
    /// layouts; positional layouts ignore it.
    pub fn for_source(source: &SourceConfig, header: Option<&LegacyRow>) -> CoreResult<Self> {
        let name = source.name.clone();
        Ok(match source.format {
            SourceFormat::LegacyUsers => SourceAdapter::LegacyUsers(LegacyUsersAdapter::new(name)),
            SourceFormat::HeaderKeyed => {
                SourceAdapter::HeaderKeyed(HeaderKeyedAdapter::from_header(name, header)?)
            }
            SourceFormat::PositionalPledges => {
                SourceAdapter::PositionalPledges(PositionalPledgesAdapter::new(name))
            }
        })
    }

    /// Source this adapter extracts for.
    pub fn source(&self) -> &SourceName {
        match self {
            SourceAdapter::LegacyUsers(a) => &a.source,
            SourceAdapter::HeaderKeyed(a) => &a.source,
            SourceAdapter::PositionalPledges(a) => &a.source,
        }
    }

    /// Extract canonical records from one row.
    pub fn extract(&self, row: &LegacyRow) -> Result<ExtractedRow, RowError> {
        match self {
            SourceAdapter::LegacyUsers(a) => a.extract(row),
            SourceAdapter::HeaderKeyed(a) => a.extract(row),
            SourceAdapter::PositionalPledges(a) => a.extract(row),
        }
    }
}

/// Split a display name into `(first, last, full)`.
///
/// The first word is the first name; everything after it the last name.
pub(crate) fn split_full_name(raw: &str) -> (Option<String>, Option<String>, Option<String>) {
    let Some(full) = normalize_name(raw) else {
        return (None, None, None);
    };
    match full.split_once(' ') {
        Some((first, last)) => (
            Some(first.to_string()),
            Some(last.to_string()),
            Some(full.clone()),
        ),
        None => (Some(full.clone()), None, Some(full)),
    }
}

pub(crate) fn ensure_width(row: &LegacyRow, expected: usize) -> Result<(), RowError> {
    if row.width() < expected {
        Err(RowError::TooFewColumns {
            line_no: row.line_no,
            expected,
            found: row.width(),
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
#[path = "adapter_test.rs"]
mod tests;
