//! Record types flowing between the loader, resolver, and audit log.

use crate::ids::{LegacyId, SourceName};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One physical row of a legacy export, as the delimited reader saw it.
#[derive(Debug, Clone)]
pub struct LegacyRow {
    /// 1-based line number in the source file
    pub line_no: u64,

    /// Fields split by the sniffed delimiter
    pub fields: csv::StringRecord,

    /// The row re-encoded with its delimiter, kept for audit.
    ///
    /// Comma rows are re-quoted where a field needs it, so the line splits
    /// back into the same fields. Tab rows are written exactly as read.
    pub raw_line: String,
}

impl LegacyRow {
    pub fn new(line_no: u64, fields: csv::StringRecord, delimiter: u8) -> Self {
        let raw_line = encode_line(&fields, delimiter);
        Self {
            line_no,
            fields,
            raw_line,
        }
    }

    /// Field at `idx`, or `""` if the row is short.
    pub fn field(&self, idx: usize) -> &str {
        self.fields.get(idx).unwrap_or("")
    }

    /// Number of fields in the row.
    pub fn width(&self) -> usize {
        self.fields.len()
    }
}

fn encode_line(fields: &csv::StringRecord, delimiter: u8) -> String {
    let style = if delimiter == b',' {
        csv::QuoteStyle::Necessary
    } else {
        csv::QuoteStyle::Never
    };
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(style)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    let encoded = match writer.write_record(fields) {
        Ok(()) => writer.into_inner().ok(),
        Err(_) => None,
    };
    match encoded {
        Some(bytes) => String::from_utf8_lossy(&bytes)
            .trim_end_matches('\n')
            .to_string(),
        None => {
            let sep = (delimiter as char).to_string();
            fields.iter().collect::<Vec<_>>().join(&sep)
        }
    }
}

/// A donor as extracted from one legacy row.
///
/// Produced once per row and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedDonorRecord {
    pub legacy_id: LegacyId,
    pub source: SourceName,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub donor_name: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub auth_user_id: Option<String>,

    /// Staff/test accounts that must never become donors
    #[serde(default)]
    pub administrative: bool,
}

impl NormalizedDonorRecord {
    /// An empty record carrying only its identity.
    pub fn new(legacy_id: LegacyId, source: SourceName) -> Self {
        Self {
            legacy_id,
            source,
            email: None,
            first_name: None,
            last_name: None,
            full_name: None,
            donor_name: None,
            created_at: None,
            auth_user_id: None,
            administrative: false,
        }
    }
}

/// A pledge as extracted from one legacy row, before donor matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingPledgeRecord {
    pub line_no: u64,
    pub email: Option<String>,
    pub amount_cents: i64,
    pub pledge_date: Option<NaiveDateTime>,
    pub reward_name: Option<String>,
    pub raw_line: String,
}

/// A row of the canonical `donors` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalDonor {
    pub id: i64,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub donor_name: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub legacy_id: Option<String>,
    pub auth_user_id: Option<String>,
    pub deleted: bool,
    pub notes: Option<String>,
}

/// Kind of identity collision recorded in the conflict log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// Incoming email already belongs to a canonical donor
    EmailMatch,
    /// Existing donor is linked to a different identity-directory account
    AuthMismatch,
}

impl ConflictType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictType::EmailMatch => "email_match",
            ConflictType::AuthMismatch => "auth_mismatch",
        }
    }
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a conflict was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// At least one empty field was filled from the incoming record
    Merged,
    /// Existing donor already had every value; nothing written
    KeptExisting,
    /// Existing identity link retained over the incoming one
    KeptExistingLink,
}

impl ConflictResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictResolution::Merged => "merged",
            ConflictResolution::KeptExisting => "kept_existing",
            ConflictResolution::KeptExistingLink => "kept_existing_link",
        }
    }
}

impl fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only record of one identity collision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictLogEntry {
    pub legacy_id: String,
    pub email: Option<String>,
    pub conflict_type: ConflictType,
    pub resolution: ConflictResolution,
    pub details: String,
    pub canonical_id: Option<i64>,
}

/// Outcome tag for a migration log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Created,
    Merged,
    Unchanged,
    Skipped,
    Conflict,
    Error,
    Info,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStatus::Created => "created",
            LogStatus::Merged => "merged",
            LogStatus::Unchanged => "unchanged",
            LogStatus::Skipped => "skipped",
            LogStatus::Conflict => "conflict",
            LogStatus::Error => "error",
            LogStatus::Info => "info",
        }
    }
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only record of one pipeline decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationLogEntry {
    pub legacy_id: Option<String>,
    pub email: Option<String>,
    pub status: LogStatus,
    pub message: String,
    pub canonical_id: Option<i64>,
    pub timestamp: DateTime<Utc>,
}

impl MigrationLogEntry {
    /// Entry stamped with the current time.
    pub fn new(status: LogStatus, message: impl Into<String>) -> Self {
        Self {
            legacy_id: None,
            email: None,
            status,
            message: message.into(),
            canonical_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn legacy_id(mut self, legacy_id: impl Into<String>) -> Self {
        self.legacy_id = Some(legacy_id.into());
        self
    }

    pub fn email(mut self, email: Option<&str>) -> Self {
        self.email = email.map(str::to_string);
        self
    }

    pub fn canonical_id(mut self, id: i64) -> Self {
        self.canonical_id = Some(id);
        self
    }

    /// One line of the human-readable trail.
    pub fn to_log_line(&self) -> String {
        format!(
            "{} {} legacy_id={} email={} canonical_id={} {}",
            self.timestamp.to_rfc3339(),
            self.status.as_str().to_uppercase(),
            self.legacy_id.as_deref().unwrap_or("-"),
            self.email.as_deref().unwrap_or("-"),
            self.canonical_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string()),
            self.message
        )
    }
}

/// Written once per manual account merge; never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRecord {
    pub source_donor_id: i64,
    pub target_donor_id: i64,
    pub pledges_moved: i64,
    pub total_amount_moved_cents: i64,
    pub reason: String,
    pub notes: String,
}
