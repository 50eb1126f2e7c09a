//! Identity-directory seam.
//!
//! The directory is an external signup system that only hands out
//! `(id, email, created_at)` tuples. It is used two ways: to backfill
//! `auth_user_id` on legacy donors by email, and as a donor source of its
//! own so signups that never pledged still become donors.

use crate::error::{MigrateError, MigrateResult};
use fm_core::normalize::{normalize_email, parse_date};
use fm_core::{LegacyId, NormalizedDonorRecord, SourceName};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Source name identity-directory records are resolved under.
pub const IDENTITY_SOURCE: &str = "identity";

/// One account as exported by the identity directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityAccount {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

pub trait IdentityDirectory: Send + Sync {
    /// Account registered under a normalized email.
    fn lookup_by_email(&self, email: &str) -> Option<&IdentityAccount>;

    /// Every account, in directory order.
    fn accounts(&self) -> &[IdentityAccount];
}

/// Directory backed by a JSON array export.
#[derive(Debug, Clone, Default)]
pub struct JsonIdentityDirectory {
    accounts: Vec<IdentityAccount>,
    by_email: HashMap<String, usize>,
}

impl JsonIdentityDirectory {
    pub fn load(path: &Path) -> MigrateResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| MigrateError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let accounts: Vec<IdentityAccount> =
            serde_json::from_str(&content).map_err(|e| MigrateError::Json {
                path: path.display().to_string(),
                source: e,
            })?;
        log::debug!(
            "Loaded {} identity accounts from {}",
            accounts.len(),
            path.display()
        );
        Ok(Self::from_accounts(accounts))
    }

    /// Index accounts by normalized email; the first account per email wins.
    pub fn from_accounts(accounts: Vec<IdentityAccount>) -> Self {
        let mut by_email = HashMap::new();
        for (idx, account) in accounts.iter().enumerate() {
            if let Some(email) = normalize_email(&account.email) {
                by_email.entry(email).or_insert(idx);
            }
        }
        Self { accounts, by_email }
    }
}

impl IdentityDirectory for JsonIdentityDirectory {
    fn lookup_by_email(&self, email: &str) -> Option<&IdentityAccount> {
        self.by_email.get(email).map(|&idx| &self.accounts[idx])
    }

    fn accounts(&self) -> &[IdentityAccount] {
        &self.accounts
    }
}

/// Turn directory accounts into donor records for the resolver.
///
/// Each record's legacy id is `auth:<account id>`; accounts without an id
/// are dropped.
pub fn identity_records(directory: &dyn IdentityDirectory) -> Vec<NormalizedDonorRecord> {
    let source = SourceName::new(IDENTITY_SOURCE);
    directory
        .accounts()
        .iter()
        .filter_map(|account| {
            let id = account.id.trim();
            if id.is_empty() {
                return None;
            }
            let legacy_id = LegacyId::new(format!("auth:{}", id));
            let mut record = NormalizedDonorRecord::new(legacy_id, source.clone());
            record.email = normalize_email(&account.email);
            record.created_at = account.created_at.as_deref().and_then(parse_date);
            record.auth_user_id = Some(id.to_string());
            Some(record)
        })
        .collect()
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
