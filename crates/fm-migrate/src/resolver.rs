//! Donor matching and merge resolution.
//!
//! A run builds one [`ResolutionState`] from a single read of the donor
//! table and threads it through [`DonorResolver::resolve`] for every
//! record, in order. The state is updated in place as donors are created
//! or merged and is never re-queried mid-run.
//!
//! Merging never overwrites: for each mergeable field the existing value
//! is kept when present and the incoming value only fills gaps.

use crate::audit::AuditLog;
use crate::donors::{append_note, insert_donor, load_active_donors, update_donor};
use crate::error::MigrateResult;
use crate::identity::IdentityDirectory;
use fm_core::normalize::{is_valid_email, normalize_email};
use fm_core::{
    AdministrativeConfig, CanonicalDonor, Config, ConflictLogEntry, ConflictResolution,
    ConflictType, LogStatus, MigrationLogEntry, NormalizedDonorRecord, WatchListPolicy,
};
use fm_db::Database;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Per-run matching state: the email index and the legacy ids seen so far.
#[derive(Debug, Default)]
pub struct ResolutionState {
    index: HashMap<String, CanonicalDonor>,
    seen_legacy_ids: HashSet<String>,
}

impl ResolutionState {
    /// Build the index from one full read of active donors.
    ///
    /// When legacy data already holds two active donors with one email,
    /// the lowest id owns the email.
    pub async fn load(db: &dyn Database) -> MigrateResult<Self> {
        let donors = load_active_donors(db).await?;
        let mut state = Self::default();
        for donor in donors {
            match normalize_email(&donor.email) {
                Some(key) => {
                    state.index.entry(key).or_insert(donor);
                }
                None => log::warn!("Donor {} has no usable email; not indexed", donor.id),
            }
        }
        log::debug!("Indexed {} active donors by email", state.index.len());
        Ok(state)
    }

    pub fn lookup(&self, email: &str) -> Option<&CanonicalDonor> {
        self.index.get(email)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Mark a legacy id as seen; false if it already was.
    fn first_sighting(&mut self, legacy_id: &str) -> bool {
        self.seen_legacy_ids.insert(legacy_id.to_string())
    }

    /// Index keys are normalized, whatever case the stored email has.
    fn upsert(&mut self, donor: CanonicalDonor) {
        if let Some(key) = normalize_email(&donor.email) {
            self.index.insert(key, donor);
        }
    }
}

/// Why a record did not reach matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    DuplicateLegacyId,
    MissingEmail,
    InvalidEmail,
    WatchListed,
    Administrative,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::DuplicateLegacyId => "legacy id already imported this run",
            SkipReason::MissingEmail => "no email",
            SkipReason::InvalidEmail => "invalid email",
            SkipReason::WatchListed => "email is on the duplicate watch-list",
            SkipReason::Administrative => "administrative account",
        };
        f.write_str(text)
    }
}

/// What happened to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    Created(i64),
    Merged(i64),
    Unchanged(i64),
    Skipped(SkipReason),
    Failed,
}

/// Tally of one resolution run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolveSummary {
    pub created: usize,
    pub merged: usize,
    pub unchanged: usize,
    pub conflicts: usize,
    pub duplicate_ids: usize,
    pub missing_emails: usize,
    pub invalid_emails: usize,
    pub watch_listed: usize,
    pub administrative: usize,
    pub errors: usize,
}

impl ResolveSummary {
    fn count(&mut self, outcome: ResolveOutcome) {
        match outcome {
            ResolveOutcome::Created(_) => self.created += 1,
            ResolveOutcome::Merged(_) => self.merged += 1,
            ResolveOutcome::Unchanged(_) => self.unchanged += 1,
            ResolveOutcome::Skipped(reason) => match reason {
                SkipReason::DuplicateLegacyId => self.duplicate_ids += 1,
                SkipReason::MissingEmail => self.missing_emails += 1,
                SkipReason::InvalidEmail => self.invalid_emails += 1,
                SkipReason::WatchListed => self.watch_listed += 1,
                SkipReason::Administrative => self.administrative += 1,
            },
            ResolveOutcome::Failed => self.errors += 1,
        }
    }

    /// Records skipped for any reason.
    pub fn skipped(&self) -> usize {
        self.duplicate_ids
            + self.missing_emails
            + self.invalid_emails
            + self.watch_listed
            + self.administrative
    }

    /// Fold another run's tally into this one.
    pub fn absorb(&mut self, other: &ResolveSummary) {
        self.created += other.created;
        self.merged += other.merged;
        self.unchanged += other.unchanged;
        self.conflicts += other.conflicts;
        self.duplicate_ids += other.duplicate_ids;
        self.missing_emails += other.missing_emails;
        self.invalid_emails += other.invalid_emails;
        self.watch_listed += other.watch_listed;
        self.administrative += other.administrative;
        self.errors += other.errors;
    }
}

/// Resolver settings taken from project configuration.
#[derive(Debug, Clone, Default)]
pub struct ResolverPolicy {
    pub watch_list: HashSet<String>,
    pub watch_list_policy: WatchListPolicy,
    pub administrative: AdministrativeConfig,
}

impl ResolverPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            watch_list: config
                .watch_list
                .iter()
                .filter_map(|e| normalize_email(e))
                .collect(),
            watch_list_policy: config.watch_list_policy,
            administrative: config.administrative.clone(),
        }
    }

    fn is_administrative(&self, record: &NormalizedDonorRecord) -> bool {
        record.administrative
            || self
                .administrative
                .matches(record.email.as_deref(), record.legacy_id.as_str())
    }
}

/// Field-by-field result of merging an incoming record into a donor.
#[derive(Debug, Default)]
struct FieldMerge {
    filled: Vec<&'static str>,
    kept: Vec<&'static str>,
}

impl FieldMerge {
    fn merge<T: Clone + PartialEq>(
        &mut self,
        name: &'static str,
        existing: &mut Option<T>,
        incoming: Option<&T>,
    ) {
        match incoming {
            Some(value) if existing.is_none() => {
                *existing = Some(value.clone());
                self.filled.push(name);
            }
            Some(value) if existing.as_ref() != Some(value) => self.kept.push(name),
            _ => {}
        }
    }

    fn details(&self) -> String {
        fn list(fields: &[&str]) -> String {
            if fields.is_empty() {
                "none".to_string()
            } else {
                fields.join(", ")
            }
        }
        format!(
            "filled [{}]; kept existing [{}]",
            list(&self.filled),
            list(&self.kept)
        )
    }
}

pub struct DonorResolver<'a> {
    db: &'a dyn Database,
    policy: &'a ResolverPolicy,
    identity: Option<&'a dyn IdentityDirectory>,
}

impl<'a> DonorResolver<'a> {
    pub fn new(
        db: &'a dyn Database,
        policy: &'a ResolverPolicy,
        identity: Option<&'a dyn IdentityDirectory>,
    ) -> Self {
        Self {
            db,
            policy,
            identity,
        }
    }

    /// Resolve every record in order against one shared state.
    pub async fn resolve_all(
        &self,
        records: &[NormalizedDonorRecord],
        state: &mut ResolutionState,
        audit: &mut AuditLog,
    ) -> ResolveSummary {
        let mut summary = ResolveSummary::default();
        for record in records {
            self.resolve(record, state, audit, &mut summary).await;
        }
        summary
    }

    /// Resolve one record as new, merge, or skip.
    pub async fn resolve(
        &self,
        record: &NormalizedDonorRecord,
        state: &mut ResolutionState,
        audit: &mut AuditLog,
        summary: &mut ResolveSummary,
    ) -> ResolveOutcome {
        let outcome = match self.screen(record, state) {
            Err(reason) => {
                audit
                    .record(
                        MigrationLogEntry::new(
                            LogStatus::Skipped,
                            format!("skipped from {}: {}", record.source, reason),
                        )
                        .legacy_id(record.legacy_id.as_str())
                        .email(record.email.as_deref()),
                    )
                    .await;
                ResolveOutcome::Skipped(reason)
            }
            Ok(email) => {
                let result = match state.lookup(&email).cloned() {
                    None => self.create(record, &email, state, audit).await,
                    Some(existing) => {
                        self.merge(record, existing, state, audit, summary).await
                    }
                };
                match result {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        audit
                            .record(
                                MigrationLogEntry::new(
                                    LogStatus::Error,
                                    format!("failed to write donor from {}: {}", record.source, e),
                                )
                                .legacy_id(record.legacy_id.as_str())
                                .email(Some(email.as_str())),
                            )
                            .await;
                        ResolveOutcome::Failed
                    }
                }
            }
        };
        summary.count(outcome);
        outcome
    }

    /// Apply the skip rules in order; returns the usable email.
    fn screen(
        &self,
        record: &NormalizedDonorRecord,
        state: &mut ResolutionState,
    ) -> Result<String, SkipReason> {
        if !state.first_sighting(record.legacy_id.as_str()) {
            return Err(SkipReason::DuplicateLegacyId);
        }

        let email = record.email.clone().ok_or(SkipReason::MissingEmail)?;
        if !is_valid_email(&email) {
            return Err(SkipReason::InvalidEmail);
        }
        if self.policy.watch_list.contains(&email) {
            match self.policy.watch_list_policy {
                WatchListPolicy::Skip => return Err(SkipReason::WatchListed),
                WatchListPolicy::Warn => log::warn!(
                    "Watch-listed email {} ({}) resolved anyway",
                    email,
                    record.legacy_id
                ),
            }
        }

        if self.policy.is_administrative(record) {
            return Err(SkipReason::Administrative);
        }
        Ok(email)
    }

    /// Identity link implied by the record, falling back to the directory.
    fn incoming_auth_id(&self, record: &NormalizedDonorRecord, email: &str) -> Option<String> {
        record.auth_user_id.clone().or_else(|| {
            self.identity
                .and_then(|dir| dir.lookup_by_email(email))
                .map(|account| account.id.clone())
        })
    }

    async fn create(
        &self,
        record: &NormalizedDonorRecord,
        email: &str,
        state: &mut ResolutionState,
        audit: &mut AuditLog,
    ) -> MigrateResult<ResolveOutcome> {
        let auth_id = self.incoming_auth_id(record, email);
        let note = format!("imported {} from {}", record.legacy_id, record.source);
        let donor = insert_donor(self.db, record, email, auth_id.as_deref(), &note).await?;
        let id = donor.id;
        state.upsert(donor);

        audit
            .record(
                MigrationLogEntry::new(LogStatus::Created, note)
                    .legacy_id(record.legacy_id.as_str())
                    .email(Some(email))
                    .canonical_id(id),
            )
            .await;
        Ok(ResolveOutcome::Created(id))
    }

    async fn merge(
        &self,
        record: &NormalizedDonorRecord,
        existing: CanonicalDonor,
        state: &mut ResolutionState,
        audit: &mut AuditLog,
        summary: &mut ResolveSummary,
    ) -> MigrateResult<ResolveOutcome> {
        let incoming_auth = self.incoming_auth_id(record, &existing.email);
        let incoming_legacy_id = record.legacy_id.to_string();

        let mut merged = existing.clone();
        let mut fields = FieldMerge::default();
        fields.merge("first_name", &mut merged.first_name, record.first_name.as_ref());
        fields.merge("last_name", &mut merged.last_name, record.last_name.as_ref());
        fields.merge("full_name", &mut merged.full_name, record.full_name.as_ref());
        fields.merge("donor_name", &mut merged.donor_name, record.donor_name.as_ref());
        fields.merge("created_at", &mut merged.created_at, record.created_at.as_ref());
        fields.merge("legacy_id", &mut merged.legacy_id, Some(&incoming_legacy_id));

        let auth_mismatch = match (&existing.auth_user_id, &incoming_auth) {
            (Some(current), Some(incoming)) if current != incoming => Some(incoming.clone()),
            _ => None,
        };
        if existing.auth_user_id.is_none() && incoming_auth.is_some() {
            merged.auth_user_id = incoming_auth.clone();
            fields.filled.push("auth_user_id");
        }

        let changed = !fields.filled.is_empty();
        let resolution = if changed {
            ConflictResolution::Merged
        } else {
            ConflictResolution::KeptExisting
        };

        if changed {
            let line = format!(
                "merged {} from {}: filled {}",
                record.legacy_id,
                record.source,
                fields.filled.join(", ")
            );
            merged.notes = Some(append_note(existing.notes.as_deref(), &line));
            update_donor(self.db, &merged).await?;
            state.upsert(merged.clone());
        }

        audit
            .conflict(ConflictLogEntry {
                legacy_id: incoming_legacy_id.clone(),
                email: Some(existing.email.clone()),
                conflict_type: ConflictType::EmailMatch,
                resolution,
                details: fields.details(),
                canonical_id: Some(existing.id),
            })
            .await;
        summary.conflicts += 1;

        if let Some(incoming) = auth_mismatch {
            audit
                .conflict(ConflictLogEntry {
                    legacy_id: incoming_legacy_id.clone(),
                    email: Some(existing.email.clone()),
                    conflict_type: ConflictType::AuthMismatch,
                    resolution: ConflictResolution::KeptExistingLink,
                    details: format!(
                        "donor linked to {}; incoming record implies {}",
                        existing.auth_user_id.as_deref().unwrap_or("-"),
                        incoming
                    ),
                    canonical_id: Some(existing.id),
                })
                .await;
            summary.conflicts += 1;
        }

        let (status, outcome) = if changed {
            (LogStatus::Merged, ResolveOutcome::Merged(existing.id))
        } else {
            (LogStatus::Unchanged, ResolveOutcome::Unchanged(existing.id))
        };
        audit
            .record(
                MigrationLogEntry::new(
                    status,
                    format!("matched existing donor from {}: {}", record.source, fields.details()),
                )
                .legacy_id(incoming_legacy_id)
                .email(Some(existing.email.as_str()))
                .canonical_id(existing.id),
            )
            .await;
        Ok(outcome)
    }
}

#[cfg(test)]
#[path = "resolver_test.rs"]
mod tests;
