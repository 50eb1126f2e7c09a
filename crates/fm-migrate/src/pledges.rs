//! Pledge reconciliation between a source's staged pledges and the
//! canonical `pledges` table of its campaign.
//!
//! Staged rows are joined to active donors by lowercased email and
//! collapsed into `(donor_id, amount)` candidates. A candidate is new when
//! no pledge with the same `(campaign_id, donor_id, amount)` exists, which
//! makes [`PledgeReconciler::apply`] safe to re-run. Canonical pledges of
//! the campaign without a candidate are "extras"; they are only removed by
//! the opt-in [`PledgeReconciler::cleanup`], which backs them up first.

use crate::audit::AuditLog;
use crate::error::{MigrateError, MigrateResult};
use crate::staging::ensure_staged;
use chrono::Utc;
use fm_core::normalize::{format_cents, format_timestamp};
use fm_core::{LogStatus, MigrationLogEntry, SourceConfig};
use fm_db::{Database, SqlValue};
use serde::Serialize;

/// Status written on pledges created from staging.
pub const APPLIED_STATUS: &str = "collected";

/// Dry-run view of what apply would do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PledgeReport {
    pub source: String,
    pub campaign_id: i64,
    pub staged_rows: i64,
    pub staged_sum_cents: i64,
    pub staged_unique_emails: i64,
    /// Distinct staged emails belonging to an active donor
    pub matched_emails: i64,
    /// Staged rows with an amount of zero or less; never applied
    pub zero_amount_rows: i64,
    /// Distinct `(donor, amount)` pairs derived from matched rows
    pub candidates: i64,
    /// Candidates already present as canonical pledges
    pub existing_pairs: i64,
    pub would_insert: i64,
    /// Canonical pledges of the campaign with no staged counterpart
    pub extras: i64,
    pub extras_sum_cents: i64,
}

/// Count, sum, and distinct donors of one campaign's pledges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CampaignTotals {
    pub pledges: i64,
    pub total_cents: i64,
    pub donors: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplySummary {
    pub source: String,
    pub campaign_id: i64,
    pub inserted: i64,
    pub already_present: i64,
    /// Staged rows whose email matched no active donor
    pub unmatched_rows: i64,
    pub totals: CampaignTotals,
    pub expected_total_cents: Option<i64>,
}

impl ApplySummary {
    /// `None` when no expected total is configured.
    pub fn total_matches_expected(&self) -> Option<bool> {
        self.expected_total_cents
            .map(|expected| expected == self.totals.total_cents)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupSummary {
    pub run_id: String,
    pub backed_up: i64,
    pub deleted: i64,
    pub deleted_cents: i64,
}

pub struct PledgeReconciler<'a> {
    db: &'a dyn Database,
    source: &'a SourceConfig,
    campaign_id: i64,
    staging_table: String,
}

impl<'a> PledgeReconciler<'a> {
    /// Reconciler for a pledge-carrying source with a campaign.
    pub fn new(db: &'a dyn Database, source: &'a SourceConfig) -> MigrateResult<Self> {
        let campaign_id = match source.campaign_id {
            Some(id) if source.format.yields_pledges() => id,
            _ => {
                return Err(MigrateError::NotAPledgeSource {
                    source_name: source.name.to_string(),
                })
            }
        };
        Ok(Self {
            db,
            source,
            campaign_id,
            staging_table: source.name.pledge_staging_table(),
        })
    }

    pub fn campaign_id(&self) -> i64 {
        self.campaign_id
    }

    /// `(donor_id, amount_cents, pledge_date, reward_name)` per candidate.
    fn candidates_sql(&self) -> String {
        format!(
            "SELECT d.id AS donor_id, s.amount_cents, \
                    MIN(s.pledge_date) AS pledge_date, MIN(s.reward_name) AS reward_name \
             FROM {staging} s \
             JOIN (SELECT MIN(id) AS id, lower(email) AS email FROM donors \
                   WHERE NOT deleted GROUP BY lower(email)) d \
               ON d.email = lower(s.email) \
             WHERE s.amount_cents > 0 \
             GROUP BY d.id, s.amount_cents",
            staging = self.staging_table
        )
    }

    async fn scalar(&self, sql: &str, params: &[SqlValue]) -> MigrateResult<i64> {
        let row = self.db.query_one(sql, params).await?;
        Ok(row
            .and_then(|r| r.first().and_then(SqlValue::as_i64))
            .unwrap_or(0))
    }

    async fn ensure_staged(&self) -> MigrateResult<()> {
        ensure_staged(self.db, &self.source.name, &self.staging_table).await
    }

    /// Compute the diff between staging and the campaign without writing.
    pub async fn report(&self) -> MigrateResult<PledgeReport> {
        self.ensure_staged().await?;
        let staging = &self.staging_table;
        let candidates = self.candidates_sql();
        let campaign = SqlValue::Integer(self.campaign_id);

        let staged = self
            .db
            .query_one(
                &format!(
                    "SELECT COUNT(*), CAST(COALESCE(SUM(amount_cents), 0) AS BIGINT), \
                            COUNT(DISTINCT lower(email)), \
                            COUNT(*) FILTER (WHERE amount_cents <= 0) \
                     FROM {staging}"
                ),
                &[],
            )
            .await?
            .unwrap_or_default();
        let cell = |idx: usize| staged.get(idx).and_then(SqlValue::as_i64).unwrap_or(0);

        let matched_emails = self
            .scalar(
                &format!(
                    "SELECT COUNT(DISTINCT lower(s.email)) FROM {staging} s \
                     WHERE EXISTS (SELECT 1 FROM donors d \
                                   WHERE NOT d.deleted AND lower(d.email) = lower(s.email))"
                ),
                &[],
            )
            .await?;
        let candidate_count = self
            .scalar(&format!("SELECT COUNT(*) FROM ({candidates}) c"), &[])
            .await?;
        let existing_pairs = self
            .scalar(
                &format!(
                    "SELECT COUNT(*) FROM ({candidates}) c \
                     WHERE EXISTS (SELECT 1 FROM pledges p WHERE p.campaign_id = ? \
                                   AND p.donor_id = c.donor_id AND p.amount_cents = c.amount_cents)"
                ),
                &[campaign.clone()],
            )
            .await?;
        let extras = self
            .db
            .query_one(
                &format!(
                    "SELECT COUNT(*), CAST(COALESCE(SUM(p.amount_cents), 0) AS BIGINT) \
                     FROM pledges p WHERE p.campaign_id = ? \
                     AND NOT EXISTS (SELECT 1 FROM ({candidates}) c \
                                     WHERE c.donor_id = p.donor_id AND c.amount_cents = p.amount_cents)"
                ),
                &[campaign],
            )
            .await?
            .unwrap_or_default();

        let report = PledgeReport {
            source: self.source.name.to_string(),
            campaign_id: self.campaign_id,
            staged_rows: cell(0),
            staged_sum_cents: cell(1),
            staged_unique_emails: cell(2),
            zero_amount_rows: cell(3),
            matched_emails,
            candidates: candidate_count,
            existing_pairs,
            would_insert: candidate_count - existing_pairs,
            extras: extras.first().and_then(SqlValue::as_i64).unwrap_or(0),
            extras_sum_cents: extras.get(1).and_then(SqlValue::as_i64).unwrap_or(0),
        };
        log::info!(
            "Pledge report for '{}' (campaign {}): {} staged rows ({}), {} would insert, {} extras ({})",
            report.source,
            report.campaign_id,
            report.staged_rows,
            format_cents(report.staged_sum_cents),
            report.would_insert,
            report.extras,
            format_cents(report.extras_sum_cents)
        );
        Ok(report)
    }

    /// Insert every candidate without an existing `(campaign, donor, amount)` pledge.
    pub async fn apply(&self, audit: &mut AuditLog) -> MigrateResult<ApplySummary> {
        self.ensure_staged().await?;
        let staging = &self.staging_table;
        let candidates = self.candidates_sql();
        let campaign = SqlValue::Integer(self.campaign_id);

        let candidate_count = self
            .scalar(&format!("SELECT COUNT(*) FROM ({candidates}) c"), &[])
            .await?;
        let unmatched_rows = self
            .scalar(
                &format!(
                    "SELECT COUNT(*) FROM {staging} s WHERE s.amount_cents > 0 \
                     AND NOT EXISTS (SELECT 1 FROM donors d \
                                     WHERE NOT d.deleted AND lower(d.email) = lower(s.email))"
                ),
                &[],
            )
            .await?;

        let now = format_timestamp(&Utc::now().naive_utc());
        let inserted = self
            .db
            .execute_params(
                &format!(
                    "INSERT INTO pledges (donor_id, campaign_id, reward_id, amount_cents, status, created_at, source) \
                     SELECT c.donor_id, ?, \
                            (SELECT MIN(r.id) FROM rewards r \
                             WHERE r.campaign_id = ? AND lower(r.name) = lower(c.reward_name)), \
                            c.amount_cents, '{APPLIED_STATUS}', \
                            COALESCE(CAST(c.pledge_date AS TIMESTAMP), CAST(? AS TIMESTAMP)), ? \
                     FROM ({candidates}) c \
                     WHERE NOT EXISTS (SELECT 1 FROM pledges p WHERE p.campaign_id = ? \
                                       AND p.donor_id = c.donor_id AND p.amount_cents = c.amount_cents)"
                ),
                &[
                    campaign.clone(),
                    campaign.clone(),
                    SqlValue::from(now),
                    SqlValue::from(self.source.name.pledge_source_tag()),
                    campaign,
                ],
            )
            .await? as i64;

        let totals = self.campaign_totals().await?;
        let summary = ApplySummary {
            source: self.source.name.to_string(),
            campaign_id: self.campaign_id,
            inserted,
            already_present: candidate_count - inserted,
            unmatched_rows,
            totals,
            expected_total_cents: self.source.expected_total_cents(),
        };

        if unmatched_rows > 0 {
            log::warn!(
                "{} staged rows of '{}' match no active donor; run `fm donors` first",
                unmatched_rows,
                summary.source
            );
        }
        audit
            .record(MigrationLogEntry::new(
                LogStatus::Info,
                format!(
                    "applied {} pledges from {} to campaign {} ({} already present); campaign now {} pledges, {} from {} donors",
                    summary.inserted,
                    summary.source,
                    summary.campaign_id,
                    summary.already_present,
                    totals.pledges,
                    format_cents(totals.total_cents),
                    totals.donors
                ),
            ))
            .await;

        if let (Some(expected), Some(false)) =
            (summary.expected_total_cents, summary.total_matches_expected())
        {
            log::warn!(
                "Campaign {} total {} differs from expected {}",
                summary.campaign_id,
                format_cents(totals.total_cents),
                format_cents(expected)
            );
        }
        Ok(summary)
    }

    /// Count, sum, and distinct donors of the campaign's pledges.
    pub async fn campaign_totals(&self) -> MigrateResult<CampaignTotals> {
        let row = self
            .db
            .query_one(
                "SELECT COUNT(*), CAST(COALESCE(SUM(amount_cents), 0) AS BIGINT), COUNT(DISTINCT donor_id) \
                 FROM pledges WHERE campaign_id = ?",
                &[SqlValue::Integer(self.campaign_id)],
            )
            .await?
            .unwrap_or_default();
        let cell = |idx: usize| row.get(idx).and_then(SqlValue::as_i64).unwrap_or(0);
        Ok(CampaignTotals {
            pledges: cell(0),
            total_cents: cell(1),
            donors: cell(2),
        })
    }

    /// Back up and then delete the campaign's extras.
    ///
    /// Backup and delete run in one transaction; only rows backed up under
    /// this audit run id are deleted.
    pub async fn cleanup(&self, audit: &mut AuditLog) -> MigrateResult<CleanupSummary> {
        self.ensure_staged().await?;
        let candidates = self.candidates_sql();
        let run_id = audit.run_id().to_string();
        let reason = format!("no staged counterpart in {}", self.source.name);
        let scope = [
            SqlValue::from(run_id.as_str()),
            SqlValue::Integer(self.campaign_id),
        ];

        self.db.begin().await?;
        let result = async {
            let backed_up = self
                .db
                .execute_params(
                    &format!(
                        "INSERT INTO pledges_backup (pledge_id, donor_id, campaign_id, reward_id, amount_cents, \
                                                     status, created_at, source, backup_reason, backup_run_id) \
                         SELECT p.id, p.donor_id, p.campaign_id, p.reward_id, p.amount_cents, \
                                p.status, p.created_at, p.source, ?, ? \
                         FROM pledges p WHERE p.campaign_id = ? \
                         AND NOT EXISTS (SELECT 1 FROM ({candidates}) c \
                                         WHERE c.donor_id = p.donor_id AND c.amount_cents = p.amount_cents)"
                    ),
                    &[
                        SqlValue::from(reason.as_str()),
                        SqlValue::from(run_id.as_str()),
                        SqlValue::Integer(self.campaign_id),
                    ],
                )
                .await?;
            let deleted = self
                .db
                .execute_params(
                    "DELETE FROM pledges WHERE id IN \
                     (SELECT pledge_id FROM pledges_backup WHERE backup_run_id = ? AND campaign_id = ?)",
                    &scope,
                )
                .await?;
            Ok::<_, MigrateError>((backed_up as i64, deleted as i64))
        }
        .await;

        let (backed_up, deleted) = match result {
            Ok(counts) => {
                self.db.commit().await?;
                counts
            }
            Err(e) => {
                if let Err(rollback_err) = self.db.rollback().await {
                    log::error!("Rollback after failed cleanup also failed: {}", rollback_err);
                }
                return Err(e);
            }
        };

        let backups = self
            .db
            .query_rows(
                "SELECT pledge_id, donor_id, amount_cents FROM pledges_backup \
                 WHERE backup_run_id = ? AND campaign_id = ? ORDER BY pledge_id",
                &scope,
            )
            .await?;
        let mut deleted_cents = 0;
        for row in &backups {
            let pledge_id = row.first().and_then(SqlValue::as_i64).unwrap_or(0);
            let donor_id = row.get(1).and_then(SqlValue::as_i64);
            let amount = row.get(2).and_then(SqlValue::as_i64).unwrap_or(0);
            deleted_cents += amount;
            let mut entry = MigrationLogEntry::new(
                LogStatus::Info,
                format!(
                    "backed up and deleted pledge {} ({}) of campaign {}: {}",
                    pledge_id,
                    format_cents(amount),
                    self.campaign_id,
                    reason
                ),
            );
            if let Some(id) = donor_id {
                entry = entry.canonical_id(id);
            }
            audit.record(entry).await;
        }

        log::info!(
            "Cleanup for campaign {}: {} backed up, {} deleted ({})",
            self.campaign_id,
            backed_up,
            deleted,
            format_cents(deleted_cents)
        );
        Ok(CleanupSummary {
            run_id,
            backed_up,
            deleted,
            deleted_cents,
        })
    }
}

#[cfg(test)]
#[path = "pledges_test.rs"]
mod tests;
