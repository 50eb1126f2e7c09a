//! Operator-invoked account merges.
//!
//! A merge moves every pledge of the source donor to the target, moves the
//! source's addresses only when the target has none, writes one
//! `merged_accounts` row, and soft-deletes the source. The source is never
//! hard-deleted and a merged donor cannot be merged again.

use crate::audit::AuditLog;
use crate::donors::{append_note, get_donor};
use crate::error::{MigrateError, MigrateResult};
use fm_core::normalize::format_cents;
use fm_core::{CanonicalDonor, LogStatus, MergeRecord, MigrationLogEntry};
use fm_db::{Database, DbError, SqlValue};
use serde::Serialize;

/// What a merge would do, computed without writing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergePlan {
    pub source: CanonicalDonor,
    pub target: CanonicalDonor,
    pub pledges: i64,
    pub amount_cents: i64,
    pub source_addresses: i64,
    pub target_addresses: i64,
}

impl MergePlan {
    /// Addresses move only when the target has none.
    pub fn moves_addresses(&self) -> bool {
        self.source_addresses > 0 && self.target_addresses == 0
    }

    /// What the merge does with the source donor's addresses.
    pub fn address_decision(&self) -> String {
        if self.source_addresses == 0 {
            "no addresses to move".to_string()
        } else if self.moves_addresses() {
            format!("moved {} address(es)", self.source_addresses)
        } else {
            format!(
                "left {} address(es) on donor {}: target already has {}",
                self.source_addresses, self.source.id, self.target_addresses
            )
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    pub merge_id: i64,
    pub record: MergeRecord,
    pub addresses_moved: i64,
}

fn rejected(reason: impl Into<String>) -> MigrateError {
    MigrateError::MergeRejected {
        reason: reason.into(),
    }
}

async fn count_and_sum(db: &dyn Database, sql: &str, donor_id: i64) -> MigrateResult<(i64, i64)> {
    let row = db
        .query_one(sql, &[SqlValue::Integer(donor_id)])
        .await?
        .unwrap_or_default();
    Ok((
        row.first().and_then(SqlValue::as_i64).unwrap_or(0),
        row.get(1).and_then(SqlValue::as_i64).unwrap_or(0),
    ))
}

const PLEDGE_TOTALS_SQL: &str =
    "SELECT COUNT(*), CAST(COALESCE(SUM(amount_cents), 0) AS BIGINT) FROM pledges WHERE donor_id = ?";

const ADDRESS_COUNT_SQL: &str = "SELECT COUNT(*), 0 FROM addresses WHERE donor_id = ?";

async fn active_donor(db: &dyn Database, id: i64, role: &str) -> MigrateResult<CanonicalDonor> {
    let donor = get_donor(db, id)
        .await?
        .ok_or_else(|| rejected(format!("{} donor {} does not exist", role, id)))?;
    if donor.deleted {
        return Err(rejected(format!(
            "{} donor {} is already merged or deleted",
            role, id
        )));
    }
    Ok(donor)
}

/// Check preconditions and compute the merge without writing.
pub async fn plan_merge(
    db: &dyn Database,
    source_id: i64,
    target_id: i64,
) -> MigrateResult<MergePlan> {
    if source_id == target_id {
        return Err(rejected(format!(
            "cannot merge donor {} into itself",
            source_id
        )));
    }
    let source = active_donor(db, source_id, "source").await?;
    let target = active_donor(db, target_id, "target").await?;

    let (pledges, amount_cents) = count_and_sum(db, PLEDGE_TOTALS_SQL, source_id).await?;
    let (source_addresses, _) = count_and_sum(db, ADDRESS_COUNT_SQL, source_id).await?;
    let (target_addresses, _) = count_and_sum(db, ADDRESS_COUNT_SQL, target_id).await?;

    Ok(MergePlan {
        source,
        target,
        pledges,
        amount_cents,
        source_addresses,
        target_addresses,
    })
}

/// Carry out a planned merge in one transaction.
pub async fn execute_merge(
    db: &dyn Database,
    plan: &MergePlan,
    reason: &str,
    audit: &mut AuditLog,
) -> MigrateResult<MergeOutcome> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(rejected("a reason is required"));
    }
    let source_id = plan.source.id;
    let target_id = plan.target.id;

    db.begin().await?;
    let result = async {
        // Re-read inside the transaction; the plan may be stale.
        let plan = plan_merge(db, source_id, target_id).await?;
        let decision = plan.address_decision();

        let pledges_moved = db
            .execute_params(
                "UPDATE pledges SET donor_id = ? WHERE donor_id = ?",
                &[SqlValue::Integer(target_id), SqlValue::Integer(source_id)],
            )
            .await? as i64;
        let addresses_moved = if plan.moves_addresses() {
            db.execute_params(
                "UPDATE addresses SET donor_id = ? WHERE donor_id = ?",
                &[SqlValue::Integer(target_id), SqlValue::Integer(source_id)],
            )
            .await? as i64
        } else {
            0
        };

        let record = MergeRecord {
            source_donor_id: source_id,
            target_donor_id: target_id,
            pledges_moved,
            total_amount_moved_cents: plan.amount_cents,
            reason: reason.to_string(),
            notes: format!(
                "{} pledge(s) totalling {} moved; {}",
                pledges_moved,
                format_cents(plan.amount_cents),
                decision
            ),
        };
        let merge_id = db
            .query_one(
                "INSERT INTO merged_accounts (source_donor_id, target_donor_id, pledges_moved, \
                 total_amount_moved_cents, reason, notes) VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
                &[
                    SqlValue::Integer(record.source_donor_id),
                    SqlValue::Integer(record.target_donor_id),
                    SqlValue::Integer(record.pledges_moved),
                    SqlValue::Integer(record.total_amount_moved_cents),
                    SqlValue::from(record.reason.as_str()),
                    SqlValue::from(record.notes.as_str()),
                ],
            )
            .await?
            .and_then(|row| row.first().and_then(SqlValue::as_i64))
            .ok_or_else(|| {
                DbError::ExecutionError("INSERT INTO merged_accounts returned no id".to_string())
            })?;

        let target_note = append_note(
            plan.target.notes.as_deref(),
            &format!("absorbed donor {}: {}", source_id, reason),
        );
        db.execute_params(
            "UPDATE donors SET notes = ?, updated_at = now() WHERE id = ?",
            &[SqlValue::from(target_note), SqlValue::Integer(target_id)],
        )
        .await?;

        let source_note = append_note(
            plan.source.notes.as_deref(),
            &format!("merged into donor {}: {}; {}", target_id, reason, decision),
        );
        db.execute_params(
            "UPDATE donors SET deleted = true, notes = ?, updated_at = now() WHERE id = ?",
            &[SqlValue::from(source_note), SqlValue::Integer(source_id)],
        )
        .await?;

        Ok::<_, MigrateError>(MergeOutcome {
            merge_id,
            record,
            addresses_moved,
        })
    }
    .await;

    let outcome = match result {
        Ok(outcome) => {
            db.commit().await?;
            outcome
        }
        Err(e) => {
            if let Err(rollback_err) = db.rollback().await {
                log::error!("Rollback after failed merge also failed: {}", rollback_err);
            }
            return Err(e);
        }
    };

    let mut entry = MigrationLogEntry::new(
        LogStatus::Merged,
        format!(
            "merged donor {} into {}: {}",
            source_id, target_id, outcome.record.notes
        ),
    )
    .email(Some(plan.source.email.as_str()))
    .canonical_id(target_id);
    if let Some(legacy_id) = &plan.source.legacy_id {
        entry = entry.legacy_id(legacy_id.as_str());
    }
    audit.record(entry).await;

    log::info!(
        "Merged donor {} into {} ({} pledges, {})",
        source_id,
        target_id,
        outcome.record.pledges_moved,
        format_cents(outcome.record.total_amount_moved_cents)
    );
    Ok(outcome)
}

#[cfg(test)]
#[path = "account_merge_test.rs"]
mod tests;
