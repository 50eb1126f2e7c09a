//! fm-migrate - Migration pipelines for Fundmerge
//!
//! This crate loads legacy exports into staging, resolves staged donor
//! records against the canonical donor table, reconciles staged pledges,
//! and performs operator-invoked account merges. Every decision is written
//! through the [`AuditLog`].

pub mod account_merge;
pub mod audit;
pub mod blob;
pub mod donors;
pub mod error;
pub mod identity;
pub mod pledges;
pub mod resolver;
pub mod staging;

pub use account_merge::{execute_merge, plan_merge, MergeOutcome, MergePlan};
pub use audit::{new_run_id, AuditLog};
pub use blob::{BlobStore, LocalBlobStore};
pub use error::{MigrateError, MigrateResult};
pub use identity::{identity_records, IdentityAccount, IdentityDirectory, JsonIdentityDirectory};
pub use pledges::{ApplySummary, CampaignTotals, CleanupSummary, PledgeReconciler, PledgeReport};
pub use resolver::{
    DonorResolver, ResolutionState, ResolveOutcome, ResolveSummary, ResolverPolicy, SkipReason,
};
pub use staging::{load_staged_donors, StageSummary, StagingLoader};
