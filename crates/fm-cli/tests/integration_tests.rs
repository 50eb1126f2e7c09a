//! Integration tests for Fundmerge

use fm_core::Config;
use fm_db::{run_migrations, Database, DuckDbBackend, SqlValue};
use fm_migrate::{
    execute_merge, identity_records, load_staged_donors, plan_merge, AuditLog, DonorResolver,
    IdentityDirectory, JsonIdentityDirectory, LocalBlobStore, PledgeReconciler, ResolutionState,
    ResolveSummary, ResolverPolicy, StagingLoader,
};
use std::path::Path;
use std::sync::Arc;

const SAMPLE_PROJECT: &str = "tests/fixtures/sample_project";

fn load_config() -> Config {
    Config::load_from_dir(Path::new(SAMPLE_PROJECT)).unwrap()
}

async fn migrated_db() -> Arc<dyn Database> {
    let db: Arc<dyn Database> = Arc::new(DuckDbBackend::in_memory().unwrap());
    run_migrations(&*db).await.unwrap();
    db
}

/// Stage every source of the sample project.
async fn stage_all(db: &Arc<dyn Database>, config: &Config) {
    let blobs = LocalBlobStore::new(config.blob_root_absolute(Path::new(SAMPLE_PROJECT)));
    let loader = StagingLoader::new(&**db, &blobs, config.batch_size);
    for source in &config.sources {
        loader.stage(source).await.unwrap();
    }
}

/// Resolve the staged donors of every source against one shared state.
async fn resolve_all_sources(
    db: &Arc<dyn Database>,
    config: &Config,
    audit: &mut AuditLog,
) -> Vec<ResolveSummary> {
    let policy = ResolverPolicy::from_config(config);
    let resolver = DonorResolver::new(&**db, &policy, None);
    let mut state = ResolutionState::load(&**db).await.unwrap();
    let mut summaries = Vec::new();
    for source in &config.sources {
        let records = load_staged_donors(&**db, &source.name).await.unwrap();
        summaries.push(resolver.resolve_all(&records, &mut state, audit).await);
    }
    summaries
}

async fn donor_id(db: &Arc<dyn Database>, email: &str) -> i64 {
    let row = db
        .query_one(
            "SELECT id FROM donors WHERE email = ? AND NOT deleted",
            &[email.into()],
        )
        .await
        .unwrap()
        .unwrap();
    row[0].as_i64().unwrap()
}

/// Test loading the sample project
#[test]
fn test_load_sample_project() {
    let config = load_config();

    assert_eq!(config.name, "sample_project");
    assert_eq!(config.source_names(), vec!["users", "kickstarter", "paypal"]);
    assert_eq!(config.batch_size, 2);
    let kickstarter = config.source("kickstarter").unwrap();
    assert_eq!(kickstarter.campaign_id, Some(1));
    assert_eq!(kickstarter.expected_total_cents(), Some(107500));
}

/// Test staging every sample export
#[tokio::test]
async fn test_stage_sample_exports() {
    let config = load_config();
    let db = migrated_db().await;
    let blobs = LocalBlobStore::new(config.blob_root_absolute(Path::new(SAMPLE_PROJECT)));
    let loader = StagingLoader::new(&*db, &blobs, config.batch_size);

    let users = loader.stage(config.source("users").unwrap()).await.unwrap();
    assert_eq!(users.rows_read, 9);
    assert_eq!(users.donors_staged, 9);
    assert_eq!(users.pledges_staged, 0);

    let kickstarter = loader
        .stage(config.source("kickstarter").unwrap())
        .await
        .unwrap();
    assert_eq!(kickstarter.rows_read, 5);
    assert_eq!(kickstarter.pledges_staged, 5);

    let paypal = loader.stage(config.source("paypal").unwrap()).await.unwrap();
    assert_eq!(paypal.pledges_staged, 3);

    let sum = db
        .query_one(
            "SELECT CAST(SUM(amount_cents) AS BIGINT) FROM staging_kickstarter_pledges",
            &[],
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sum[0].as_i64(), Some(111000));
}

/// Test resolving legacy users: creates, skips, and the in-run index
#[tokio::test]
async fn test_resolve_sample_donors() {
    let config = load_config();
    let db = migrated_db().await;
    stage_all(&db, &config).await;

    let mut audit = AuditLog::store_only(db.clone(), "it000001");
    let summaries = resolve_all_sources(&db, &config, &mut audit).await;
    let users = &summaries[0];

    // ada, grace, charles
    assert_eq!(users.created, 3);
    assert_eq!(users.duplicate_ids, 1);
    assert_eq!(users.administrative, 2);
    assert_eq!(users.watch_listed, 1);
    assert_eq!(users.missing_emails + users.invalid_emails, 1);
    // ADA@Example.com folds into ada
    assert_eq!(users.merged + users.unchanged, 1);
    assert_eq!(users.errors, 0);

    // Only alan is new from the kickstarter export; ks-4 has no email.
    let kickstarter = &summaries[1];
    assert_eq!(kickstarter.created, 1);
    assert_eq!(kickstarter.missing_emails, 1);

    assert_eq!(
        db.query_count("SELECT * FROM donors").await.unwrap(),
        4,
        "ada, grace, charles, alan"
    );
    assert_eq!(
        db.query_count("SELECT * FROM donors WHERE email LIKE '%admin%' OR email = 'ops@example.com'")
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        db.query_count("SELECT * FROM donors WHERE email = '2014-07-25 21:00:00'")
            .await
            .unwrap(),
        0
    );
    assert!(!audit.conflicts().is_empty());
}

/// Test that resolving the same staging twice changes nothing
#[tokio::test]
async fn test_resolve_is_idempotent() {
    let config = load_config();
    let db = migrated_db().await;
    stage_all(&db, &config).await;

    let mut audit = AuditLog::store_only(db.clone(), "it000002");
    resolve_all_sources(&db, &config, &mut audit).await;
    let second = resolve_all_sources(&db, &config, &mut audit).await;

    assert!(second.iter().all(|s| s.created == 0));
    assert_eq!(db.query_count("SELECT * FROM donors").await.unwrap(), 4);
}

/// Test the full pipeline: stage, resolve, report, apply, reapply
#[tokio::test]
async fn test_pledge_pipeline() {
    let config = load_config();
    let db = migrated_db().await;
    stage_all(&db, &config).await;
    db.execute("INSERT INTO rewards (campaign_id, name, amount_cents) VALUES (1, 'sticker pack', 2500)")
        .await
        .unwrap();

    let mut audit = AuditLog::store_only(db.clone(), "it000003");
    resolve_all_sources(&db, &config, &mut audit).await;

    let kickstarter = config.source("kickstarter").unwrap();
    let reconciler = PledgeReconciler::new(&*db, kickstarter).unwrap();

    let report = reconciler.report().await.unwrap();
    assert_eq!(report.staged_rows, 5);
    assert_eq!(report.staged_sum_cents, 111000);
    assert_eq!(report.candidates, 3);
    assert_eq!(report.would_insert, 3);
    assert_eq!(report.extras, 0);

    let applied = reconciler.apply(&mut audit).await.unwrap();
    assert_eq!(applied.inserted, 3);
    assert_eq!(applied.totals.total_cents, 107500);
    assert_eq!(applied.total_matches_expected(), Some(true));

    let ada = donor_id(&db, "ada@example.com").await;
    let row = db
        .query_one(
            "SELECT p.status, p.source, r.name FROM pledges p \
             LEFT JOIN rewards r ON r.id = p.reward_id WHERE p.donor_id = ?",
            &[SqlValue::Integer(ada)],
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row[0].as_str(), Some("collected"));
    assert_eq!(row[1].as_str(), Some("staging:kickstarter"));
    assert_eq!(row[2].as_str(), Some("sticker pack"));

    let again = reconciler.apply(&mut audit).await.unwrap();
    assert_eq!(again.inserted, 0);
    assert_eq!(again.already_present, 3);

    // Paypal carries a zero-amount row that never becomes a pledge.
    let paypal = PledgeReconciler::new(&*db, config.source("paypal").unwrap()).unwrap();
    let report = paypal.report().await.unwrap();
    assert_eq!(report.zero_amount_rows, 1);
    let applied = paypal.apply(&mut audit).await.unwrap();
    assert_eq!(applied.inserted, 2);
    assert_eq!(applied.totals.total_cents, 4050);
    assert_eq!(applied.total_matches_expected(), None);
}

/// Test cleanup of a pledge with no staged counterpart
#[tokio::test]
async fn test_pledge_cleanup() {
    let config = load_config();
    let db = migrated_db().await;
    stage_all(&db, &config).await;
    let mut audit = AuditLog::store_only(db.clone(), "it000004");
    resolve_all_sources(&db, &config, &mut audit).await;

    let reconciler = PledgeReconciler::new(&*db, config.source("kickstarter").unwrap()).unwrap();
    reconciler.apply(&mut audit).await.unwrap();

    let grace = donor_id(&db, "grace@example.com").await;
    db.execute_params(
        "INSERT INTO pledges (donor_id, campaign_id, amount_cents, status, source) \
         VALUES (?, 1, 999, 'collected', 'live')",
        &[SqlValue::Integer(grace)],
    )
    .await
    .unwrap();

    let report = reconciler.report().await.unwrap();
    assert_eq!(report.extras, 1);
    assert_eq!(report.extras_sum_cents, 999);

    let cleanup = reconciler.cleanup(&mut audit).await.unwrap();
    assert_eq!(cleanup.backed_up, 1);
    assert_eq!(cleanup.deleted, 1);
    assert_eq!(cleanup.deleted_cents, 999);

    let backup = db
        .query_one(
            "SELECT amount_cents, backup_reason FROM pledges_backup WHERE backup_run_id = 'it000004'",
            &[],
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(backup[0].as_i64(), Some(999));
    assert!(backup[1].as_str().unwrap().contains("kickstarter"));
    assert_eq!(
        reconciler.campaign_totals().await.unwrap().total_cents,
        107500
    );
}

/// Test identity accounts: backfill for known emails, new donors otherwise
#[tokio::test]
async fn test_identity_accounts() {
    let config = load_config();
    let db = migrated_db().await;
    stage_all(&db, &config).await;
    let mut audit = AuditLog::store_only(db.clone(), "it000005");
    resolve_all_sources(&db, &config, &mut audit).await;

    let path = config
        .identity_directory_absolute(Path::new(SAMPLE_PROJECT))
        .unwrap();
    let directory = JsonIdentityDirectory::load(&path).unwrap();
    assert_eq!(directory.accounts().len(), 2);

    let records = identity_records(&directory);
    let policy = ResolverPolicy::from_config(&config);
    let resolver = DonorResolver::new(&*db, &policy, Some(&directory as &dyn IdentityDirectory));
    let mut state = ResolutionState::load(&*db).await.unwrap();
    let summary = resolver.resolve_all(&records, &mut state, &mut audit).await;

    assert_eq!(summary.created, 1);
    assert_eq!(summary.merged, 1);
    let ada = db
        .query_one(
            "SELECT auth_user_id FROM donors WHERE email = 'ada@example.com'",
            &[],
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ada[0].as_str(), Some("a1b2"));
}

/// Test an operator merge after the pledge pipeline
#[tokio::test]
async fn test_merge_after_apply() {
    let config = load_config();
    let db = migrated_db().await;
    stage_all(&db, &config).await;
    let mut audit = AuditLog::store_only(db.clone(), "it000006");
    resolve_all_sources(&db, &config, &mut audit).await;
    let reconciler = PledgeReconciler::new(&*db, config.source("kickstarter").unwrap()).unwrap();
    reconciler.apply(&mut audit).await.unwrap();

    let alan = donor_id(&db, "alan@example.com").await;
    let ada = donor_id(&db, "ada@example.com").await;
    let plan = plan_merge(&*db, alan, ada).await.unwrap();
    assert_eq!(plan.pledges, 1);
    assert_eq!(plan.amount_cents, 5000);

    let outcome = execute_merge(&*db, &plan, "same household", &mut audit)
        .await
        .unwrap();
    assert_eq!(outcome.record.pledges_moved, 1);

    let totals = reconciler.campaign_totals().await.unwrap();
    assert_eq!(totals.total_cents, 107500);
    assert_eq!(totals.donors, 2);

    // The absorbed donor is soft-deleted, so a new run does not resurrect it.
    let state = ResolutionState::load(&*db).await.unwrap();
    assert_eq!(state.len(), 3);
}

/// Test the audit trail file written next to the store rows
#[tokio::test]
async fn test_audit_trail_file() {
    let config = load_config();
    let db = migrated_db().await;
    stage_all(&db, &config).await;

    let log_dir = tempfile::tempdir().unwrap();
    let mut audit = AuditLog::open(db.clone(), "it000007", log_dir.path()).unwrap();
    resolve_all_sources(&db, &config, &mut audit).await;
    let snapshot = audit.write_conflict_snapshot().unwrap().unwrap();

    let trail = std::fs::read_to_string(log_dir.path().join("migration.log")).unwrap();
    assert!(trail.lines().count() >= 9);
    assert!(trail.contains("ada@example.com"));
    let conflicts: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(snapshot).unwrap()).unwrap();
    assert!(!conflicts.as_array().unwrap().is_empty());
    assert_eq!(audit.write_failures(), 0);
}
