use super::*;
use crate::blob::LocalBlobStore;
use crate::test_support::migrated_db;
use fm_core::SourceFormat;
use std::path::Path;

const USERS_TSV: &str = "\
1\tada@x.com\tada\tlovelace\t\\N\tada\t2013-04-01 10:00:00\tuser
2\tBOB@X.COM\tbob\t\\N\t\\N\tbobby\t0000-00-00 00:00:00\tuser
3\tshort\trow
4\tstaff@x.com\tstaff\t\\N\t\\N\tstaff\t2013-01-01 00:00:00\tadmin\tauth-4
";

const KICKSTARTER_CSV: &str = "\
Backer Id,Backer Name,Email,Pledge Amount,Pledged At,Reward Title
k1,Ada Lovelace,ada@x.com,$25.00,2014-07-25 21:00:00,Sticker
k2,Bob,bob@x.com,\"1,025.50\",2014-07-26 08:00:00,
";

fn source(name: &str, file: &str, format: SourceFormat) -> SourceConfig {
    SourceConfig {
        name: SourceName::new(name),
        file: file.to_string(),
        format,
        campaign_id: if format.yields_pledges() { Some(1) } else { None },
        expected_total: None,
    }
}

fn write(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

#[tokio::test]
async fn test_stage_legacy_users() {
    let db = migrated_db().await;
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "users.tsv", USERS_TSV);
    let blobs = LocalBlobStore::new(dir.path());
    let loader = StagingLoader::new(&*db, &blobs, 1000);

    let summary = loader
        .stage(&source("users", "users.tsv", SourceFormat::LegacyUsers))
        .await
        .unwrap();

    assert_eq!(summary.rows_read, 4);
    assert_eq!(summary.donors_staged, 3);
    assert_eq!(summary.pledges_staged, 0);
    assert_eq!(summary.rows_skipped, 1);
    assert_eq!(summary.write_failures, 0);
    assert!(!db.relation_exists("staging_users_pledges").await.unwrap());

    let records = load_staged_donors(&*db, &SourceName::new("users"))
        .await
        .unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].legacy_id, "1");
    assert_eq!(records[0].full_name.as_deref(), Some("Ada Lovelace"));
    assert!(records[0].created_at.is_some());
    assert_eq!(records[1].email.as_deref(), Some("bob@x.com"));
    assert_eq!(records[1].created_at, None);
    assert!(records[2].administrative);
    assert_eq!(records[2].auth_user_id.as_deref(), Some("auth-4"));
}

#[tokio::test]
async fn test_stage_header_keyed_pledges() {
    let db = migrated_db().await;
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "kickstarter.csv", KICKSTARTER_CSV);
    let blobs = LocalBlobStore::new(dir.path());
    let loader = StagingLoader::new(&*db, &blobs, 1000);

    let summary = loader
        .stage(&source(
            "kickstarter",
            "kickstarter.csv",
            SourceFormat::HeaderKeyed,
        ))
        .await
        .unwrap();

    assert_eq!(summary.rows_read, 2);
    assert_eq!(summary.donors_staged, 2);
    assert_eq!(summary.pledges_staged, 2);

    let rows = db
        .query_rows(
            "SELECT email, amount_cents, pledge_date, reward_name FROM staging_kickstarter_pledges ORDER BY line_no",
            &[],
        )
        .await
        .unwrap();
    assert_eq!(rows[0][0].as_str(), Some("ada@x.com"));
    assert_eq!(rows[0][1].as_i64(), Some(2500));
    assert_eq!(rows[0][2].as_str(), Some("2014-07-25 21:00:00"));
    assert_eq!(rows[0][3].as_str(), Some("Sticker"));
    assert_eq!(rows[1][1].as_i64(), Some(102_550));
    assert!(rows[1][3].is_null());

    let records = load_staged_donors(&*db, &SourceName::new("kickstarter"))
        .await
        .unwrap();
    assert_eq!(records[0].legacy_id, "k1");
    assert_eq!(records[0].first_name.as_deref(), Some("Ada"));
}

async fn staging_snapshot(db: &dyn Database) -> (Vec<Vec<SqlValue>>, Vec<Vec<SqlValue>>) {
    let donors = db
        .query_rows("SELECT * FROM staging_kickstarter_donors ORDER BY line_no", &[])
        .await
        .unwrap();
    let pledges = db
        .query_rows("SELECT * FROM staging_kickstarter_pledges ORDER BY line_no", &[])
        .await
        .unwrap();
    (donors, pledges)
}

#[tokio::test]
async fn test_restaging_unchanged_file_is_identical() {
    let db = migrated_db().await;
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "kickstarter.csv", KICKSTARTER_CSV);
    let blobs = LocalBlobStore::new(dir.path());
    let loader = StagingLoader::new(&*db, &blobs, 1000);
    let src = source("kickstarter", "kickstarter.csv", SourceFormat::HeaderKeyed);

    let first_summary = loader.stage(&src).await.unwrap();
    let first = staging_snapshot(&*db).await;
    let second_summary = loader.stage(&src).await.unwrap();
    let second = staging_snapshot(&*db).await;

    assert_eq!(first_summary, second_summary);
    assert_eq!(first, second);
    assert_eq!(second.0.len(), 2);
}

#[tokio::test]
async fn test_restaging_replaces_previous_contents() {
    let db = migrated_db().await;
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "users.tsv", USERS_TSV);
    let blobs = LocalBlobStore::new(dir.path());
    let loader = StagingLoader::new(&*db, &blobs, 1000);
    let src = source("users", "users.tsv", SourceFormat::LegacyUsers);

    loader.stage(&src).await.unwrap();
    write(
        dir.path(),
        "users.tsv",
        "9\tnew@x.com\tnew\t\\N\t\\N\tnew\t2015-01-01 00:00:00\tuser\n",
    );
    loader.stage(&src).await.unwrap();

    let records = load_staged_donors(&*db, &SourceName::new("users"))
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].legacy_id, "9");
}

#[tokio::test]
async fn test_small_batches_stage_every_row() {
    let db = migrated_db().await;
    let dir = tempfile::tempdir().unwrap();
    let body: String = (1..=7)
        .map(|i| format!("2014-01-0{i},Donor {i},d{i}@x.com,{i}0.00\n"))
        .collect();
    write(dir.path(), "paypal.txt", &body);
    let blobs = LocalBlobStore::new(dir.path());
    let loader = StagingLoader::new(&*db, &blobs, 3);

    let summary = loader
        .stage(&source("paypal", "paypal.txt", SourceFormat::PositionalPledges))
        .await
        .unwrap();

    assert_eq!(summary.donors_staged, 7);
    assert_eq!(summary.pledges_staged, 7);
    let total = db
        .query_one(
            "SELECT CAST(SUM(amount_cents) AS BIGINT) FROM staging_paypal_pledges",
            &[],
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(total[0].as_i64(), Some(28_000));
}

#[tokio::test]
async fn test_missing_file_is_fatal() {
    let db = migrated_db().await;
    let dir = tempfile::tempdir().unwrap();
    let blobs = LocalBlobStore::new(dir.path());
    let loader = StagingLoader::new(&*db, &blobs, 1000);

    let err = loader
        .stage(&source("users", "users.tsv", SourceFormat::LegacyUsers))
        .await
        .unwrap_err();
    assert!(matches!(err, MigrateError::MissingFile { .. }));
    assert!(!db.relation_exists("staging_users_donors").await.unwrap());
}

#[tokio::test]
async fn test_header_without_email_column_is_fatal() {
    let db = migrated_db().await;
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "bad.csv", "Backer,Pledge Amount\nx,5\n");
    let blobs = LocalBlobStore::new(dir.path());
    let loader = StagingLoader::new(&*db, &blobs, 1000);

    let err = loader
        .stage(&source("bad", "bad.csv", SourceFormat::HeaderKeyed))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MigrateError::Core(fm_core::CoreError::MissingColumn { .. })
    ));
}

#[tokio::test]
async fn test_load_before_stage_is_not_staged() {
    let db = migrated_db().await;
    let err = load_staged_donors(&*db, &SourceName::new("users"))
        .await
        .unwrap_err();
    assert!(matches!(err, MigrateError::NotStaged { .. }));
}

#[tokio::test]
async fn test_failed_batch_retries_row_by_row() {
    let db = migrated_db().await;
    let table = SourceName::new("users").donor_staging_table();
    // The table survives the reset, so its constraint rejects one row.
    let ddl = donor_table_ddl(&table);
    let ddl = format!(
        "{}, CHECK (email <> 'bad@x.com'))",
        ddl.trim_end().trim_end_matches(')')
    );
    db.execute(&ddl).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "users.tsv",
        "\
1\tada@x.com\tada\tlovelace\t\\N\tada\t2013-04-01 10:00:00\tuser
2\tbad@x.com\tbad\t\\N\t\\N\tbad\t2013-04-01 10:00:00\tuser
3\tcy@x.com\tcy\t\\N\t\\N\tcy\t2013-04-01 10:00:00\tuser
",
    );
    let blobs = LocalBlobStore::new(dir.path());
    let loader = StagingLoader::new(&*db, &blobs, 3);

    let summary = loader
        .stage(&source("users", "users.tsv", SourceFormat::LegacyUsers))
        .await
        .unwrap();

    assert_eq!(summary.rows_read, 3);
    assert_eq!(summary.donors_staged, 2);
    assert_eq!(summary.write_failures, 1);
    assert_eq!(summary.rows_skipped, 0);

    let records = load_staged_donors(&*db, &SourceName::new("users"))
        .await
        .unwrap();
    let ids: Vec<&str> = records.iter().map(|r| r.legacy_id.as_str()).collect();
    assert_eq!(ids, vec!["1", "3"]);
}
