use super::*;
use crate::DuckDbBackend;

#[tokio::test]
async fn test_run_migrations_creates_store_tables() {
    let db = DuckDbBackend::in_memory().unwrap();
    let applied = run_migrations(&db).await.unwrap();
    assert_eq!(applied, MIGRATIONS.len());

    for table in [
        "donors",
        "campaigns",
        "rewards",
        "pledges",
        "pledges_backup",
        "addresses",
        "merged_accounts",
        "conflict_log",
        "migration_log",
        "schema_version",
    ] {
        assert!(db.relation_exists(table).await.unwrap(), "missing {table}");
    }
    assert_eq!(current_version(&db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_run_migrations_is_idempotent() {
    let db = DuckDbBackend::in_memory().unwrap();
    run_migrations(&db).await.unwrap();
    let second = run_migrations(&db).await.unwrap();
    assert_eq!(second, 0);
    assert_eq!(
        db.query_count("SELECT * FROM schema_version").await.unwrap(),
        MIGRATIONS.len()
    );
}

#[tokio::test]
async fn test_donor_ids_come_from_sequence() {
    let db = DuckDbBackend::in_memory().unwrap();
    run_migrations(&db).await.unwrap();

    let first = db
        .query_one(
            "INSERT INTO donors (email) VALUES (?) RETURNING id",
            &["a@x.com".into()],
        )
        .await
        .unwrap()
        .unwrap();
    let second = db
        .query_one(
            "INSERT INTO donors (email) VALUES (?) RETURNING id",
            &["b@x.com".into()],
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first[0].as_i64(), Some(1));
    assert_eq!(second[0].as_i64(), Some(2));
}
