use super::*;

#[test]
fn test_parse_minimal_config() {
    let config: Config = serde_yaml::from_str("name: legacy_import").unwrap();
    assert_eq!(config.name, "legacy_import");
    assert_eq!(config.database.path, "target/fundmerge.duckdb");
    assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
    assert_eq!(config.watch_list_policy, WatchListPolicy::Skip);
    assert!(config.sources.is_empty());

    let root = PathBuf::from("/tmp/project");
    assert_eq!(config.log_dir_absolute(&root), root.join("target/logs"));
    assert_eq!(config.blob_root_absolute(&root), root.join("exports"));
}

#[test]
fn test_parse_full_config() {
    let yaml = r#"
name: legacy_import
database:
  path: ":memory:"
blob_root: dumps
identity_directory: dumps/auth_users.json
watch_list:
  - Dup@Example.com
watch_list_policy: warn
administrative:
  emails: [ops@example.com]
  legacy_ids: ["1"]
batch_size: 250
sources:
  - name: legacy_users
    file: users.tsv
    format: legacy_users
  - name: kickstarter
    file: kickstarter.csv
    format: header_keyed
    campaign_id: 1
    expected_total: "1,250.00"
"#;
    let config: Config = serde_yaml::from_str(yaml).unwrap();
    config.validate().unwrap();

    assert_eq!(config.source_names(), vec!["legacy_users", "kickstarter"]);
    assert_eq!(config.watch_list_policy, WatchListPolicy::Warn);
    assert_eq!(config.batch_size, 250);
    assert_eq!(
        config.database_path_absolute(Path::new("/tmp/x")),
        ":memory:"
    );

    let ks = config.source("kickstarter").unwrap();
    assert_eq!(ks.format, SourceFormat::HeaderKeyed);
    assert_eq!(ks.campaign_id, Some(1));
    assert_eq!(ks.expected_total_cents(), Some(125_000));
    assert!(config.source("paypal").is_none());
}

#[test]
fn test_watch_list_compares_normalized_emails() {
    let config: Config =
        serde_yaml::from_str("name: t\nwatch_list: [' Dup@Example.com ']").unwrap();
    assert!(config.is_watch_listed("dup@example.com"));
    assert!(!config.is_watch_listed("other@example.com"));
}

#[test]
fn test_administrative_matches_email_or_id() {
    let admin = AdministrativeConfig {
        emails: vec!["Ops@Example.com".to_string()],
        legacy_ids: vec!["7".to_string()],
    };
    assert!(admin.matches(Some("ops@example.com"), "100"));
    assert!(admin.matches(None, "7"));
    assert!(!admin.matches(Some("donor@example.com"), "100"));
}

#[test]
fn test_unknown_field_rejected() {
    let result: Result<Config, _> = serde_yaml::from_str("name: t\nmodel_paths: [x]");
    assert!(result.is_err());
}

#[test]
fn test_validate_rejects_duplicate_sources() {
    let yaml = r#"
name: t
sources:
  - { name: a, file: a.csv, format: legacy_users }
  - { name: a, file: b.csv, format: legacy_users }
"#;
    let config: Config = serde_yaml::from_str(yaml).unwrap();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("Duplicate source name"));
}

#[test]
fn test_validate_requires_campaign_for_pledge_sources() {
    let yaml = r#"
name: t
sources:
  - { name: paypal, file: paypal.txt, format: positional_pledges }
"#;
    let config: Config = serde_yaml::from_str(yaml).unwrap();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("campaign_id"));
}

#[test]
fn test_validate_rejects_unsafe_source_name() {
    let yaml = r#"
name: t
sources:
  - { name: "Kick-Starter", file: k.csv, format: legacy_users }
"#;
    let config: Config = serde_yaml::from_str(yaml).unwrap();
    assert!(config.validate().is_err());
}

#[test]
fn test_load_from_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("fundmerge.yml"), "name: from_disk\n").unwrap();
    let config = Config::load_from_dir(dir.path()).unwrap();
    assert_eq!(config.name, "from_disk");
}

#[test]
fn test_load_from_dir_missing() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load_from_dir(dir.path()).unwrap_err();
    assert!(matches!(err, CoreError::ConfigNotFound { .. }));
}
