use super::*;
use clap::CommandFactory;

#[test]
fn verify_cli_args() {
    // Validates the entire command tree: short flag conflicts,
    // duplicate args, and other clap definition errors.
    Cli::command().debug_assert();
}

#[test]
fn test_parse_pledges_apply() {
    let cli = Cli::try_parse_from([
        "fm",
        "-p",
        "project",
        "pledges",
        "apply",
        "--source",
        "kickstarter",
        "--delete-extras",
    ])
    .unwrap();

    assert_eq!(cli.global.project_dir, "project");
    match cli.command {
        Commands::Pledges(PledgesArgs {
            command: PledgesCommand::Apply(args),
        }) => {
            assert_eq!(args.source, "kickstarter");
            assert!(args.delete_extras);
        }
        other => panic!("unexpected command: {:?}", other),
    }
}

#[test]
fn test_parse_merge_account() {
    let cli = Cli::try_parse_from([
        "fm",
        "merge-account",
        "--from",
        "12",
        "--into",
        "7",
        "--reason",
        "duplicate signup",
        "--dry-run",
    ])
    .unwrap();

    match cli.command {
        Commands::MergeAccount(args) => {
            assert_eq!(args.from, 12);
            assert_eq!(args.into, 7);
            assert_eq!(args.reason, "duplicate signup");
            assert!(args.dry_run);
        }
        other => panic!("unexpected command: {:?}", other),
    }
}

#[test]
fn test_merge_account_requires_reason() {
    assert!(Cli::try_parse_from(["fm", "merge-account", "--from", "1", "--into", "2"]).is_err());
}

#[test]
fn test_report_output_defaults_to_text() {
    let cli = Cli::try_parse_from(["fm", "pledges", "report", "-s", "paypal"]).unwrap();
    match cli.command {
        Commands::Pledges(PledgesArgs {
            command: PledgesCommand::Report(args),
        }) => assert_eq!(args.output, OutputFormat::Text),
        other => panic!("unexpected command: {:?}", other),
    }
}
