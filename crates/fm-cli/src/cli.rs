//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Fundmerge - consolidate legacy donor and pledge exports
#[derive(Parser, Debug)]
#[command(name = "fm")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to project directory
    #[arg(short = 'p', long, global = true, default_value = ".")]
    pub project_dir: String,

    /// Override config file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Override the canonical store path
    #[arg(short, long, global = true, env = "FUNDMERGE_DATABASE")]
    pub target: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load legacy exports into their staging tables
    Stage(StageArgs),

    /// Resolve staged donor records against canonical donors
    Donors(DonorsArgs),

    /// Resolve identity-directory accounts as donors
    Identities(IdentitiesArgs),

    /// Reconcile staged pledges with a campaign
    Pledges(PledgesArgs),

    /// Merge one donor into another
    MergeAccount(MergeAccountArgs),
}

/// Arguments for the stage command
#[derive(Args, Debug)]
pub struct StageArgs {
    /// Source to stage (default: all, in config order)
    #[arg(short, long)]
    pub source: Option<String>,
}

/// Arguments for the donors command
#[derive(Args, Debug)]
pub struct DonorsArgs {
    /// Source to resolve (default: all, in config order)
    #[arg(short, long)]
    pub source: Option<String>,
}

/// Arguments for the identities command
#[derive(Args, Debug)]
pub struct IdentitiesArgs {
    /// Identity export to read instead of the configured one
    #[arg(short, long)]
    pub file: Option<String>,
}

/// Arguments for the pledges command
#[derive(Args, Debug)]
pub struct PledgesArgs {
    #[command(subcommand)]
    pub command: PledgesCommand,
}

#[derive(Subcommand, Debug)]
pub enum PledgesCommand {
    /// Show what apply would insert and which pledges have no staged counterpart
    Report(PledgeReportArgs),

    /// Insert staged pledges that are not yet in the campaign
    Apply(PledgeApplyArgs),
}

/// Arguments for `pledges report`
#[derive(Args, Debug)]
pub struct PledgeReportArgs {
    /// Pledge source to reconcile
    #[arg(short, long)]
    pub source: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Arguments for `pledges apply`
#[derive(Args, Debug)]
pub struct PledgeApplyArgs {
    /// Pledge source to reconcile
    #[arg(short, long)]
    pub source: String,

    /// Back up and delete campaign pledges with no staged counterpart
    #[arg(long, env = "FUNDMERGE_DELETE_EXTRAS")]
    pub delete_extras: bool,
}

/// Arguments for the merge-account command
#[derive(Args, Debug)]
pub struct MergeAccountArgs {
    /// Donor id to merge away
    #[arg(long)]
    pub from: i64,

    /// Donor id that absorbs the pledges
    #[arg(long)]
    pub into: i64,

    /// Why the accounts are being merged
    #[arg(long)]
    pub reason: String,

    /// Show the plan without writing
    #[arg(long)]
    pub dry_run: bool,
}

/// Report output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
