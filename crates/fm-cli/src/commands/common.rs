//! Shared utilities for CLI commands

use fm_core::normalize::format_cents;
use fm_migrate::{MigrateError, ResolveSummary, SkipReason};
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;

/// Error type representing a non-zero process exit code.
///
/// Use `return Err(ExitCode(N).into())` instead of `std::process::exit(N)`
/// so that RAII destructors run and the audit trail is flushed.
#[derive(Debug)]
pub(crate) struct ExitCode(pub(crate) i32);

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Empty: the command already printed what went wrong.
        write!(f, "")
    }
}

impl std::error::Error for ExitCode {}

impl ExitCode {
    /// 4 when the store itself failed, 1 for anything else.
    pub(crate) fn for_error(e: &MigrateError) -> Self {
        if e.is_store_failure() {
            ExitCode(4)
        } else {
            ExitCode(1)
        }
    }
}

/// Progress bar over `len` records, hidden for tiny inputs.
pub(crate) fn progress_bar(len: usize, verbose: bool) -> Option<ProgressBar> {
    if verbose || len < 2 {
        return None;
    }
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    Some(pb)
}

/// Dollars with two decimals, no thousands separator.
pub(crate) fn money(cents: i64) -> String {
    format!("${}", format_cents(cents))
}

/// Print the per-category tally of a resolution run.
pub(crate) fn print_resolve_summary(summary: &ResolveSummary) {
    println!(
        "  {} created, {} merged, {} unchanged, {} skipped, {} errors",
        summary.created,
        summary.merged,
        summary.unchanged,
        summary.skipped(),
        summary.errors
    );
    let skips = [
        (SkipReason::DuplicateLegacyId, summary.duplicate_ids),
        (SkipReason::MissingEmail, summary.missing_emails),
        (SkipReason::InvalidEmail, summary.invalid_emails),
        (SkipReason::WatchListed, summary.watch_listed),
        (SkipReason::Administrative, summary.administrative),
    ];
    for (reason, count) in skips.iter().filter(|(_, n)| *n > 0) {
        println!("    skipped {}: {}", count, reason);
    }
    if summary.conflicts > 0 {
        println!("  {} conflict(s) logged", summary.conflicts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_display_is_empty() {
        assert_eq!(ExitCode(4).to_string(), "");
    }

    #[test]
    fn test_store_failures_exit_with_four() {
        let store = MigrateError::Db(fm_db::DbError::ExecutionError("disk full".into()));
        assert_eq!(ExitCode::for_error(&store).0, 4);

        let bad_input = MigrateError::UnknownSource {
            name: "nope".into(),
        };
        assert_eq!(ExitCode::for_error(&bad_input).0, 1);
    }

    #[test]
    fn test_money() {
        assert_eq!(money(125000), "$1250.00");
        assert_eq!(money(5), "$0.05");
    }

    #[test]
    fn test_progress_bar_hidden_when_verbose() {
        assert!(progress_bar(100, true).is_none());
        assert!(progress_bar(1, false).is_none());
        assert!(progress_bar(100, false).is_some());
    }
}
