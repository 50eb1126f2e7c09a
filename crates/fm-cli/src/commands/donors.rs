//! Donors command implementation

use anyhow::{Context, Result};
use fm_core::NormalizedDonorRecord;
use fm_migrate::{
    load_staged_donors, AuditLog, DonorResolver, IdentityDirectory, ResolutionState,
    ResolveOutcome, ResolveSummary, ResolverPolicy,
};

use crate::cli::{DonorsArgs, GlobalArgs};
use crate::commands::common::{print_resolve_summary, progress_bar, ExitCode};
use crate::context::RuntimeContext;

/// Execute the donors command
pub async fn execute(args: &DonorsArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global).await?;
    let sources = ctx.select_sources(args.source.as_deref())?;
    let identity = ctx.identity_directory(None)?;
    let policy = ResolverPolicy::from_config(&ctx.config);
    let resolver = DonorResolver::new(
        &*ctx.db,
        &policy,
        identity.as_ref().map(|d| d as &dyn IdentityDirectory),
    );

    let mut state = ResolutionState::load(&*ctx.db)
        .await
        .context("Failed to load canonical donors")?;
    ctx.verbose(&format!("Loaded {} canonical donor(s)", state.len()));
    let mut audit = ctx.open_audit()?;

    println!("Resolving donors from {} source(s)...\n", sources.len());

    let mut total = ResolveSummary::default();
    for source in sources {
        let records = match load_staged_donors(&*ctx.db, &source.name).await {
            Ok(records) => records,
            Err(e) => {
                println!("  ✗ {} - {}", source.name, e);
                return Err(ExitCode::for_error(&e).into());
            }
        };
        let summary = resolve_records(&ctx, &resolver, &records, &mut state, &mut audit).await;
        println!("  ✓ {} ({} records)", source.name, records.len());
        print_resolve_summary(&summary);
        total.absorb(&summary);
    }

    finish_run(&audit, &total)
}

/// Resolve `records` in order with a progress bar, returning the tally.
pub(crate) async fn resolve_records(
    ctx: &RuntimeContext,
    resolver: &DonorResolver<'_>,
    records: &[NormalizedDonorRecord],
    state: &mut ResolutionState,
    audit: &mut AuditLog,
) -> ResolveSummary {
    let pb = progress_bar(records.len(), ctx.verbose);
    let mut summary = ResolveSummary::default();
    for record in records {
        if let Some(pb) = &pb {
            pb.set_message(record.legacy_id.to_string());
        }
        let outcome = resolver.resolve(record, state, audit, &mut summary).await;
        if let ResolveOutcome::Skipped(reason) = outcome {
            ctx.verbose(&format!("skipped {}: {}", record.legacy_id, reason));
        }
        if let Some(pb) = &pb {
            pb.inc(1);
        }
    }
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    summary
}

/// Print the run tally, write the conflict snapshot, and flag audit gaps.
pub(crate) fn finish_run(audit: &AuditLog, total: &ResolveSummary) -> Result<()> {
    println!();
    println!(
        "Run {}: {} new, {} updated, {} unchanged, {} skipped, {} conflicts, {} errors",
        audit.run_id(),
        total.created,
        total.merged,
        total.unchanged,
        total.skipped(),
        total.conflicts,
        total.errors
    );

    match audit.write_conflict_snapshot() {
        Ok(Some(path)) => println!("Conflict snapshot written to {}", path.display()),
        Ok(None) => {}
        Err(e) => eprintln!("Warning: failed to write conflict snapshot: {}", e),
    }
    if audit.write_failures() > 0 {
        eprintln!(
            "Warning: {} audit record(s) could not be written",
            audit.write_failures()
        );
    }
    Ok(())
}
