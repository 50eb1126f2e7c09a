//! Pledges command implementation

use anyhow::Result;
use fm_core::SourceConfig;
use fm_migrate::{ApplySummary, PledgeReconciler, PledgeReport};

use crate::cli::{
    GlobalArgs, OutputFormat, PledgeApplyArgs, PledgeReportArgs, PledgesArgs, PledgesCommand,
};
use crate::commands::common::{money, ExitCode};
use crate::context::RuntimeContext;

/// Execute a pledges subcommand
pub async fn execute(args: &PledgesArgs, global: &GlobalArgs) -> Result<()> {
    match &args.command {
        PledgesCommand::Report(args) => report(args, global).await,
        PledgesCommand::Apply(args) => apply(args, global).await,
    }
}

async fn report(args: &PledgeReportArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global).await?;
    let source = ctx.source(&args.source)?;
    let reconciler = reconciler(&ctx, source)?;

    let report = match reconciler.report().await {
        Ok(report) => report,
        Err(e) => {
            println!("✗ {} - {}", source.name, e);
            return Err(ExitCode::for_error(&e).into());
        }
    };

    match args.output {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)?;
            println!("{}", json);
        }
        OutputFormat::Text => print_report(&report),
    }
    Ok(())
}

async fn apply(args: &PledgeApplyArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global).await?;
    let source = ctx.source(&args.source)?;
    let reconciler = reconciler(&ctx, source)?;
    let mut audit = ctx.open_audit()?;

    println!(
        "Applying {} pledges to campaign {}...\n",
        source.name,
        reconciler.campaign_id()
    );

    let summary = match reconciler.apply(&mut audit).await {
        Ok(summary) => summary,
        Err(e) => {
            println!("  ✗ {} - {}", source.name, e);
            return Err(ExitCode::for_error(&e).into());
        }
    };
    println!(
        "  ✓ {} ({} inserted, {} already present, {} unmatched rows)",
        source.name, summary.inserted, summary.already_present, summary.unmatched_rows
    );

    if args.delete_extras {
        let shared = sources_sharing_campaign(&ctx.config.sources, source);
        if !shared.is_empty() {
            println!(
                "  Warning: campaign {} is also fed by {}; their pledges count as extras here",
                reconciler.campaign_id(),
                shared.join(", ")
            );
        }
        match reconciler.cleanup(&mut audit).await {
            Ok(cleanup) => println!(
                "  ✓ cleanup ({} backed up, {} deleted, {})",
                cleanup.backed_up,
                cleanup.deleted,
                money(cleanup.deleted_cents)
            ),
            Err(e) => {
                println!("  ✗ cleanup - {}", e);
                return Err(ExitCode::for_error(&e).into());
            }
        }
    }

    // Totals after cleanup so the expected-total check sees the final state.
    let totals = reconciler.campaign_totals().await?;
    let summary = ApplySummary { totals, ..summary };
    print_totals(&summary);

    if audit.write_failures() > 0 {
        eprintln!(
            "Warning: {} audit record(s) could not be written",
            audit.write_failures()
        );
    }
    Ok(())
}

fn reconciler<'a>(
    ctx: &'a RuntimeContext,
    source: &'a SourceConfig,
) -> Result<PledgeReconciler<'a>> {
    match PledgeReconciler::new(&*ctx.db, source) {
        Ok(reconciler) => Ok(reconciler),
        Err(e) => {
            println!("✗ {}", e);
            Err(ExitCode::for_error(&e).into())
        }
    }
}

/// Other pledge sources configured against the same campaign.
fn sources_sharing_campaign(sources: &[SourceConfig], source: &SourceConfig) -> Vec<String> {
    sources
        .iter()
        .filter(|s| s.name != source.name && s.campaign_id.is_some())
        .filter(|s| s.campaign_id == source.campaign_id)
        .map(|s| s.name.to_string())
        .collect()
}

struct ReportLine<'a> {
    label: &'a str,
    value: String,
}

fn report_lines(report: &PledgeReport) -> Vec<ReportLine<'static>> {
    let line = |label, value: String| ReportLine { label, value };
    vec![
        line("staged rows", report.staged_rows.to_string()),
        line("staged total", money(report.staged_sum_cents)),
        line("unique emails", report.staged_unique_emails.to_string()),
        line("matched emails", report.matched_emails.to_string()),
        line("zero-amount rows", report.zero_amount_rows.to_string()),
        line("candidate pledges", report.candidates.to_string()),
        line("already present", report.existing_pairs.to_string()),
        line("would insert", report.would_insert.to_string()),
        line(
            "extras",
            format!("{} ({})", report.extras, money(report.extras_sum_cents)),
        ),
    ]
}

fn print_report(report: &PledgeReport) {
    println!(
        "Pledge report: {} -> campaign {}\n",
        report.source, report.campaign_id
    );
    let lines = report_lines(report);
    let width = lines.iter().map(|l| l.label.len()).max().unwrap_or(0);
    for l in &lines {
        println!("  {:<width$}  {}", l.label, l.value, width = width);
    }
    if report.extras > 0 {
        println!("\nRun `fm pledges apply --delete-extras` to back up and remove extras.");
    }
}

fn print_totals(summary: &ApplySummary) {
    println!(
        "\nCampaign {}: {} pledges from {} donors, {}",
        summary.campaign_id,
        summary.totals.pledges,
        summary.totals.donors,
        money(summary.totals.total_cents)
    );
    match (summary.total_matches_expected(), summary.expected_total_cents) {
        (Some(true), Some(expected)) => println!("  ✓ matches expected total {}", money(expected)),
        (Some(false), Some(expected)) => println!(
            "  ✗ expected total {} differs by {}",
            money(expected),
            money(summary.totals.total_cents - expected)
        ),
        _ => {}
    }
}
