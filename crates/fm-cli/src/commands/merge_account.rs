//! Merge-account command implementation

use anyhow::Result;
use fm_core::CanonicalDonor;
use fm_migrate::{execute_merge, plan_merge, MergePlan};

use crate::cli::{GlobalArgs, MergeAccountArgs};
use crate::commands::common::{money, ExitCode};
use crate::context::RuntimeContext;

/// Execute the merge-account command
pub async fn execute(args: &MergeAccountArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global).await?;

    let plan = match plan_merge(&*ctx.db, args.from, args.into).await {
        Ok(plan) => plan,
        Err(e) => {
            println!("✗ {}", e);
            return Err(ExitCode::for_error(&e).into());
        }
    };
    print_plan(&plan);

    if args.dry_run {
        println!("\nDry run: nothing written");
        return Ok(());
    }

    let mut audit = ctx.open_audit()?;
    match execute_merge(&*ctx.db, &plan, &args.reason, &mut audit).await {
        Ok(outcome) => {
            println!(
                "\n  ✓ merge {} ({} pledges, {} moved; {} address(es) moved)",
                outcome.merge_id,
                outcome.record.pledges_moved,
                money(outcome.record.total_amount_moved_cents),
                outcome.addresses_moved
            );
            Ok(())
        }
        Err(e) => {
            println!("\n  ✗ merge - {}", e);
            Err(ExitCode::for_error(&e).into())
        }
    }
}

fn describe(donor: &CanonicalDonor) -> String {
    let name = donor
        .full_name
        .clone()
        .or_else(|| match (&donor.first_name, &donor.last_name) {
            (Some(first), Some(last)) => Some(format!("{} {}", first, last)),
            (Some(first), None) => Some(first.clone()),
            (None, Some(last)) => Some(last.clone()),
            (None, None) => None,
        });
    match name {
        Some(name) => format!("{} <{}> ({})", donor.id, donor.email, name),
        None => format!("{} <{}>", donor.id, donor.email),
    }
}

fn print_plan(plan: &MergePlan) {
    println!("Merge plan:");
    println!("  from:      {}", describe(&plan.source));
    println!("  into:      {}", describe(&plan.target));
    println!(
        "  pledges:   {} ({})",
        plan.pledges,
        money(plan.amount_cents)
    );
    println!("  addresses: {}", plan.address_decision());
}
