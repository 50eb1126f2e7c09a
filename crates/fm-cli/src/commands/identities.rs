//! Identities command implementation

use anyhow::{Context, Result};
use fm_migrate::{
    identity_records, DonorResolver, IdentityDirectory, ResolutionState, ResolverPolicy,
};

use crate::cli::{GlobalArgs, IdentitiesArgs};
use crate::commands::common::{print_resolve_summary, ExitCode};
use crate::commands::donors::{finish_run, resolve_records};
use crate::context::RuntimeContext;

/// Execute the identities command
pub async fn execute(args: &IdentitiesArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global).await?;
    let directory = match ctx.identity_directory(args.file.as_deref())? {
        Some(directory) => directory,
        None => {
            println!("✗ No identity export configured (set identity_directory or pass --file)");
            return Err(ExitCode(1).into());
        }
    };

    let records = identity_records(&directory);
    let policy = ResolverPolicy::from_config(&ctx.config);
    let resolver = DonorResolver::new(
        &*ctx.db,
        &policy,
        Some(&directory as &dyn IdentityDirectory),
    );
    let mut state = ResolutionState::load(&*ctx.db)
        .await
        .context("Failed to load canonical donors")?;
    let mut audit = ctx.open_audit()?;

    println!(
        "Resolving {} identity account(s)...\n",
        directory.accounts().len()
    );
    let summary = resolve_records(&ctx, &resolver, &records, &mut state, &mut audit).await;
    println!("  ✓ identity ({} records)", records.len());
    print_resolve_summary(&summary);

    finish_run(&audit, &summary)
}
