//! Stage command implementation

use anyhow::Result;
use fm_migrate::StagingLoader;
use std::time::Instant;

use crate::cli::{GlobalArgs, StageArgs};
use crate::commands::common::ExitCode;
use crate::context::RuntimeContext;

/// Execute the stage command
pub async fn execute(args: &StageArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global).await?;
    let sources = ctx.select_sources(args.source.as_deref())?;
    let blobs = ctx.blob_store();
    let loader = StagingLoader::new(&*ctx.db, &blobs, ctx.config.batch_size);

    println!("Staging {} source(s)...\n", sources.len());

    let mut write_failures = 0;
    for source in sources {
        let started = Instant::now();
        match loader.stage(source).await {
            Ok(summary) => {
                let pledges = if source.format.yields_pledges() {
                    format!(", {} pledges", summary.pledges_staged)
                } else {
                    String::new()
                };
                println!(
                    "  ✓ {} ({} rows read, {} donors{}, {} skipped) [{}ms]",
                    source.name,
                    summary.rows_read,
                    summary.donors_staged,
                    pledges,
                    summary.rows_skipped,
                    started.elapsed().as_millis()
                );
                if summary.write_failures > 0 {
                    println!(
                        "    {} row(s) failed to write, see log output",
                        summary.write_failures
                    );
                }
                write_failures += summary.write_failures;
            }
            Err(e) => {
                println!("  ✗ {} - {}", source.name, e);
                return Err(ExitCode::for_error(&e).into());
            }
        }
    }

    println!();
    if write_failures > 0 {
        println!("Staged with {} write failure(s)", write_failures);
    } else {
        println!("Staging complete");
    }
    Ok(())
}
