//! Fundmerge CLI - consolidate legacy donor and pledge exports

use anyhow::Result;
use clap::Parser;
use env_logger::Env;

mod cli;
mod commands;
mod context;

use cli::Cli;
use commands::common::ExitCode;
use commands::{donors, identities, merge_account, pledges, stage};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    if let Err(err) = run(&cli).await {
        match err.downcast_ref::<ExitCode>() {
            Some(code) => std::process::exit(code.0),
            None => {
                eprintln!("Error: {:#}", err);
                std::process::exit(1);
            }
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        cli::Commands::Stage(args) => stage::execute(args, &cli.global).await,
        cli::Commands::Donors(args) => donors::execute(args, &cli.global).await,
        cli::Commands::Identities(args) => identities::execute(args, &cli.global).await,
        cli::Commands::Pledges(args) => pledges::execute(args, &cli.global).await,
        cli::Commands::MergeAccount(args) => merge_account::execute(args, &cli.global).await,
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::init_from_env(Env::default().default_filter_or(default_level));
}
