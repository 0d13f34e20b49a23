//! subrecon - concurrent subdomain reconnaissance orchestrator.
//!
//! Thin binary entry point that builds the Tokio runtime and delegates to
//! the driver.

use anyhow::{Context, Result};
use clap::Parser;

mod cli;
mod driver;
mod main_helpers;
mod output;
mod progress;

fn main() -> std::process::ExitCode {
    let args = cli::Cli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build Tokio runtime")
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Error: {err:?}");
            return std::process::ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args)) {
        Ok(true) => std::process::ExitCode::SUCCESS,
        Ok(false) => std::process::ExitCode::FAILURE,
        Err(err) => {
            eprintln!("Error: {err:?}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run(args: cli::Cli) -> Result<bool> {
    main_helpers::load_environment();
    main_helpers::initialize_tracing(args.quiet);
    driver::run(args).await
}
