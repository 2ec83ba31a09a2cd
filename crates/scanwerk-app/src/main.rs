// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanwerk — split scanned sheets of photographs into content-addressed photos
//
// Entry point. Initialises logging, loads the configuration, applies
// command-line overrides and dispatches the command.

mod cli;
mod services;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use scanwerk_core::error::Result;
use scanwerk_core::types::ContentHash;

use cli::{Cli, Command};
use services::app_services::AppServices;
use services::config_file;
use services::inputs::expand_inputs;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    tracing::info!("Scanwerk starting");

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "scanwerk failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = config_file::load_or_init(&cli.config);
    cli.apply(&mut config);
    let services = AppServices::init(config).await?;

    match cli.command {
        Command::Build { mode, inputs } => {
            let report = services.build(mode.into(), expand_inputs(&inputs)).await?;
            println!(
                "{} jobs completed ({} scans, {} photos), {} failed",
                report.completed, report.scans, report.photos, report.failed
            );
            Ok(exit_code(report.failed))
        }
        Command::Hash { inputs } => {
            let results = services.hash(expand_inputs(&inputs)).await;
            Ok(exit_code(print_ids(results)))
        }
        Command::Archive { inputs } => {
            let results = services.archive(expand_inputs(&inputs)).await;
            Ok(exit_code(print_ids(results)))
        }
    }
}

/// Print `id  path` per success, log failures; returns the failure count.
fn print_ids(results: Vec<(PathBuf, Result<ContentHash>)>) -> usize {
    let mut failed = 0;
    for (path, result) in results {
        match result {
            Ok(id) => println!("{id}  {}", path.display()),
            Err(e) => {
                failed += 1;
                error!(path = %path.display(), error = %e, "skipped");
            }
        }
    }
    failed
}

fn exit_code(failed: usize) -> ExitCode {
    if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
