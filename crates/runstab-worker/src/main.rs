//! RunStab command-line binary.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use runstab_worker::cli::{Cli, Commands};
use runstab_worker::commands::{preview_command, stabilize_command};
use runstab_worker::{WorkerConfig, WorkerError};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = WorkerConfig::from_env();

    if let Err(e) = init_tracing(config.log_json) {
        eprintln!("Failed to initialize logging: {:#}", e);
        return ExitCode::FAILURE;
    }
    info!("Worker config: {:?}", config);

    let result = match cli.command {
        Commands::Stabilize(args) => stabilize_command(config, args).await.and_then(print_json),
        Commands::Preview(args) => preview_command(args).await.and_then(print_json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(use_json: bool) -> anyhow::Result<()> {
    let env_filter = EnvFilter::from_default_env()
        .add_directive("runstab=info".parse().context("invalid log directive")?);

    // Logs go to stderr; stdout carries the JSON result.
    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

fn print_json<T: Serialize>(value: T) -> Result<(), WorkerError> {
    let json = serde_json::to_string_pretty(&value)
        .map_err(|e| WorkerError::job_failed(format!("serializing result: {}", e)))?;
    println!("{}", json);
    Ok(())
}

fn report(err: &WorkerError) {
    if err.is_cancelled() {
        info!("Cancelled");
    } else if err.is_save_failure() {
        error!("Output written but not saved to the library: {}", err);
    } else {
        error!("{}", err);
    }
}
