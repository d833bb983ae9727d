use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use clap::error::ErrorKind;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use treewalk::cli::{Cli, Config};
use treewalk::model::ShutdownReason;
use treewalk::report::ReportSink;
use treewalk::scanner::Scanner;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return match error.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    setup_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!("{error:#}");
            eprintln!("Error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::from_cli(cli).context("invalid configuration")?;

    let sink = ReportSink::create(&config.output).context("failed to open report")?;
    let scanner = Scanner::new(&config.walk, sink).context("failed to initialize walker")?;

    let shutdown = scanner.shutdown_handle();
    ctrlc::set_handler(move || {
        if shutdown.trigger(ShutdownReason::Interrupted) {
            eprintln!("\nInterrupt received, shutting down...");
        }
    })
    .context("failed to set signal handler")?;

    let summary = scanner.run(&config.root).context("walk failed")?;
    if !summary.completed() {
        info!(
            records = summary.records_written,
            "walk interrupted before completion"
        );
    }

    Ok(())
}

fn setup_logging(verbose: bool) {
    let default_filter = if verbose {
        "treewalk=debug,warn"
    } else {
        "treewalk=info,warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
