//! gcsim CLI - drive synthetic allocation workloads.
//!
//! This is the main entry point for the gcsim binary. It uses clap for
//! argument parsing and dispatches to the run and check handlers.

mod commands;
mod config;
mod error;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{run_check, run_workload, CheckArgs, RunArgs};
use config::WorkloadOpts;
use error::{CliError, Result};

/// gcsim - synthetic allocation workloads for memory-manager testing
///
/// Allocates a configurable mix of short- and long-lived, pinned and
/// graph-shaped objects at a target rate while holding a target live size.
#[derive(Parser, Debug)]
#[command(name = "gcsim")]
#[command(author = "gcsim Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Synthetic allocation workload engine", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true, env = "GCSIM_VERBOSE")]
    verbose: bool,

    /// Disable color output
    #[arg(long, global = true, env = "GCSIM_NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands for the gcsim CLI.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a workload and print the stats block
    Run(RunCommand),

    /// Resolve and validate a workload, printing it as JSON
    Check(CheckCommand),
}

/// Arguments for the run subcommand.
#[derive(Parser, Debug)]
struct RunCommand {
    #[command(flatten)]
    workload: WorkloadOpts,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

/// Arguments for the check subcommand.
#[derive(Parser, Debug)]
struct CheckCommand {
    #[command(flatten)]
    workload: WorkloadOpts,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.no_color)?;

    execute_command(cli.command).context("gcsim failed")
}

/// Initialize the logging system.
///
/// Logs go to stderr so stdout carries only the report. Records from the
/// engine's `log` calls are forwarded through the subscriber.
fn init_logging(verbose: bool, no_color: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let subscriber = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(verbose);

    tracing_subscriber::registry()
        .with(filter)
        .with(subscriber)
        .try_init()
        .map_err(|e| CliError::Config(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}

/// Execute the selected command.
fn execute_command(command: Commands) -> Result<()> {
    match command {
        Commands::Run(args) => run_workload(RunArgs {
            workload: args.workload.resolve()?,
            json: args.json,
        }),
        Commands::Check(args) => run_check(CheckArgs {
            workload: args.workload.resolve()?,
        }),
    }
}
