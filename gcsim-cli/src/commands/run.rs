//! Run command implementation.
//!
//! Runs the resolved workload on the process allocator and prints the
//! report to stdout.

use std::io::Write;
use std::sync::Arc;

use gcsim::{RunReport, SystemCollector};

use crate::error::Result;

/// Arguments for the run command.
#[derive(Debug, Clone)]
pub struct RunArgs {
    /// Resolved workload.
    pub workload: gcsim::Args,
    /// Emit the report as JSON instead of the stats block.
    pub json: bool,
}

/// Execute the run command.
pub fn run_workload(args: RunArgs) -> Result<()> {
    tracing::info!(
        "running {} thread(s), {} bytes to allocate",
        args.workload.thread_count,
        args.workload.phases[0].total_alloc_bytes
    );
    let report = gcsim::run(&args.workload, Arc::new(SystemCollector::new()))?;
    write_report(&mut std::io::stdout().lock(), &report, args.json)
}

fn write_report(out: &mut impl Write, report: &RunReport, json: bool) -> Result<()> {
    if json {
        writeln!(out, "{}", report.to_json()?)?;
    } else {
        write!(out, "{}", report)?;
    }
    Ok(())
}
