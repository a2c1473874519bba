//! Check command implementation.
//!
//! Resolves and validates a workload without running it, then prints the
//! resolved configuration as JSON.

use std::io::Write;

use crate::error::Result;

/// Arguments for the check command.
#[derive(Debug, Clone)]
pub struct CheckArgs {
    /// Resolved workload.
    pub workload: gcsim::Args,
}

/// Execute the check command.
pub fn run_check(args: CheckArgs) -> Result<()> {
    // A valid config can still fail here: a budget too small to split, or a
    // thread's live share too small for one object.
    let per_thread = args.workload.per_thread_args()?;
    tracing::debug!("workload splits into {} thread share(s)", per_thread.len());

    let mut out = std::io::stdout().lock();
    writeln!(out, "{}", serde_json::to_string_pretty(&args.workload)?)?;
    Ok(())
}
