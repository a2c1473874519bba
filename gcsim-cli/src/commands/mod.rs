//! Command modules for the gcsim CLI.

pub mod check;
pub mod run;

pub use check::{run_check, CheckArgs};
pub use run::{run_workload, RunArgs};
