//! Workload configuration for the gcsim CLI.
//!
//! A workload comes either from `--config-file` (text grammar, or TOML for
//! `.toml` files) or from the individual flags below. Unset flags fall back
//! to [`FlagArgs::default`].

use std::path::{Path, PathBuf};

use clap::Args;
use gcsim::{AllocType, FlagArgs, SizeRange, TestKind};

use crate::error::Result;

/// Flags describing a workload.
#[derive(Args, Debug, Clone, Default)]
pub struct WorkloadOpts {
    /// Read the workload from a file instead of flags
    #[arg(long, value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    /// Worker threads (default: one per logical CPU)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Target live data size across all threads, in GB
    #[arg(long)]
    pub total_live_gb: Option<f64>,

    /// Total bytes to allocate across all threads, in GB
    #[arg(long)]
    pub total_alloc_gb: Option<f64>,

    /// Wall-clock limit in minutes (0 = no limit)
    #[arg(long)]
    pub total_minutes: Option<f64>,

    /// Steady-state behavior: time or highSurvival
    #[arg(long)]
    pub test_kind: Option<TestKind>,

    /// Object shape: simple or reference
    #[arg(long)]
    pub alloc_type: Option<AllocType>,

    /// Small-object size range, e.g. 100-4000
    #[arg(long, value_name = "LOW-HIGH")]
    pub soh_size_range: Option<SizeRange>,

    #[arg(long)]
    pub soh_surv_interval: Option<u64>,

    #[arg(long)]
    pub soh_finalizable_interval: Option<u64>,

    /// Large-object size range
    #[arg(long, value_name = "LOW-HIGH")]
    pub loh_size_range: Option<SizeRange>,

    #[arg(long)]
    pub loh_surv_interval: Option<u64>,

    #[arg(long)]
    pub loh_pin_interval: Option<u64>,

    #[arg(long)]
    pub loh_finalizable_interval: Option<u64>,

    /// Large-object share of draws, per mille
    #[arg(long)]
    pub loh_alloc_ratio: Option<u64>,

    /// Pinned-object size range
    #[arg(long, value_name = "LOW-HIGH")]
    pub poh_size_range: Option<SizeRange>,

    #[arg(long)]
    pub poh_surv_interval: Option<u64>,

    #[arg(long)]
    pub poh_finalizable_interval: Option<u64>,

    /// Pinned-object share of draws, per mille
    #[arg(long)]
    pub poh_alloc_ratio: Option<u64>,

    /// Verify live-set and object accounting during the run
    #[arg(long)]
    pub verify_live_size: bool,

    /// Log progress from thread 0 every N iterations (0 = never)
    #[arg(long)]
    pub print_every_nth_iter: Option<u64>,

    /// Give non-pinned survivors weak handles
    #[arg(long)]
    pub handle_test: bool,
}

impl WorkloadOpts {
    /// Overlay the given flags on the defaults.
    pub fn to_flag_args(&self) -> FlagArgs {
        let d = FlagArgs::default();
        FlagArgs {
            threads: self.threads,
            total_live_gb: self.total_live_gb.unwrap_or(d.total_live_gb),
            total_alloc_gb: self.total_alloc_gb,
            total_minutes: self.total_minutes.unwrap_or(d.total_minutes),
            test_kind: self.test_kind.unwrap_or(d.test_kind),
            alloc_type: self.alloc_type.unwrap_or(d.alloc_type),
            soh_size_range: self.soh_size_range.unwrap_or(d.soh_size_range),
            soh_surv_interval: self.soh_surv_interval.unwrap_or(d.soh_surv_interval),
            soh_finalizable_interval: self
                .soh_finalizable_interval
                .unwrap_or(d.soh_finalizable_interval),
            loh_size_range: self.loh_size_range.unwrap_or(d.loh_size_range),
            loh_surv_interval: self.loh_surv_interval.unwrap_or(d.loh_surv_interval),
            loh_pin_interval: self.loh_pin_interval.unwrap_or(d.loh_pin_interval),
            loh_finalizable_interval: self
                .loh_finalizable_interval
                .unwrap_or(d.loh_finalizable_interval),
            loh_alloc_ratio: self.loh_alloc_ratio.unwrap_or(d.loh_alloc_ratio),
            poh_size_range: self.poh_size_range.unwrap_or(d.poh_size_range),
            poh_surv_interval: self.poh_surv_interval.unwrap_or(d.poh_surv_interval),
            poh_finalizable_interval: self
                .poh_finalizable_interval
                .unwrap_or(d.poh_finalizable_interval),
            poh_alloc_ratio: self.poh_alloc_ratio.unwrap_or(d.poh_alloc_ratio),
            verify_live_size: self.verify_live_size || d.verify_live_size,
            print_every_nth_iter: self.print_every_nth_iter.unwrap_or(d.print_every_nth_iter),
            handle_test: self.handle_test || d.handle_test,
        }
    }

    /// Resolve the options into validated engine arguments.
    ///
    /// With `--config-file`, `--threads` still overrides the file's thread
    /// count; the other workload flags are ignored.
    pub fn resolve(&self) -> Result<gcsim::Args> {
        match &self.config_file {
            Some(path) => self.load_file(path),
            None => Ok(self.to_flag_args().into_args()?),
        }
    }

    fn load_file(&self, path: &Path) -> Result<gcsim::Args> {
        tracing::debug!("loading workload from {}", path.display());
        let mut args = gcsim::Args::load_from_path(path)?;
        if let Some(threads) = self.threads {
            args.thread_count = threads;
            args.validate()?;
        }
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_flags_use_defaults() {
        let opts = WorkloadOpts {
            total_alloc_gb: Some(2.0),
            ..WorkloadOpts::default()
        };
        let flags = opts.to_flag_args();
        let d = FlagArgs::default();
        assert_eq!(flags.total_alloc_gb, Some(2.0));
        assert_eq!(flags.soh_size_range, d.soh_size_range);
        assert_eq!(flags.total_live_gb, d.total_live_gb);
    }

    #[test]
    fn test_resolve_without_alloc_budget_fails() {
        assert!(WorkloadOpts::default().resolve().is_err());
    }

    #[test]
    fn test_threads_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("w.txt");
        std::fs::write(
            &path,
            "threadCount 8\n[phase]\ntotalLiveBytes 100000\ntotalAllocBytes 1000000\n[bucket]\nsizeRange 100-200\n",
        )
        .unwrap();
        let opts = WorkloadOpts {
            config_file: Some(path),
            threads: Some(3),
            ..WorkloadOpts::default()
        };
        assert_eq!(opts.resolve().unwrap().thread_count, 3);
    }
}
