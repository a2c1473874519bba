//! Command-line flag set
//!
//! The flag path describes a workload as three fixed buckets: small objects
//! (soh), large objects (loh) and pinned objects (poh). Their relative weights
//! are per-mille ratios; the small-object bucket takes whatever is left of
//! 1000. The CLI fills a [`FlagArgs`] from its parser and calls
//! [`FlagArgs::into_args`].

use serde::{Deserialize, Serialize};

use crate::bucket::{BucketSpec, SizeRange};
use crate::config::{AllocType, Args, Phase, TestKind, GB};
use crate::error::{Result, SimError};

/// Total of the per-mille bucket ratios
pub const RATIO_SCALE: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagArgs {
    /// Worker threads; `None` uses one per logical CPU
    pub threads: Option<usize>,
    pub total_live_gb: f64,
    /// Required; `None` is reported as a configuration error
    pub total_alloc_gb: Option<f64>,
    pub total_minutes: f64,
    pub test_kind: TestKind,
    pub alloc_type: AllocType,

    pub soh_size_range: SizeRange,
    pub soh_surv_interval: u64,
    pub soh_finalizable_interval: u64,

    pub loh_size_range: SizeRange,
    pub loh_surv_interval: u64,
    pub loh_pin_interval: u64,
    pub loh_finalizable_interval: u64,
    /// Per-mille share of draws from the large-object bucket
    pub loh_alloc_ratio: u64,

    pub poh_size_range: SizeRange,
    pub poh_surv_interval: u64,
    pub poh_finalizable_interval: u64,
    /// Per-mille share of draws from the pinned-object bucket
    pub poh_alloc_ratio: u64,

    pub verify_live_size: bool,
    pub print_every_nth_iter: u64,
    pub handle_test: bool,
}

impl Default for FlagArgs {
    fn default() -> Self {
        Self {
            threads: None,
            total_live_gb: 0.5,
            total_alloc_gb: None,
            total_minutes: 0.0,
            test_kind: TestKind::Time,
            alloc_type: AllocType::Simple,

            soh_size_range: SizeRange::new(100, 4000),
            soh_surv_interval: 30,
            soh_finalizable_interval: 0,

            loh_size_range: SizeRange::new(100 * 1024, 200 * 1024),
            loh_surv_interval: 5,
            loh_pin_interval: 0,
            loh_finalizable_interval: 0,
            loh_alloc_ratio: 0,

            poh_size_range: SizeRange::new(100, 4000),
            poh_surv_interval: 30,
            poh_finalizable_interval: 0,
            poh_alloc_ratio: 0,

            verify_live_size: false,
            print_every_nth_iter: 0,
            handle_test: false,
        }
    }
}

impl FlagArgs {
    /// Resolve the flags into validated `Args`
    ///
    /// # Errors
    ///
    /// `Configuration` when `total_alloc_gb` is missing, either size is not
    /// positive, the ratios exceed
    /// 1000, or any resulting bucket or phase breaks a rule.
    pub fn into_args(self) -> Result<Args> {
        let total_alloc_gb = self.total_alloc_gb.ok_or_else(|| {
            SimError::Configuration("total alloc GB is required".to_string())
        })?;
        crate::ensure_config!(
            total_alloc_gb.is_finite() && total_alloc_gb > 0.0,
            "total alloc GB must be positive (got {})",
            total_alloc_gb
        );
        crate::ensure_config!(
            self.total_live_gb.is_finite() && self.total_live_gb > 0.0,
            "total live GB must be positive (got {})",
            self.total_live_gb
        );
        crate::ensure_config!(
            self.loh_alloc_ratio + self.poh_alloc_ratio <= RATIO_SCALE,
            "loh ratio {} plus poh ratio {} exceeds {}",
            self.loh_alloc_ratio,
            self.poh_alloc_ratio,
            RATIO_SCALE
        );

        let phase = Phase {
            test_kind: self.test_kind,
            alloc_type: self.alloc_type,
            total_live_bytes: (self.total_live_gb * GB) as u64,
            total_alloc_bytes: (total_alloc_gb * GB) as u64,
            total_minutes: self.total_minutes,
            buckets: self.buckets(),
        };

        let mut args = Args {
            verify_live_size: self.verify_live_size,
            print_every_nth_iter: self.print_every_nth_iter,
            handle_test: self.handle_test,
            ..Args::single_phase(phase)
        };
        if let Some(threads) = self.threads {
            args.thread_count = threads;
        }
        args.validate()?;
        Ok(args)
    }

    /// The soh/loh/poh buckets, skipping any whose weight is 0
    fn buckets(&self) -> Vec<BucketSpec> {
        let soh_weight = RATIO_SCALE - self.loh_alloc_ratio - self.poh_alloc_ratio;

        let soh = BucketSpec::new(self.soh_size_range, self.soh_surv_interval, soh_weight)
            .with_finalizable_interval(self.soh_finalizable_interval);
        let loh = BucketSpec::new(
            self.loh_size_range,
            self.loh_surv_interval,
            self.loh_alloc_ratio,
        )
        .with_pin_interval(self.loh_pin_interval)
        .with_finalizable_interval(self.loh_finalizable_interval);
        // Every survivor from the pinned bucket is pinned.
        let poh = BucketSpec::new(
            self.poh_size_range,
            self.poh_surv_interval,
            self.poh_alloc_ratio,
        )
        .with_pin_interval(1)
        .with_finalizable_interval(self.poh_finalizable_interval);

        [soh, loh, poh]
            .into_iter()
            .filter(|b| b.weight != 0)
            .collect()
    }
}
