//! Configuration Module - Workload Parameters
//!
//! Every input path (command-line flags, the line-oriented text grammar, TOML)
//! resolves into the same validated [`Args`]. The engine never sees anything
//! else; [`Args::per_thread_args`] partitions the byte budgets across workers
//! before any thread starts.

pub mod flags;
pub mod text;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bucket::{BucketChooser, BucketSpec};
use crate::error::{assert_about_equal, Result, SimError};

/// Bytes per gigabyte as used by the `*GB` configuration keys
pub const GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Tolerance for partitioned totals versus the requested totals
pub const PARTITION_TOLERANCE: f64 = 0.05;

/// What the steady state of a phase does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TestKind {
    /// Allocate until the time or byte budget runs out
    Time,
    /// No allocation; force full collections on a saturated heap
    HighSurvival,
}

impl std::str::FromStr for TestKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "time" => Ok(TestKind::Time),
            "highSurvival" | "high-survival" => Ok(TestKind::HighSurvival),
            other => Err(format!(
                "unknown test kind '{}' (expected time or highSurvival)",
                other
            )),
        }
    }
}

/// Object representation used by a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AllocType {
    /// Flat payload objects
    Simple,
    /// Linked-list graph objects
    Reference,
}

impl std::str::FromStr for AllocType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "simple" | "flat" => Ok(AllocType::Simple),
            "reference" | "graph" => Ok(AllocType::Reference),
            other => Err(format!(
                "unknown alloc type '{}' (expected simple or reference)",
                other
            )),
        }
    }
}

/// One workload segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    #[serde(default = "default_test_kind")]
    pub test_kind: TestKind,
    #[serde(default = "default_alloc_type")]
    pub alloc_type: AllocType,
    pub total_live_bytes: u64,
    pub total_alloc_bytes: u64,
    /// Wall-clock limit; 0 means no limit
    #[serde(default)]
    pub total_minutes: f64,
    pub buckets: Vec<BucketSpec>,
}

fn default_test_kind() -> TestKind {
    TestKind::Time
}

fn default_alloc_type() -> AllocType {
    AllocType::Simple
}

impl Phase {
    pub fn validate(&self) -> Result<()> {
        crate::ensure_config!(
            self.total_alloc_bytes > 0,
            "totalAllocBytes is required and must be > 0"
        );
        crate::ensure_config!(
            self.total_live_bytes > 0,
            "totalLiveBytes is required and must be > 0"
        );
        crate::ensure_config!(
            self.total_minutes.is_finite() && self.total_minutes >= 0.0,
            "totalMinutes must be a finite, non-negative number (got {})",
            self.total_minutes
        );
        crate::ensure_config!(!self.buckets.is_empty(), "a phase needs at least one bucket");
        for bucket in &self.buckets {
            bucket.validate()?;
        }
        Ok(())
    }

    /// Number of live-set slots the live budget holds
    ///
    /// # Errors
    ///
    /// `Configuration` for invalid buckets, or when the budget cannot hold a
    /// single object of average size.
    pub fn live_slots(&self) -> Result<usize> {
        let average = BucketChooser::new(&self.buckets)?.average_object_size().max(1);
        let slots = (self.total_live_bytes / average) as usize;
        crate::ensure_config!(
            slots > 0,
            "live budget of {} bytes holds no objects of average size {}",
            self.total_live_bytes,
            average
        );
        Ok(slots)
    }

    /// This phase's share for one of `threads` workers
    fn partitioned(&self, threads: u64) -> Phase {
        Phase {
            total_live_bytes: self.total_live_bytes / threads,
            total_alloc_bytes: self.total_alloc_bytes / threads,
            ..self.clone()
        }
    }
}

/// Resolved, validated configuration for a whole run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Args {
    #[serde(default = "default_thread_count")]
    pub thread_count: usize,
    #[serde(default)]
    pub verify_live_size: bool,
    /// Progress cadence for thread 0; 0 disables progress output
    #[serde(default)]
    pub print_every_nth_iter: u64,
    /// Give every non-pinned flat survivor a weak handle
    #[serde(default)]
    pub handle_test: bool,
    pub phases: Vec<Phase>,
}

fn default_thread_count() -> usize {
    num_cpus::get()
}

impl Default for Args {
    /// Global defaults with no phases configured yet
    fn default() -> Self {
        Self {
            thread_count: default_thread_count(),
            verify_live_size: false,
            print_every_nth_iter: 0,
            handle_test: false,
            phases: Vec::new(),
        }
    }
}

impl Args {
    /// Single-phase configuration with default global settings
    pub fn single_phase(phase: Phase) -> Self {
        Self {
            phases: vec![phase],
            ..Self::default()
        }
    }

    /// Check every configuration rule
    ///
    /// # Errors
    ///
    /// - `Configuration` for zero threads, missing budgets or bad buckets
    /// - `UnsupportedPhaseCount` unless exactly one phase is configured
    pub fn validate(&self) -> Result<()> {
        crate::ensure_config!(self.thread_count >= 1, "threadCount must be at least 1");
        if self.phases.len() != 1 {
            return Err(SimError::UnsupportedPhaseCount(self.phases.len()));
        }
        for phase in &self.phases {
            phase.validate()?;
        }
        Ok(())
    }

    /// Split the byte budgets evenly across worker threads
    ///
    /// Fails when the re-multiplied totals drift more than
    /// [`PARTITION_TOLERANCE`] from what was requested, or when a thread's
    /// share of the live budget holds no objects.
    pub fn per_thread_args(&self) -> Result<Vec<PerThreadArgs>> {
        self.validate()?;
        let threads = self.thread_count as u64;

        let phases: Vec<Phase> = self.phases.iter().map(|p| p.partitioned(threads)).collect();
        for (requested, share) in self.phases.iter().zip(&phases) {
            assert_about_equal(
                "totalLiveBytes",
                requested.total_live_bytes,
                share.total_live_bytes * threads,
                PARTITION_TOLERANCE,
            )?;
            assert_about_equal(
                "totalAllocBytes",
                requested.total_alloc_bytes,
                share.total_alloc_bytes * threads,
                PARTITION_TOLERANCE,
            )?;
            crate::ensure_config!(
                share.total_live_bytes > 0,
                "totalLiveBytes {} is too small to split across {} threads",
                requested.total_live_bytes,
                threads
            );
            crate::ensure_config!(
                share.total_alloc_bytes > 0,
                "totalAllocBytes {} is too small to split across {} threads",
                requested.total_alloc_bytes,
                threads
            );
            share.live_slots()?;
        }

        Ok((0..self.thread_count)
            .map(|thread_index| PerThreadArgs {
                thread_index,
                verify_live_size: self.verify_live_size,
                print_every_nth_iter: self.print_every_nth_iter,
                handle_test: self.handle_test,
                phases: phases.clone(),
            })
            .collect())
    }

    /// Load a configuration file
    ///
    /// Files ending in `.toml` are read as TOML; anything else uses the
    /// line-oriented text grammar.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let args = if path.extension().is_some_and(|ext| ext == "toml") {
            Self::from_toml_str(&content)?
        } else {
            text::parse(&content)?
        };
        args.validate()?;
        Ok(args)
    }

    /// Parse TOML into `Args`
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| SimError::Configuration(format!("Failed to parse TOML: {}", e)))
    }
}

/// One worker's view of the configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PerThreadArgs {
    pub thread_index: usize,
    pub verify_live_size: bool,
    pub print_every_nth_iter: u64,
    pub handle_test: bool,
    pub phases: Vec<Phase>,
}

impl PerThreadArgs {
    /// Thread 0 alone prints progress
    pub fn prints_progress(&self) -> bool {
        self.thread_index == 0 && self.print_every_nth_iter != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::SizeRange;

    fn phase() -> Phase {
        Phase {
            test_kind: TestKind::Time,
            alloc_type: AllocType::Simple,
            total_live_bytes: 1000,
            total_alloc_bytes: 10_000,
            total_minutes: 0.0,
            buckets: vec![BucketSpec::new(SizeRange::new(100, 100), 2, 1)],
        }
    }

    fn args(threads: usize) -> Args {
        Args {
            thread_count: threads,
            ..Args::single_phase(phase())
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(args(1).validate().is_ok());
    }

    #[test]
    fn test_zero_threads_rejected() {
        assert!(args(0).validate().is_err());
    }

    #[test]
    fn test_missing_alloc_budget_rejected() {
        let mut a = args(1);
        a.phases[0].total_alloc_bytes = 0;
        assert!(matches!(a.validate(), Err(SimError::Configuration(_))));
    }

    #[test]
    fn test_missing_live_budget_rejected() {
        let mut a = args(1);
        a.phases[0].total_live_bytes = 0;
        assert!(matches!(a.validate(), Err(SimError::Configuration(_))));
    }

    #[test]
    fn test_multiple_phases_rejected() {
        let mut a = args(1);
        a.phases.push(phase());
        assert!(matches!(a.validate(), Err(SimError::UnsupportedPhaseCount(2))));
        a.phases.clear();
        assert!(matches!(a.validate(), Err(SimError::UnsupportedPhaseCount(0))));
    }

    #[test]
    fn test_negative_minutes_rejected() {
        let mut a = args(1);
        a.phases[0].total_minutes = -1.0;
        assert!(a.validate().is_err());
        a.phases[0].total_minutes = f64::NAN;
        assert!(a.validate().is_err());
    }

    #[test]
    fn test_partition_divides_budgets() {
        let per_thread = args(4).per_thread_args().unwrap();
        assert_eq!(per_thread.len(), 4);
        for (i, t) in per_thread.iter().enumerate() {
            assert_eq!(t.thread_index, i);
            assert_eq!(t.phases[0].total_live_bytes, 250);
            assert_eq!(t.phases[0].total_alloc_bytes, 2500);
        }
        assert!(!per_thread[1].prints_progress());
    }

    #[test]
    fn test_partition_outside_tolerance_fails() {
        let mut a = args(3);
        a.phases[0].total_live_bytes = 10;
        assert!(matches!(
            a.per_thread_args(),
            Err(SimError::ApproximationFailed { .. })
        ));
    }

    #[test]
    fn test_live_share_without_slots_rejected() {
        let mut a = args(2);
        a.phases[0].total_live_bytes = 100;
        assert!(a.validate().is_ok());
        assert!(matches!(a.per_thread_args(), Err(SimError::Configuration(_))));
        assert_eq!(args(1).phases[0].live_slots().unwrap(), 10);
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("time".parse::<TestKind>().unwrap(), TestKind::Time);
        assert_eq!("highSurvival".parse::<TestKind>().unwrap(), TestKind::HighSurvival);
        assert!("fast".parse::<TestKind>().is_err());
        assert_eq!("simple".parse::<AllocType>().unwrap(), AllocType::Simple);
        assert_eq!("graph".parse::<AllocType>().unwrap(), AllocType::Reference);
    }

    #[test]
    fn test_toml_round_trip_shape() {
        let toml = r#"
            thread_count = 2
            verify_live_size = true

            [[phases]]
            test_kind = "time"
            alloc_type = "reference"
            total_live_bytes = 4096
            total_alloc_bytes = 65536

            [[phases.buckets]]
            size_range = { low = 100, high = 200 }
            surv_interval = 3
            weight = 2
        "#;
        let a = Args::from_toml_str(toml).unwrap();
        assert_eq!(a.thread_count, 2);
        assert!(a.verify_live_size);
        assert_eq!(a.phases[0].alloc_type, AllocType::Reference);
        assert_eq!(a.phases[0].buckets[0].weight, 2);
        assert_eq!(a.phases[0].buckets[0].pin_interval, 0);
        assert!(a.validate().is_ok());
    }
}
