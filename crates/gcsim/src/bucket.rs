//! Buckets and the weighted chooser
//!
//! A bucket is a configured size/behavior class. The chooser interleaves draws
//! across buckets in proportion to their weight using round-robin with
//! repetition: it stays on a bucket for `weight` consecutive draws, then moves
//! on. The configured ratio is therefore exact over any window that is a
//! multiple of the total weight, whatever the random generator produces.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::random::Rand;

/// Inclusive-low, exclusive-high byte bounds for object sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeRange {
    pub low: u64,
    pub high: u64,
}

impl SizeRange {
    pub const fn new(low: u64, high: u64) -> Self {
        Self { low, high }
    }

    pub fn mean(&self) -> u64 {
        ((u128::from(self.low) + u128::from(self.high)) / 2) as u64
    }
}

impl std::fmt::Display for SizeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.low, self.high)
    }
}

impl std::str::FromStr for SizeRange {
    type Err = String;

    /// Parse `low-high`, e.g. `100-4000`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (low, high) = s
            .split_once('-')
            .ok_or_else(|| format!("size range '{}' must look like low-high", s))?;
        let low = low
            .trim()
            .parse::<u64>()
            .map_err(|e| format!("invalid low size '{}': {}", low, e))?;
        let high = high
            .trim()
            .parse::<u64>()
            .map_err(|e| format!("invalid high size '{}': {}", high, e))?;
        Ok(Self { low, high })
    }
}

/// Configuration-time description of one bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSpec {
    pub size_range: SizeRange,
    /// Every Nth draw from this bucket survives; 0 = never
    #[serde(default)]
    pub surv_interval: u64,
    /// Every Nth *surviving* draw is pinned; 0 = never
    #[serde(default)]
    pub pin_interval: u64,
    /// Every Nth *surviving* draw is finalizable; 0 = never
    #[serde(default)]
    pub finalizable_interval: u64,
    /// Relative allocation frequency, at least 1
    #[serde(default = "default_weight")]
    pub weight: u64,
}

fn default_weight() -> u64 {
    1
}

impl BucketSpec {
    pub fn new(size_range: SizeRange, surv_interval: u64, weight: u64) -> Self {
        Self {
            size_range,
            surv_interval,
            pin_interval: 0,
            finalizable_interval: 0,
            weight,
        }
    }

    pub fn with_pin_interval(mut self, pin_interval: u64) -> Self {
        self.pin_interval = pin_interval;
        self
    }

    pub fn with_finalizable_interval(mut self, finalizable_interval: u64) -> Self {
        self.finalizable_interval = finalizable_interval;
        self
    }

    /// Check the bucket's own invariants
    pub fn validate(&self) -> Result<()> {
        crate::ensure_config!(
            self.weight >= 1,
            "bucket {} has weight 0; weight must be at least 1",
            self.size_range
        );
        crate::ensure_config!(
            self.size_range.low <= self.size_range.high,
            "bucket size range {} has low > high",
            self.size_range
        );
        crate::ensure_config!(
            self.pin_interval == 0 || self.surv_interval != 0,
            "bucket {} sets pinInterval without survInterval",
            self.size_range
        );
        crate::ensure_config!(
            self.finalizable_interval == 0 || self.surv_interval != 0,
            "bucket {} sets finalizableInterval without survInterval",
            self.size_range
        );
        Ok(())
    }
}

/// Result of one draw from a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectSpec {
    pub size: u64,
    pub should_be_pinned: bool,
    pub should_be_finalizable: bool,
    pub should_survive: bool,
}

/// `interval != 0 && count % interval == 0`; interval 0 means never
#[inline]
pub fn is_nth(interval: u64, count: u64) -> bool {
    interval != 0 && count % interval == 0
}

/// Counters accumulated since the last progress report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketReport {
    pub allocated_bytes: u64,
    pub allocated_count: u64,
    pub survived_bytes: u64,
    pub survived_count: u64,
    pub pinned_bytes: u64,
    pub pinned_count: u64,
    pub finalizable_count: u64,
}

/// Runtime counterpart of a [`BucketSpec`], owned by one engine
#[derive(Debug, Clone)]
pub struct Bucket {
    spec: BucketSpec,
    count: u64,
    allocated_bytes_total_sum: u64,
    since_last_report: BucketReport,
}

impl Bucket {
    pub fn new(spec: BucketSpec) -> Self {
        Self {
            spec,
            count: 0,
            allocated_bytes_total_sum: 0,
            since_last_report: BucketReport::default(),
        }
    }

    pub fn spec(&self) -> &BucketSpec {
        &self.spec
    }

    /// Number of draws made from this bucket so far
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn allocated_bytes_total_sum(&self) -> u64 {
        self.allocated_bytes_total_sum
    }

    /// Draw the next object from this bucket
    ///
    /// Pin and finalize intervals are measured over the sequence of
    /// survivors (`count / surv_interval`), not over raw draws.
    pub fn get_object_spec(&mut self, rng: &mut Rand) -> ObjectSpec {
        self.count += 1;
        let range = self.spec.size_range;
        let size = rng.get_rand_range(range.low, range.high);

        let should_survive = is_nth(self.spec.surv_interval, self.count);
        let (should_be_pinned, should_be_finalizable) = if should_survive {
            let survivor_index = self.count / self.spec.surv_interval;
            (
                is_nth(self.spec.pin_interval, survivor_index),
                is_nth(self.spec.finalizable_interval, survivor_index),
            )
        } else {
            (false, false)
        };

        self.allocated_bytes_total_sum += size;
        let report = &mut self.since_last_report;
        report.allocated_bytes += size;
        report.allocated_count += 1;
        if should_survive {
            report.survived_bytes += size;
            report.survived_count += 1;
        }
        if should_be_pinned {
            report.pinned_bytes += size;
            report.pinned_count += 1;
        }
        if should_be_finalizable {
            report.finalizable_count += 1;
        }

        ObjectSpec {
            size,
            should_be_pinned,
            should_be_finalizable,
            should_survive,
        }
    }

    /// Return and reset the since-last-report counters
    pub fn take_report(&mut self) -> BucketReport {
        std::mem::take(&mut self.since_last_report)
    }
}

/// Deterministic weighted round-robin over buckets
#[derive(Debug, Clone)]
pub struct BucketChooser {
    buckets: Vec<Bucket>,
    current: usize,
    taken_from_current: u64,
}

impl BucketChooser {
    /// Build a chooser; fails fast on an empty or invalid bucket list
    pub fn new(specs: &[BucketSpec]) -> Result<Self> {
        if specs.is_empty() {
            return Err(SimError::Configuration(
                "a phase needs at least one bucket".to_string(),
            ));
        }
        for spec in specs {
            spec.validate()?;
        }

        Ok(Self {
            buckets: specs.iter().copied().map(Bucket::new).collect(),
            current: 0,
            taken_from_current: 0,
        })
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn buckets_mut(&mut self) -> &mut [Bucket] {
        &mut self.buckets
    }

    /// Draw from the current bucket, advancing after `weight` draws
    pub fn get_next_object_spec(&mut self, rng: &mut Rand) -> ObjectSpec {
        let bucket = &mut self.buckets[self.current];
        let spec = bucket.get_object_spec(rng);

        self.taken_from_current += 1;
        if self.taken_from_current >= bucket.spec.weight {
            self.taken_from_current = 0;
            self.current = (self.current + 1) % self.buckets.len();
        }

        spec
    }

    /// Weighted mean of the bucket means
    ///
    /// Summed in `u128`; the result never exceeds the largest bucket mean.
    pub fn average_object_size(&self) -> u64 {
        let total_weight: u128 = self.buckets.iter().map(|b| u128::from(b.spec.weight)).sum();
        let weighted: u128 = self
            .buckets
            .iter()
            .map(|b| u128::from(b.spec.weight) * u128::from(b.spec.size_range.mean()))
            .sum();
        (weighted / total_weight) as u64
    }

    /// Sum of all bytes drawn from every bucket
    pub fn allocated_bytes_total_sum(&self) -> u64 {
        self.buckets.iter().map(Bucket::allocated_bytes_total_sum).sum()
    }
}
