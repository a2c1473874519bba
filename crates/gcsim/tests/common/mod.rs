//! Shared fixtures for gcsim integration tests

#![allow(dead_code)]

use std::sync::Arc;

use gcsim::{AllocType, Args, BucketSpec, Collector, Phase, SizeRange, SystemCollector, TestKind};

/// A one-phase, time-kind configuration with verification on
pub fn single_phase_args(
    threads: usize,
    alloc_type: AllocType,
    total_live_bytes: u64,
    total_alloc_bytes: u64,
    buckets: Vec<BucketSpec>,
) -> Args {
    Args {
        thread_count: threads,
        verify_live_size: true,
        ..Args::single_phase(Phase {
            test_kind: TestKind::Time,
            alloc_type,
            total_live_bytes,
            total_alloc_bytes,
            total_minutes: 0.0,
            buckets,
        })
    }
}

/// Fixed-size bucket: every draw is exactly `size` bytes
pub fn fixed_bucket(size: u64, surv_interval: u64) -> BucketSpec {
    BucketSpec::new(SizeRange::new(size, size), surv_interval, 1)
}

pub fn system_collector() -> Arc<dyn Collector> {
    Arc::new(SystemCollector::new())
}

/// Write `content` to a fresh file named `name` in a temp dir
pub fn write_config(dir: &std::path::Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}
