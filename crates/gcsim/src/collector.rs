//! Collector Module - the memory manager under test
//!
//! The engine only ever asks the memory manager for three things: run a
//! collection of some generation, say how many collections happened, and
//! report memory figures at the end of the run. [`Collector`] captures that
//! surface so the runner can be pointed at the process allocator
//! ([`SystemCollector`]) or at a mock in tests.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Generation being collected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Generation {
    /// Young generation only (minor collection)
    Young,
    /// Old generation only
    Old,
    /// Full heap collection
    Full,
}

impl Generation {
    fn index(self) -> usize {
        match self {
            Generation::Young => 0,
            Generation::Old => 1,
            Generation::Full => 2,
        }
    }
}

/// Heap figures a collector can report after a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HeapInfo {
    pub heap_size_bytes: u64,
    pub fragmented_bytes: u64,
}

/// Memory manager the workload runs against
///
/// Shared by every worker thread, so implementations must be `Send + Sync`
/// and keep their counters in atomics.
#[cfg_attr(test, mockall::automock)]
pub trait Collector: Send + Sync {
    /// Request a collection of `generation`
    fn collect(&self, generation: Generation);

    /// Collections of `generation` performed so far
    fn collection_count(&self, generation: Generation) -> u64;

    /// Bytes currently in use by the managed heap
    fn total_memory(&self) -> u64;

    /// Heap size and fragmentation, when the platform exposes them
    fn heap_info(&self) -> Option<HeapInfo>;
}

/// Collector backed by the process allocator
///
/// Rust frees memory deterministically, so a "collection" here is a request
/// to return free pages to the OS. Only full collections do any work; every
/// request is counted.
#[derive(Debug, Default)]
pub struct SystemCollector {
    counts: [AtomicU64; 3],
}

impl SystemCollector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Collector for SystemCollector {
    fn collect(&self, generation: Generation) {
        self.counts[generation.index()].fetch_add(1, Ordering::Relaxed);
        if generation == Generation::Full {
            let trimmed = sys::trim();
            log::debug!("full collection requested (allocator trimmed: {})", trimmed);
        }
    }

    fn collection_count(&self, generation: Generation) -> u64 {
        self.counts[generation.index()].load(Ordering::Relaxed)
    }

    fn total_memory(&self) -> u64 {
        sys::mallinfo().map_or(0, |info| info.in_use)
    }

    fn heap_info(&self) -> Option<HeapInfo> {
        sys::mallinfo().map(|info| HeapInfo {
            heap_size_bytes: info.heap_size,
            fragmented_bytes: info.free,
        })
    }
}

/// Allocator statistics
#[derive(Debug, Clone, Copy)]
struct AllocatorInfo {
    in_use: u64,
    heap_size: u64,
    free: u64,
}

#[cfg(all(target_os = "linux", target_env = "gnu"))]
mod sys {
    use super::AllocatorInfo;

    pub(super) fn trim() -> bool {
        // SAFETY: malloc_trim only inspects and releases allocator-owned memory.
        unsafe { libc::malloc_trim(0) != 0 }
    }

    pub(super) fn mallinfo() -> Option<AllocatorInfo> {
        // SAFETY: mallinfo2 takes no arguments and returns a plain struct.
        let info = unsafe { libc::mallinfo2() };
        Some(AllocatorInfo {
            in_use: (info.uordblks + info.hblkhd) as u64,
            heap_size: (info.arena + info.hblkhd) as u64,
            free: info.fordblks as u64,
        })
    }
}

#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
mod sys {
    use super::AllocatorInfo;

    pub(super) fn trim() -> bool {
        false
    }

    pub(super) fn mallinfo() -> Option<AllocatorInfo> {
        None
    }
}
