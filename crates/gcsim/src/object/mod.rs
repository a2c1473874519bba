//! Object Module - Allocatable Objects
//!
//! Two interchangeable object representations share one capability set:
//!
//! - [`FlatItem`]: a single byte buffer, optionally pinned, weakly tracked or
//!   finalizable
//! - [`GraphItem`]: a payload heading an exclusively owned singly-linked chain
//!
//! Freeing is an explicit, consuming operation. Every construction and every
//! release is counted in the engine's [`ObjectContext`] so teardown can prove
//! each object was freed exactly once.

pub mod flat;
pub mod graph;
pub mod handle;

pub use flat::FlatItem;
pub use graph::GraphItem;
pub use handle::{HandleId, HandleKind, HandleTable};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::bucket::ObjectSpec;

/// Capability shared by every object the engine allocates
pub trait Allocatable: Sized {
    /// Build a new object for a drawn spec
    fn create(spec: &ObjectSpec, ctx: &mut ObjectContext) -> Self;

    /// The object's own payload buffer
    fn payload(&self) -> &[u8];

    fn payload_mut(&mut self) -> &mut [u8];

    /// Bytes retained by this object, including everything it owns
    fn total_size(&self) -> u64;

    /// Release all resources; runs exactly once per object since it consumes it
    fn free(self, ctx: &mut ObjectContext);
}

/// Construction/release counters for one engine
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ObjectCounters {
    pub allocated: u64,
    pub freed: u64,
    pub allocated_bytes: u64,
    pub freed_bytes: u64,
}

impl ObjectCounters {
    /// Objects constructed but not yet freed
    pub fn outstanding(&self) -> u64 {
        self.allocated - self.freed
    }
}

/// Per-engine state every object interacts with on construction and release
#[derive(Debug)]
pub struct ObjectContext {
    handles: HandleTable,
    counters: ObjectCounters,
    finalized: Arc<AtomicU64>,
    handle_test: bool,
    page_size: usize,
}

impl ObjectContext {
    pub fn new(handle_test: bool) -> Self {
        Self {
            handles: HandleTable::new(),
            counters: ObjectCounters::default(),
            finalized: Arc::new(AtomicU64::new(0)),
            handle_test,
            page_size: page_size::get(),
        }
    }

    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    pub fn handles_mut(&mut self) -> &mut HandleTable {
        &mut self.handles
    }

    pub fn counters(&self) -> ObjectCounters {
        self.counters
    }

    /// Whether non-pinned survivors take weak handles
    pub fn handle_test(&self) -> bool {
        self.handle_test
    }

    /// Finalizers that have run
    pub fn finalized(&self) -> u64 {
        self.finalized.load(Ordering::Relaxed)
    }

    pub(crate) fn finalizer(&self) -> Finalizer {
        Finalizer {
            finalized: Arc::clone(&self.finalized),
        }
    }

    pub(crate) fn record_alloc(&mut self, bytes: u64) {
        self.counters.allocated += 1;
        self.counters.allocated_bytes += bytes;
    }

    pub(crate) fn record_free(&mut self, bytes: u64) {
        self.counters.freed += 1;
        self.counters.freed_bytes += bytes;
    }

    /// Write one byte per page so the buffer is committed, not just reserved
    pub fn touch_pages(&self, buf: &mut [u8]) {
        let mut offset = 0;
        while offset < buf.len() {
            buf[offset] = 1;
            offset += self.page_size;
        }
        if let Some(last) = buf.last_mut() {
            *last = 1;
        }
    }
}

impl Default for ObjectContext {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Finalization guard carried by finalizable objects
///
/// Dropping it records one finalization.
#[derive(Debug)]
pub struct Finalizer {
    finalized: Arc<AtomicU64>,
}

impl Drop for Finalizer {
    fn drop(&mut self) {
        self.finalized.fetch_add(1, Ordering::Relaxed);
    }
}

/// Zeroed payload buffer of `len` bytes
pub(crate) fn new_payload(len: u64) -> Box<[u8]> {
    vec![0u8; len as usize].into_boxed_slice()
}
