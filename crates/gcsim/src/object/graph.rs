//! Graph item: a payload heading an exclusively owned linked chain
//!
//! Each node owns the rest of the chain through `next`. There is no sharing
//! and there are no cycles, so freeing the head frees every node exactly once.
//! Chains are walked iteratively everywhere; their length is controlled by
//! the workload and can grow without bound.

use super::{new_payload, Allocatable, ObjectContext};
use crate::bucket::ObjectSpec;

/// Bytes a graph node costs beyond its payload
pub const GRAPH_ITEM_OVERHEAD: u64 = std::mem::size_of::<GraphItem>() as u64;

#[derive(Debug)]
pub struct GraphItem {
    payload: Box<[u8]>,
    next: Option<Box<GraphItem>>,
    /// Size of this node plus everything reachable through `next`
    total_size: u64,
}

impl GraphItem {
    /// Allocate a single unlinked node of `size` total bytes
    pub fn new(size: u64, ctx: &mut ObjectContext) -> Self {
        let payload = new_payload(size.saturating_sub(GRAPH_ITEM_OVERHEAD));
        let total_size = payload.len() as u64 + GRAPH_ITEM_OVERHEAD;
        ctx.record_alloc(total_size);
        Self {
            payload,
            next: None,
            total_size,
        }
    }

    /// Size of this node alone
    pub fn node_size(&self) -> u64 {
        self.payload.len() as u64 + GRAPH_ITEM_OVERHEAD
    }

    /// Append `other`'s whole chain to the end of this chain
    ///
    /// Every node on the way to the tail gains `other`'s total size, so any
    /// node's `total_size` stays the sum over the chain it heads.
    pub fn add_to_end_of_list(&mut self, other: GraphItem) {
        let added = other.total_size;
        let mut cur = self;
        loop {
            cur.total_size += added;
            match cur.next {
                Some(ref mut next) => cur = &mut **next,
                None => {
                    cur.next = Some(Box::new(other));
                    return;
                },
            }
        }
    }

    /// Number of nodes in the chain this item heads
    pub fn chain_len(&self) -> usize {
        let mut len = 1;
        let mut cur = self.next.as_deref();
        while let Some(node) = cur {
            len += 1;
            cur = node.next.as_deref();
        }
        len
    }

    /// Recompute the chain size from scratch
    pub fn recompute_total_size(&self) -> u64 {
        let mut total = self.node_size();
        let mut cur = self.next.as_deref();
        while let Some(node) = cur {
            total += node.node_size();
            cur = node.next.as_deref();
        }
        total
    }
}

impl Allocatable for GraphItem {
    /// Graph nodes carry no handles; pin and finalize flags are ignored
    fn create(spec: &ObjectSpec, ctx: &mut ObjectContext) -> Self {
        Self::new(spec.size, ctx)
    }

    fn payload(&self) -> &[u8] {
        &self.payload
    }

    fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.payload
    }

    fn total_size(&self) -> u64 {
        self.total_size
    }

    fn free(mut self, ctx: &mut ObjectContext) {
        ctx.record_free(self.node_size());
        let mut next = self.next.take();
        while let Some(mut node) = next {
            next = node.next.take();
            ctx.record_free(node.node_size());
        }
    }
}

impl Drop for GraphItem {
    fn drop(&mut self) {
        // Unlink iteratively so dropping a long chain cannot overflow the stack.
        let mut next = self.next.take();
        while let Some(mut node) = next {
            next = node.next.take();
        }
    }
}
