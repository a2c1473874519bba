//! Flat item: one owned byte buffer

use super::{new_payload, Allocatable, Finalizer, HandleId, HandleKind, ObjectContext};
use crate::bucket::ObjectSpec;

/// Bytes a flat item costs beyond its payload
pub const FLAT_ITEM_OVERHEAD: u64 = std::mem::size_of::<FlatItem>() as u64;

/// A flat object: payload buffer plus an optional handle and finalizer
///
/// The payload is sized so that `total_size()` equals the requested size
/// whenever the request is at least [`FLAT_ITEM_OVERHEAD`].
#[derive(Debug)]
pub struct FlatItem {
    payload: Box<[u8]>,
    handle: Option<HandleId>,
    finalizer: Option<Finalizer>,
}

impl FlatItem {
    /// Allocate a flat item of `size` total bytes
    pub fn new(size: u64, pinned: bool, finalizable: bool, ctx: &mut ObjectContext) -> Self {
        Self::with_handle(size, pinned.then_some(HandleKind::Pinned), finalizable, ctx)
    }

    fn with_handle(
        size: u64,
        handle_kind: Option<HandleKind>,
        finalizable: bool,
        ctx: &mut ObjectContext,
    ) -> Self {
        let payload = new_payload(size.saturating_sub(FLAT_ITEM_OVERHEAD));
        let handle = handle_kind.map(|kind| ctx.handles_mut().alloc(kind, payload.as_ptr()));
        let finalizer = finalizable.then(|| ctx.finalizer());

        let item = Self {
            payload,
            handle,
            finalizer,
        };
        ctx.record_alloc(item.total_size());
        item
    }

    pub fn is_pinned(&self, ctx: &ObjectContext) -> bool {
        self.handle_kind(ctx) == Some(HandleKind::Pinned)
    }

    pub fn handle_kind(&self, ctx: &ObjectContext) -> Option<HandleKind> {
        self.handle
            .as_ref()
            .and_then(|id| ctx.handles().get(id))
            .map(|(kind, _)| kind)
    }

    pub fn is_finalizable(&self) -> bool {
        self.finalizer.is_some()
    }
}

impl Allocatable for FlatItem {
    fn create(spec: &ObjectSpec, ctx: &mut ObjectContext) -> Self {
        // Handles and finalizers only make sense on objects that outlive their draw.
        if !spec.should_survive {
            return Self::with_handle(spec.size, None, false, ctx);
        }
        let handle_kind = if spec.should_be_pinned {
            Some(HandleKind::Pinned)
        } else if ctx.handle_test() {
            Some(HandleKind::Weak)
        } else {
            None
        };
        Self::with_handle(spec.size, handle_kind, spec.should_be_finalizable, ctx)
    }

    fn payload(&self) -> &[u8] {
        &self.payload
    }

    fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.payload
    }

    fn total_size(&self) -> u64 {
        self.payload.len() as u64 + FLAT_ITEM_OVERHEAD
    }

    fn free(mut self, ctx: &mut ObjectContext) {
        let size = self.total_size();
        if let Some(id) = self.handle.take() {
            ctx.handles_mut().release(id);
        }
        // Runs the finalizer.
        drop(self.finalizer.take());
        ctx.record_free(size);
    }
}
