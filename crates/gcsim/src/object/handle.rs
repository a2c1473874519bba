//! Handle table
//!
//! Pinned and weak handles are entries in a per-engine slab. An object that
//! takes a handle must give it back exactly once when it is freed; the table's
//! live count lets teardown prove that happened.

/// Kind of external handle an object can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    /// Target must not be relocated while the handle is held
    Pinned,
    /// Tracks the target without keeping it alive
    Weak,
}

/// Index into a [`HandleTable`]
///
/// Deliberately neither `Clone` nor `Copy`: releasing consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct HandleId(usize);

#[derive(Debug, Clone, Copy)]
struct HandleEntry {
    kind: HandleKind,
    target: usize,
}

/// Slab of handle entries with a free list
#[derive(Debug, Default)]
pub struct HandleTable {
    entries: Vec<Option<HandleEntry>>,
    free_list: Vec<usize>,
    live: usize,
    pinned_total: u64,
    weak_total: u64,
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle to the buffer starting at `target`
    pub fn alloc(&mut self, kind: HandleKind, target: *const u8) -> HandleId {
        let entry = HandleEntry {
            kind,
            target: target as usize,
        };
        let index = match self.free_list.pop() {
            Some(index) => {
                self.entries[index] = Some(entry);
                index
            },
            None => {
                self.entries.push(Some(entry));
                self.entries.len() - 1
            },
        };

        self.live += 1;
        match kind {
            HandleKind::Pinned => self.pinned_total += 1,
            HandleKind::Weak => self.weak_total += 1,
        }
        HandleId(index)
    }

    /// Release a handle, returning its kind
    pub fn release(&mut self, id: HandleId) -> Option<HandleKind> {
        let entry = self.entries.get_mut(id.0)?.take()?;
        self.free_list.push(id.0);
        self.live -= 1;
        Some(entry.kind)
    }

    /// Kind and target address of a live handle
    pub fn get(&self, id: &HandleId) -> Option<(HandleKind, usize)> {
        self.entries
            .get(id.0)
            .copied()
            .flatten()
            .map(|e| (e.kind, e.target))
    }

    /// Handles currently held
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Pinned handles ever created
    pub fn pinned_total(&self) -> u64 {
        self.pinned_total
    }

    /// Weak handles ever created
    pub fn weak_total(&self) -> u64 {
        self.weak_total
    }
}
