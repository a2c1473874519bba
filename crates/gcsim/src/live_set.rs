//! Live Set - bounded table of retained objects
//!
//! A fixed-length slot array plus a running byte total. The total always
//! equals the table's own overhead plus the sizes of the occupied slots.
//! Detaching an object without freeing it
//! ([`LiveSet::take_and_reduce_total_size_but_do_not_free`]) keeps ownership
//! transfer separate from resource release, so splicing an object into another
//! chain never double-counts or double-frees it.

use crate::error::{Result, SimError};
use crate::object::{Allocatable, ObjectContext};

pub struct LiveSet<T: Allocatable> {
    slots: Vec<Option<T>>,
    total_live_bytes: u64,
    occupied: usize,
}

impl<T: Allocatable> LiveSet<T> {
    /// Create an empty table with `len` slots
    pub fn new(len: usize) -> Self {
        Self {
            slots: (0..len).map(|_| None).collect(),
            total_live_bytes: Self::overhead_for(len),
            occupied: 0,
        }
    }

    /// Bytes the table itself costs for `len` slots
    pub fn overhead_for(len: usize) -> u64 {
        (std::mem::size_of::<Self>() + len * std::mem::size_of::<Option<T>>()) as u64
    }

    pub fn overhead(&self) -> u64 {
        Self::overhead_for(self.slots.len())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of non-empty slots
    pub fn occupied(&self) -> usize {
        self.occupied
    }

    /// Tracked live bytes: own overhead plus occupied slot sizes
    pub fn total_live_bytes(&self) -> u64 {
        self.total_live_bytes
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Fill an empty slot during setup
    pub fn initialize(&mut self, index: usize, item: T) -> Result<()> {
        let slot = self.slot_mut(index)?;
        if slot.is_some() {
            return Err(SimError::InvariantViolation(format!(
                "live set slot {} initialized twice",
                index
            )));
        }
        let size = item.total_size();
        *slot = Some(item);
        self.total_live_bytes += size;
        self.occupied += 1;
        Ok(())
    }

    /// Free the occupant (if any) and install `item`
    pub fn replace(&mut self, index: usize, item: T, ctx: &mut ObjectContext) -> Result<()> {
        let size = item.total_size();
        let old = self.slot_mut(index)?.replace(item);
        match old {
            Some(old) => {
                self.total_live_bytes -= old.total_size();
                old.free(ctx);
            },
            None => self.occupied += 1,
        }
        self.total_live_bytes += size;
        Ok(())
    }

    /// Free and clear a slot; an empty slot is left alone
    pub fn free(&mut self, index: usize, ctx: &mut ObjectContext) -> Result<()> {
        if let Some(old) = self.slot_mut(index)?.take() {
            self.total_live_bytes -= old.total_size();
            self.occupied -= 1;
            old.free(ctx);
        }
        Ok(())
    }

    /// Detach a slot's occupant without releasing it
    ///
    /// The caller becomes the owner and is responsible for freeing it or
    /// installing it somewhere that is accounted.
    pub fn take_and_reduce_total_size_but_do_not_free(&mut self, index: usize) -> Option<T> {
        let item = self.slots.get_mut(index)?.take()?;
        self.total_live_bytes -= item.total_size();
        self.occupied -= 1;
        Some(item)
    }

    /// Recompute live bytes from scratch and compare with the running total
    pub fn verify(&self) -> Result<()> {
        let actual = self.overhead()
            + self
                .slots
                .iter()
                .flatten()
                .map(Allocatable::total_size)
                .sum::<u64>();
        if actual != self.total_live_bytes {
            return Err(SimError::InvariantViolation(format!(
                "live set tracks {} bytes but holds {} bytes",
                self.total_live_bytes, actual
            )));
        }
        let occupied = self.slots.iter().filter(|s| s.is_some()).count();
        if occupied != self.occupied {
            return Err(SimError::InvariantViolation(format!(
                "live set tracks {} occupied slots but holds {}",
                self.occupied, occupied
            )));
        }
        Ok(())
    }

    /// Free every slot
    pub fn free_all(&mut self, ctx: &mut ObjectContext) {
        for slot in &mut self.slots {
            if let Some(item) = slot.take() {
                self.total_live_bytes -= item.total_size();
                item.free(ctx);
            }
        }
        self.occupied = 0;
    }

    fn slot_mut(&mut self, index: usize) -> Result<&mut Option<T>> {
        let len = self.slots.len();
        self.slots.get_mut(index).ok_or_else(|| {
            SimError::InvariantViolation(format!(
                "live set index {} out of bounds for length {}",
                index, len
            ))
        })
    }
}

impl<T: Allocatable + std::fmt::Debug> std::fmt::Debug for LiveSet<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveSet")
            .field("len", &self.slots.len())
            .field("occupied", &self.occupied)
            .field("total_live_bytes", &self.total_live_bytes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{FlatItem, GraphItem};

    #[test]
    fn test_new_set_counts_only_overhead() {
        let set: LiveSet<FlatItem> = LiveSet::new(16);
        assert_eq!(set.total_live_bytes(), set.overhead());
        assert_eq!(set.occupied(), 0);
        assert!(set.verify().is_ok());
    }

    #[test]
    fn test_initialize_twice_is_rejected() {
        let mut ctx = ObjectContext::default();
        let mut set = LiveSet::new(2);
        set.initialize(0, FlatItem::new(100, false, false, &mut ctx)).unwrap();
        let err = set.initialize(0, FlatItem::new(100, false, false, &mut ctx));
        assert!(err.is_err());
        set.free_all(&mut ctx);
    }

    #[test]
    fn test_replace_frees_old_occupant() {
        let mut ctx = ObjectContext::default();
        let mut set = LiveSet::new(1);
        set.initialize(0, FlatItem::new(100, false, false, &mut ctx)).unwrap();
        set.replace(0, FlatItem::new(300, false, false, &mut ctx), &mut ctx).unwrap();
        assert_eq!(set.total_live_bytes(), set.overhead() + 300);
        assert_eq!(ctx.counters().freed, 1);
        assert!(set.verify().is_ok());
        set.free_all(&mut ctx);
        assert_eq!(ctx.counters().outstanding(), 0);
    }

    #[test]
    fn test_free_empty_slot_is_noop() {
        let mut ctx = ObjectContext::default();
        let mut set: LiveSet<FlatItem> = LiveSet::new(3);
        set.free(1, &mut ctx).unwrap();
        assert_eq!(set.total_live_bytes(), set.overhead());
        assert!(set.free(3, &mut ctx).is_err());
    }

    #[test]
    fn test_take_detaches_without_freeing() {
        let mut ctx = ObjectContext::default();
        let mut set = LiveSet::new(2);
        set.initialize(0, GraphItem::new(400, &mut ctx)).unwrap();
        set.initialize(1, GraphItem::new(200, &mut ctx)).unwrap();

        let mut taken = set.take_and_reduce_total_size_but_do_not_free(1).unwrap();
        assert_eq!(ctx.counters().freed, 0);
        assert_eq!(set.total_live_bytes(), set.overhead() + 400);
        assert!(set.take_and_reduce_total_size_but_do_not_free(1).is_none());

        // Splice the detached item into another chain and reinstall it.
        taken.add_to_end_of_list(GraphItem::new(100, &mut ctx));
        set.replace(1, taken, &mut ctx).unwrap();
        assert_eq!(set.total_live_bytes(), set.overhead() + 700);
        assert!(set.verify().is_ok());

        set.free_all(&mut ctx);
        assert_eq!(set.total_live_bytes(), set.overhead());
        assert_eq!(ctx.counters().outstanding(), 0);
    }
}
