//! Graph growth for surviving graph objects
//!
//! While the live set is under its target, each surviving graph item grows
//! the object graph with one of three strategies picked uniformly at random,
//! then replaces a random slot. Once the target is reached the survivor is
//! dropped and random slots are evicted until the live set is back under
//! target.

use serde::Serialize;

use super::{Engine, SurvivorPolicy};
use crate::error::Result;
use crate::object::{Allocatable, GraphItem};

/// Upper bound (exclusive) on items touched by one strategy
const MAX_MIX_ITEMS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixStrategy {
    /// Detach live items and chain them onto the survivor
    AttachExisting,
    /// Chain freshly allocated nodes onto the survivor
    AttachNew,
    /// Allocate fresh items straight into random slots
    MultiReplace,
}

impl MixStrategy {
    fn from_index(index: u64) -> Self {
        match index {
            0 => MixStrategy::AttachExisting,
            1 => MixStrategy::AttachNew,
            _ => MixStrategy::MultiReplace,
        }
    }
}

/// How often each strategy ran and what it did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MixStats {
    pub attach_existing: u64,
    pub attach_new: u64,
    pub multi_replace: u64,
    /// Live items moved into another chain
    pub attached_items: u64,
    /// Nodes and items allocated by the strategies themselves
    pub extra_allocations: u64,
    pub evictions: u64,
}

impl SurvivorPolicy for GraphItem {
    fn absorb(engine: &mut Engine<Self>, item: Self) -> Result<()> {
        engine.absorb_graph(item)
    }
}

impl Engine<GraphItem> {
    pub(crate) fn absorb_graph(&mut self, mut item: GraphItem) -> Result<()> {
        if self.live.total_live_bytes() < self.target_live_bytes {
            self.mix_it_up(&mut item)?;
            self.replace_random_slot(item)
        } else {
            item.free(&mut self.ctx);
            self.evict_until_under_target()
        }
    }

    /// Grow the graph around `item` with a randomly chosen strategy
    pub(crate) fn mix_it_up(&mut self, item: &mut GraphItem) -> Result<()> {
        let strategy = MixStrategy::from_index(self.rng.get_rand(3));
        let count = self.rng.get_rand(MAX_MIX_ITEMS);
        let node_size = item.node_size();

        match strategy {
            MixStrategy::AttachExisting => {
                self.totals.mix.attach_existing += 1;
                for _ in 0..count {
                    let index = self.rng.get_index(self.live.len());
                    if let Some(taken) = self.live.take_and_reduce_total_size_but_do_not_free(index) {
                        item.add_to_end_of_list(taken);
                        self.totals.mix.attached_items += 1;
                    }
                }
            },
            MixStrategy::AttachNew => {
                self.totals.mix.attach_new += 1;
                for _ in 0..count {
                    let node = self.allocate_extra(node_size);
                    item.add_to_end_of_list(node);
                }
            },
            MixStrategy::MultiReplace => {
                self.totals.mix.multi_replace += 1;
                for _ in 0..count {
                    let extra = self.allocate_extra(node_size);
                    self.replace_random_slot(extra)?;
                }
            },
        }
        Ok(())
    }

    /// Extras are counted as allocations but leave the budget alone; only
    /// drawn objects consume it.
    fn allocate_extra(&mut self, size: u64) -> GraphItem {
        let mut node = GraphItem::new(size, &mut self.ctx);
        self.ctx.touch_pages(node.payload_mut());
        self.record_allocation(size);
        self.totals.mix.extra_allocations += 1;
        node
    }

    fn evict_until_under_target(&mut self) -> Result<()> {
        while self.live.total_live_bytes() >= self.target_live_bytes && self.live.occupied() > 0 {
            let index = self.rng.get_index(self.live.len());
            if self.live.get(index).is_some() {
                self.live.free(index, &mut self.ctx)?;
                self.totals.mix.evictions += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::{BucketSpec, SizeRange};
    use crate::collector::SystemCollector;
    use crate::config::{AllocType, Args, Phase, TestKind};
    use std::sync::Arc;

    fn engine(live: u64, alloc: u64) -> Engine<GraphItem> {
        let phase = Phase {
            test_kind: TestKind::Time,
            alloc_type: AllocType::Reference,
            total_live_bytes: live,
            total_alloc_bytes: alloc,
            total_minutes: 0.0,
            buckets: vec![BucketSpec::new(SizeRange::new(200, 400), 1, 1)],
        };
        let args = Args {
            thread_count: 1,
            verify_live_size: true,
            ..Args::single_phase(phase)
        };
        let per_thread = args.per_thread_args().unwrap().remove(0);
        Engine::new(per_thread, Arc::new(SystemCollector::new())).unwrap()
    }

    #[test]
    fn test_strategy_from_index() {
        assert_eq!(MixStrategy::from_index(0), MixStrategy::AttachExisting);
        assert_eq!(MixStrategy::from_index(1), MixStrategy::AttachNew);
        assert_eq!(MixStrategy::from_index(2), MixStrategy::MultiReplace);
    }

    #[test]
    fn test_mix_keeps_live_set_exact() {
        let mut engine = engine(100_000, 1_000_000);
        engine.step().unwrap();
        for _ in 0..500 {
            let mut item = GraphItem::new(300, &mut engine.ctx);
            engine.mix_it_up(&mut item).unwrap();
            engine.replace_random_slot(item).unwrap();
            engine.live.verify().unwrap();
        }
        let mix = engine.totals().mix;
        assert_eq!(mix.attach_existing + mix.attach_new + mix.multi_replace, 500);
        assert!(mix.attach_existing > 0 && mix.attach_new > 0 && mix.multi_replace > 0);
    }

    #[test]
    fn test_extras_are_counted_but_not_charged() {
        let mut engine = engine(100_000, 1_000_000);
        engine.step().unwrap();
        let before = engine.remaining_alloc_bytes();
        let mut item = GraphItem::new(300, &mut engine.ctx);
        for _ in 0..50 {
            engine.mix_it_up(&mut item).unwrap();
        }
        let extras = engine.totals().mix.extra_allocations;
        assert!(extras > 0);
        assert_eq!(engine.remaining_alloc_bytes(), before);
        assert_eq!(engine.totals().allocated_count, extras);
        assert_eq!(engine.totals().allocated_bytes, extras * 300);
        item.free(&mut engine.ctx);
    }

    #[test]
    fn test_over_target_evicts_below_target() {
        let mut engine = engine(20_000, 1_000_000);
        engine.step().unwrap();
        // A freshly filled live set sits at or above its target.
        while engine.live.total_live_bytes() < engine.target_live_bytes {
            let item = GraphItem::new(4000, &mut engine.ctx);
            engine.replace_random_slot(item).unwrap();
        }
        let item = GraphItem::new(300, &mut engine.ctx);
        engine.absorb_graph(item).unwrap();
        assert!(engine.live.total_live_bytes() < engine.target_live_bytes);
        assert!(engine.totals().mix.evictions > 0);
        engine.live.verify().unwrap();
    }

    #[test]
    fn test_full_graph_run_frees_everything() {
        let engine = engine(50_000, 2_000_000);
        let totals = engine.run().unwrap();
        assert_eq!(totals.counters.outstanding(), 0);
        assert_eq!(totals.survived_count, totals.iterations);
    }
}
