//! Engine Module - per-thread allocation state machine
//!
//! Each worker owns one [`Engine`] and nothing else: its own chooser, RNG,
//! object context and live set. An engine walks
//! Init → SteadyState → Terminating → Done exactly once.
//!
//! - **Init** fills every live-set slot with a fresh, page-touched object.
//! - **SteadyState** either allocates until the byte or time budget is spent
//!   ([`TestKind::Time`]) or just keeps forcing full collections on the
//!   saturated heap ([`TestKind::HighSurvival`]).
//! - **Terminating** frees every slot and checks that every object and
//!   handle was released.
//!
//! What a surviving object does to the live set depends on its shape; see
//! [`SurvivorPolicy`].

mod mix;

pub use mix::{MixStats, MixStrategy};

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::bucket::{BucketChooser, ObjectSpec};
use crate::collector::{Collector, Generation};
use crate::config::{Phase, PerThreadArgs, TestKind};
use crate::error::{Result, SimError};
use crate::live_set::LiveSet;
use crate::object::{Allocatable, FlatItem, ObjectContext, ObjectCounters};
use crate::random::Rand;

/// Allowed drift of the live bytes after Init from the sized target
pub const LIVE_SIZE_TOLERANCE: f64 = 0.05;

/// How often a high-survival phase forces a full collection
pub const HIGH_SURVIVAL_COLLECT_INTERVAL: Duration = Duration::from_millis(100);

/// Engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Filling the live set
    Init,
    /// Running the phase's workload
    SteadyState,
    /// Releasing everything and checking the books
    Terminating,
    /// Totals are final
    Done,
}

/// What to do with an object drawn as a survivor
pub trait SurvivorPolicy: Allocatable {
    /// Hand a surviving object to the live set
    fn absorb(engine: &mut Engine<Self>, item: Self) -> Result<()>;
}

impl SurvivorPolicy for FlatItem {
    fn absorb(engine: &mut Engine<Self>, item: Self) -> Result<()> {
        engine.replace_random_slot(item)
    }
}

/// Counters one engine reports when it is done
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineTotals {
    pub thread_index: usize,
    /// Objects created while filling the live set
    pub init_count: u64,
    /// Steady-state allocations, including graph extras
    pub allocated_count: u64,
    pub allocated_bytes: u64,
    pub survived_count: u64,
    pub iterations: u64,
    pub live_set_slots: usize,
    pub full_collections_requested: u64,
    pub mix: MixStats,
    #[serde(skip)]
    pub counters: ObjectCounters,
    pub finalized: u64,
    pub pinned_handles: u64,
    pub weak_handles: u64,
}

/// Single-thread allocation engine over object type `T`
pub struct Engine<T: SurvivorPolicy> {
    args: PerThreadArgs,
    phase_index: usize,
    chooser: BucketChooser,
    rng: Rand,
    ctx: ObjectContext,
    collector: Arc<dyn Collector>,
    live: LiveSet<T>,
    state: EngineState,
    remaining_alloc_bytes: i64,
    target_live_bytes: u64,
    totals: EngineTotals,
}

impl<T: SurvivorPolicy> Engine<T> {
    /// Build an engine for one worker's share of the configuration
    ///
    /// # Errors
    ///
    /// `UnsupportedPhaseCount` unless exactly one phase is configured;
    /// `Configuration` for invalid buckets or a live budget too small to
    /// hold a single average-sized object.
    pub fn new(args: PerThreadArgs, collector: Arc<dyn Collector>) -> Result<Self> {
        if args.phases.len() != 1 {
            return Err(SimError::UnsupportedPhaseCount(args.phases.len()));
        }
        let phase = &args.phases[0];
        let chooser = BucketChooser::new(&phase.buckets)?;
        let slots = phase.live_slots()?;

        let target_live_bytes = phase.total_live_bytes;
        let remaining_alloc_bytes = i64::try_from(phase.total_alloc_bytes).unwrap_or(i64::MAX);
        let ctx = ObjectContext::new(args.handle_test);
        let totals = EngineTotals {
            thread_index: args.thread_index,
            live_set_slots: slots,
            ..EngineTotals::default()
        };

        Ok(Self {
            args,
            phase_index: 0,
            chooser,
            rng: Rand::new(),
            ctx,
            collector,
            live: LiveSet::new(slots),
            state: EngineState::Init,
            remaining_alloc_bytes,
            target_live_bytes,
            totals,
        })
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn live_set(&self) -> &LiveSet<T> {
        &self.live
    }

    pub fn context(&self) -> &ObjectContext {
        &self.ctx
    }

    pub fn totals(&self) -> &EngineTotals {
        &self.totals
    }

    pub fn chooser(&self) -> &BucketChooser {
        &self.chooser
    }

    /// Allocation budget left; negative once the last object overshot it
    pub fn remaining_alloc_bytes(&self) -> i64 {
        self.remaining_alloc_bytes
    }

    fn phase(&self) -> &Phase {
        &self.args.phases[self.phase_index]
    }

    /// Run every state to completion and return the totals
    pub fn run(mut self) -> Result<EngineTotals> {
        while self.step()? != EngineState::Done {}
        Ok(self.totals)
    }

    /// Execute the current state and move to the next one
    pub fn step(&mut self) -> Result<EngineState> {
        self.state = match self.state {
            EngineState::Init => {
                self.init()?;
                EngineState::SteadyState
            },
            EngineState::SteadyState => {
                match self.phase().test_kind {
                    TestKind::Time => self.run_time_phase()?,
                    TestKind::HighSurvival => self.run_high_survival_phase(),
                }
                EngineState::Terminating
            },
            EngineState::Terminating => {
                self.terminate()?;
                if self.go_to_next_phase() {
                    EngineState::Init
                } else {
                    EngineState::Done
                }
            },
            EngineState::Done => EngineState::Done,
        };
        Ok(self.state)
    }

    /// Advance to the next configured phase
    ///
    /// Only single-phase runs are supported, so this never switches.
    pub fn go_to_next_phase(&self) -> bool {
        assert_eq!(
            self.args.phases.len(),
            1,
            "engine supports exactly one phase"
        );
        false
    }

    fn should_verify(&self) -> bool {
        self.args.verify_live_size
    }

    fn init(&mut self) -> Result<()> {
        log::debug!(
            "thread {}: filling {} live slots toward {} bytes",
            self.args.thread_index,
            self.live.len(),
            self.target_live_bytes
        );
        for index in 0..self.live.len() {
            let drawn = self.chooser.get_next_object_spec(&mut self.rng);
            // Everything created here is retained regardless of the draw.
            let spec = ObjectSpec {
                should_survive: true,
                ..drawn
            };
            let mut item = T::create(&spec, &mut self.ctx);
            self.ctx.touch_pages(item.payload_mut());
            self.live.initialize(index, item)?;
            self.totals.init_count += 1;
        }
        if self.should_verify() {
            self.live.verify()?;
            self.check_init_live_size()?;
        }
        Ok(())
    }

    /// Compare the bytes Init retained with what the slot table was sized for
    ///
    /// The expectation is `slots * average_object_size`, i.e. the requested
    /// live bytes rounded down to whole slots. Only object payload bytes are
    /// counted; the slot table itself is overhead and not part of the target.
    fn check_init_live_size(&self) -> Result<()> {
        let expected = self.live.len() as u64 * self.chooser.average_object_size();
        crate::error::assert_about_equal(
            "live bytes after init",
            expected,
            self.live.total_live_bytes(),
            LIVE_SIZE_TOLERANCE,
        )
    }

    fn time_limit(&self) -> Option<Duration> {
        let minutes = self.phase().total_minutes;
        (minutes > 0.0).then(|| Duration::from_secs_f64(minutes * 60.0))
    }

    fn run_time_phase(&mut self) -> Result<()> {
        let limit = self.time_limit();
        let start = Instant::now();
        let progress_every = self.args.print_every_nth_iter;

        while self.remaining_alloc_bytes > 0 && !limit.is_some_and(|l| start.elapsed() >= l) {
            self.totals.iterations += 1;

            let spec = self.chooser.get_next_object_spec(&mut self.rng);
            let item = self.allocate(&spec);
            if spec.should_survive {
                self.totals.survived_count += 1;
                T::absorb(self, item)?;
            } else {
                item.free(&mut self.ctx);
            }

            if self.args.prints_progress() && self.totals.iterations % progress_every == 0 {
                self.print_progress();
                if self.should_verify() {
                    self.live.verify()?;
                }
            }
        }

        log::debug!(
            "thread {}: steady state done after {} iterations ({:.2}s)",
            self.args.thread_index,
            self.totals.iterations,
            start.elapsed().as_secs_f64()
        );
        Ok(())
    }

    fn run_high_survival_phase(&mut self) {
        let limit = self.time_limit().unwrap_or_default();
        let start = Instant::now();
        loop {
            self.collector.collect(Generation::Full);
            self.totals.full_collections_requested += 1;

            let elapsed = start.elapsed();
            if elapsed >= limit {
                break;
            }
            std::thread::sleep(HIGH_SURVIVAL_COLLECT_INTERVAL.min(limit - elapsed));
        }
    }

    fn terminate(&mut self) -> Result<()> {
        if self.should_verify() {
            self.live.verify()?;
        }
        self.live.free_all(&mut self.ctx);

        let counters = self.ctx.counters();
        if cfg!(debug_assertions) || self.should_verify() {
            if counters.outstanding() != 0 || counters.freed_bytes != counters.allocated_bytes {
                return Err(SimError::InvariantViolation(format!(
                    "thread {}: {} of {} objects ({} of {} bytes) were freed",
                    self.args.thread_index,
                    counters.freed,
                    counters.allocated,
                    counters.freed_bytes,
                    counters.allocated_bytes
                )));
            }
            let handles = self.ctx.handles().live_count();
            if handles != 0 {
                return Err(SimError::InvariantViolation(format!(
                    "thread {}: {} handles still live after teardown",
                    self.args.thread_index, handles
                )));
            }
        }

        self.totals.counters = counters;
        self.totals.finalized = self.ctx.finalized();
        self.totals.pinned_handles = self.ctx.handles().pinned_total();
        self.totals.weak_handles = self.ctx.handles().weak_total();
        Ok(())
    }

    /// Create a steady-state object, touch its pages and charge the budget
    fn allocate(&mut self, spec: &ObjectSpec) -> T {
        let mut item = T::create(spec, &mut self.ctx);
        self.ctx.touch_pages(item.payload_mut());
        self.charge(spec.size);
        item
    }

    fn charge(&mut self, size: u64) {
        self.remaining_alloc_bytes -= i64::try_from(size).unwrap_or(i64::MAX);
        self.record_allocation(size);
    }

    /// Count a steady-state allocation without touching the budget
    fn record_allocation(&mut self, size: u64) {
        self.totals.allocated_bytes += size;
        self.totals.allocated_count += 1;
    }

    /// Install `item` over a uniformly random slot, freeing the occupant
    pub(crate) fn replace_random_slot(&mut self, item: T) -> Result<()> {
        let index = self.rng.get_index(self.live.len());
        self.live.replace(index, item, &mut self.ctx)
    }

    fn print_progress(&mut self) {
        let thread = self.args.thread_index;
        log::info!(
            "thread {}: iteration {}, live {} bytes in {} of {} slots, {} bytes left",
            thread,
            self.totals.iterations,
            self.live.total_live_bytes(),
            self.live.occupied(),
            self.live.len(),
            self.remaining_alloc_bytes.max(0)
        );
        for (index, bucket) in self.chooser.buckets_mut().iter_mut().enumerate() {
            let range = bucket.spec().size_range;
            let report = bucket.take_report();
            log::info!(
                "  bucket {} [{}]: allocated {} ({} bytes), survived {} ({} bytes), pinned {} ({} bytes), finalizable {}",
                index,
                range,
                report.allocated_count,
                report.allocated_bytes,
                report.survived_count,
                report.survived_bytes,
                report.pinned_count,
                report.pinned_bytes,
                report.finalizable_count
            );
        }
    }
}

impl<T: SurvivorPolicy> std::fmt::Debug for Engine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("thread_index", &self.args.thread_index)
            .field("state", &self.state)
            .field("remaining_alloc_bytes", &self.remaining_alloc_bytes)
            .field("target_live_bytes", &self.target_live_bytes)
            .field("live_slots", &self.live.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::{BucketSpec, SizeRange};
    use crate::collector::{MockCollector, SystemCollector};
    use crate::config::{AllocType, Args};
    use crate::object::GraphItem;

    fn per_thread(phase: Phase, verify: bool) -> PerThreadArgs {
        let args = Args {
            thread_count: 1,
            verify_live_size: verify,
            ..Args::single_phase(phase)
        };
        args.per_thread_args().unwrap().remove(0)
    }

    fn small_phase(alloc_type: AllocType) -> Phase {
        Phase {
            test_kind: TestKind::Time,
            alloc_type,
            total_live_bytes: 1000,
            total_alloc_bytes: 10_000,
            total_minutes: 0.0,
            buckets: vec![BucketSpec::new(SizeRange::new(100, 100), 2, 1)],
        }
    }

    fn collector() -> Arc<dyn Collector> {
        Arc::new(SystemCollector::new())
    }

    #[test]
    fn test_state_sequence() {
        let args = per_thread(small_phase(AllocType::Simple), true);
        let mut engine: Engine<FlatItem> = Engine::new(args, collector()).unwrap();
        assert_eq!(engine.state(), EngineState::Init);
        assert_eq!(engine.step().unwrap(), EngineState::SteadyState);
        assert_eq!(engine.live_set().occupied(), 10);
        assert_eq!(engine.step().unwrap(), EngineState::Terminating);
        assert_eq!(engine.step().unwrap(), EngineState::Done);
        assert_eq!(engine.live_set().occupied(), 0);
        assert_eq!(engine.step().unwrap(), EngineState::Done);
    }

    #[test]
    fn test_flat_scenario_counts() {
        let args = per_thread(small_phase(AllocType::Simple), true);
        let engine: Engine<FlatItem> = Engine::new(args, collector()).unwrap();
        let totals = engine.run().unwrap();
        assert_eq!(totals.init_count, 10);
        assert_eq!(totals.allocated_count, 100);
        assert_eq!(totals.allocated_bytes, 10_000);
        assert_eq!(totals.survived_count, 50);
        assert_eq!(totals.counters.outstanding(), 0);
    }

    #[test]
    fn test_init_does_not_consume_budget() {
        let args = per_thread(small_phase(AllocType::Simple), false);
        let mut engine: Engine<FlatItem> = Engine::new(args, collector()).unwrap();
        engine.step().unwrap();
        assert_eq!(engine.remaining_alloc_bytes(), 10_000);
    }

    #[test]
    fn test_graph_run_balances_counters() {
        let args = per_thread(small_phase(AllocType::Reference), true);
        let engine: Engine<GraphItem> = Engine::new(args, collector()).unwrap();
        let totals = engine.run().unwrap();
        assert!(totals.allocated_bytes >= 10_000);
        assert_eq!(totals.counters.outstanding(), 0);
        assert_eq!(totals.counters.freed_bytes, totals.counters.allocated_bytes);
    }

    #[test]
    fn test_init_live_size_checked_when_verifying() {
        // One 2050-byte slot; the first draw from 100-4000 is 100 bytes.
        let phase = Phase {
            total_live_bytes: 2050,
            buckets: vec![BucketSpec::new(SizeRange::new(100, 4000), 1, 1)],
            ..small_phase(AllocType::Simple)
        };

        let args = per_thread(phase.clone(), true);
        let mut engine: Engine<FlatItem> = Engine::new(args, collector()).unwrap();
        let err = engine.step().unwrap_err();
        assert!(matches!(
            err,
            SimError::ApproximationFailed { expected: 2050, actual: 100, .. }
        ));

        let args = per_thread(phase, false);
        let mut engine: Engine<FlatItem> = Engine::new(args, collector()).unwrap();
        assert_eq!(engine.step().unwrap(), EngineState::SteadyState);
        assert_eq!(engine.live_set().total_live_bytes(), 100);
    }

    #[test]
    fn test_live_budget_below_one_object_rejected() {
        let mut args = per_thread(small_phase(AllocType::Simple), false);
        args.phases[0].total_live_bytes = 50;
        let result = Engine::<FlatItem>::new(args, collector());
        assert!(matches!(result, Err(SimError::Configuration(_))));
    }

    #[test]
    fn test_multiple_phases_rejected_at_construction() {
        let mut args = per_thread(small_phase(AllocType::Simple), false);
        args.phases.push(args.phases[0].clone());
        let result = Engine::<FlatItem>::new(args, collector());
        assert!(matches!(result, Err(SimError::UnsupportedPhaseCount(2))));
    }

    #[test]
    fn test_high_survival_only_collects() {
        let mut phase = small_phase(AllocType::Simple);
        phase.test_kind = TestKind::HighSurvival;
        phase.total_minutes = 0.002;

        let mut mock = MockCollector::new();
        mock.expect_collect()
            .withf(|g| *g == Generation::Full)
            .times(1..)
            .return_const(());

        let args = per_thread(phase, true);
        let engine: Engine<FlatItem> = Engine::new(args, Arc::new(mock)).unwrap();
        let totals = engine.run().unwrap();
        assert_eq!(totals.allocated_count, 0);
        assert!(totals.full_collections_requested >= 1);
        assert_eq!(totals.counters.allocated, totals.init_count);
    }

    #[test]
    fn test_time_limit_stops_steady_state() {
        let mut phase = small_phase(AllocType::Simple);
        phase.total_alloc_bytes = u64::MAX / 2;
        phase.total_minutes = 0.001;
        let args = per_thread(phase, false);
        let engine: Engine<FlatItem> = Engine::new(args, collector()).unwrap();
        let totals = engine.run().unwrap();
        assert!(totals.allocated_count > 0);
        assert_eq!(totals.counters.outstanding(), 0);
    }
}
