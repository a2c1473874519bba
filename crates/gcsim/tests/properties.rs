//! Property tests for the chooser and the live set

mod common;

use gcsim::bucket::BucketChooser;
use gcsim::object::{Allocatable, GraphItem, ObjectContext};
use gcsim::{BucketSpec, LiveSet, Rand, SizeRange};
use quickcheck::TestResult;
use quickcheck_macros::quickcheck;

#[quickcheck]
fn prop_weight_fidelity(weights: Vec<u8>, rounds: u8) -> TestResult {
    if weights.is_empty() || weights.len() > 8 || weights.contains(&0) || rounds == 0 {
        return TestResult::discard();
    }
    let specs: Vec<BucketSpec> = weights
        .iter()
        .map(|&w| BucketSpec::new(SizeRange::new(100, 200), 0, w as u64))
        .collect();
    let mut chooser = BucketChooser::new(&specs).unwrap();
    let mut rng = Rand::new();

    let total_weight: u64 = weights.iter().map(|&w| w as u64).sum();
    for _ in 0..(total_weight * rounds as u64) {
        chooser.get_next_object_spec(&mut rng);
    }
    let exact = chooser
        .buckets()
        .iter()
        .zip(&weights)
        .all(|(b, &w)| b.count() == w as u64 * rounds as u64);
    TestResult::from_bool(exact)
}

#[quickcheck]
fn prop_survival_and_pin_periodicity(surv: u8, pin: u8, draws: u16) -> TestResult {
    if surv == 0 {
        return TestResult::discard();
    }
    let spec = BucketSpec::new(SizeRange::new(64, 64), surv as u64, 1).with_pin_interval(pin as u64);
    let mut chooser = BucketChooser::new(&[spec]).unwrap();
    let mut rng = Rand::new();

    let mut survived = 0u64;
    let mut pinned = 0u64;
    for _ in 0..draws {
        let s = chooser.get_next_object_spec(&mut rng);
        survived += s.should_survive as u64;
        pinned += s.should_be_pinned as u64;
        if s.should_be_pinned && !s.should_survive {
            return TestResult::failed();
        }
    }

    let expected_survived = draws as u64 / surv as u64;
    let expected_pinned = if pin == 0 { 0 } else { expected_survived / pin as u64 };
    TestResult::from_bool(survived == expected_survived && pinned == expected_pinned)
}

#[quickcheck]
fn prop_sizes_stay_in_range(low: u16, span: u16, draws: u8) -> bool {
    let range = SizeRange::new(low as u64, low as u64 + span as u64);
    let mut chooser = BucketChooser::new(&[BucketSpec::new(range, 1, 1)]).unwrap();
    let mut rng = Rand::new();
    (0..draws).all(|_| {
        let size = chooser.get_next_object_spec(&mut rng).size;
        if span == 0 {
            size == range.low
        } else {
            size >= range.low && size < range.high
        }
    })
}

/// Apply an arbitrary sequence of mutations and check the byte total after each
#[quickcheck]
fn prop_live_set_invariant(ops: Vec<(u8, u8, u16)>) -> bool {
    const SLOTS: usize = 16;
    let mut ctx = ObjectContext::default();
    let mut set: LiveSet<GraphItem> = LiveSet::new(SLOTS);

    for (op, index, size) in ops {
        let index = index as usize % SLOTS;
        let size = size as u64 + 1;
        let ok = match op % 4 {
            0 => set.replace(index, GraphItem::new(size, &mut ctx), &mut ctx).is_ok(),
            1 => set.free(index, &mut ctx).is_ok(),
            2 => {
                // Splice a detached occupant onto a new head and put it back.
                match set.take_and_reduce_total_size_but_do_not_free(index) {
                    Some(taken) => {
                        let mut head = GraphItem::new(size, &mut ctx);
                        head.add_to_end_of_list(taken);
                        set.replace(index, head, &mut ctx).is_ok()
                    },
                    None => true,
                }
            },
            _ => {
                let other = (index + 1) % SLOTS;
                match set.take_and_reduce_total_size_but_do_not_free(other) {
                    Some(taken) => match set.take_and_reduce_total_size_but_do_not_free(index) {
                        Some(mut host) => {
                            host.add_to_end_of_list(taken);
                            set.replace(index, host, &mut ctx).is_ok()
                        },
                        None => set.replace(index, taken, &mut ctx).is_ok(),
                    },
                    None => true,
                }
            },
        };
        if !ok || set.verify().is_err() {
            return false;
        }
    }

    set.free_all(&mut ctx);
    let counters = ctx.counters();
    set.total_live_bytes() == set.overhead()
        && counters.freed == counters.allocated
        && counters.freed_bytes == counters.allocated_bytes
}

#[quickcheck]
fn prop_graph_chain_size_is_sum(sizes: Vec<u16>) -> TestResult {
    if sizes.is_empty() {
        return TestResult::discard();
    }
    let mut ctx = ObjectContext::default();
    let mut head = GraphItem::new(sizes[0] as u64, &mut ctx);
    for &s in &sizes[1..] {
        head.add_to_end_of_list(GraphItem::new(s as u64, &mut ctx));
    }
    let ok = head.total_size() == head.recompute_total_size() && head.chain_len() == sizes.len();
    head.free(&mut ctx);
    TestResult::from_bool(ok && ctx.counters().outstanding() == 0)
}
