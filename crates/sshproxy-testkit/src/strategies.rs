//! Property test strategies for delivery schedules

use proptest::prelude::*;

pub use proptest;

/// One step of a simulated schedule. Indices are reduced modulo the
/// cluster size by whoever runs the schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Deliver `Install` to a unit
    Install(usize),
    /// Deliver the oldest queued notification of a unit
    Deliver(usize),
    /// Re-deliver a unit's deferred events
    Tick(usize),
    /// Make a unit the leader immediately
    Elect(usize),
    /// Move leadership to a unit after a number of further leadership queries
    FailoverAfter {
        /// Leadership queries answered before the move
        queries: u64,
        /// New leader
        to: usize,
    },
    /// Rebuild a unit's runtime over its persisted state
    Restart(usize),
    /// Deliver `Install` to a unit that dies after `writes` storage writes
    Crash {
        /// Unit that crashes
        unit: usize,
        /// Storage writes that complete before the crash
        writes: usize,
    },
    /// Add a unit to the cluster and install it
    Join,
}

/// One schedule step over a cluster of (initially) `units` units
pub fn arb_step(units: usize) -> impl Strategy<Value = Step> {
    // Wider than the initial size so units added by `Join` get picked too
    let unit = 0..units.max(1) * 2;
    prop_oneof![
        3 => unit.clone().prop_map(Step::Install),
        6 => unit.clone().prop_map(Step::Deliver),
        2 => unit.clone().prop_map(Step::Tick),
        1 => unit.clone().prop_map(Step::Elect),
        1 => (0u64..4, unit.clone()).prop_map(|(queries, to)| Step::FailoverAfter { queries, to }),
        1 => unit.clone().prop_map(Step::Restart),
        2 => (unit, 0usize..6).prop_map(|(unit, writes)| Step::Crash { unit, writes }),
        1 => Just(Step::Join),
    ]
}

/// Schedules of up to `max_len` steps over `units` units
pub fn arb_schedule(units: usize, max_len: usize) -> impl Strategy<Value = Vec<Step>> {
    proptest::collection::vec(arb_step(units), 0..=max_len)
}
