//! Property-based tests for admission, flush and cleanup invariants.
//!
//! Uses proptest to generate random admission sequences and flush outcomes
//! and verify the cache's bookkeeping holds for all of them.
//!
//! Run with: `cargo test --test proptest_fuzz`

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::Mutex;
use proptest::prelude::*;
use tokio::runtime::Runtime;

use interval_cache::{CacheItem, FlushError, IntervalCache};

// =============================================================================
// Fixtures
// =============================================================================

#[derive(Debug, Clone)]
struct Task {
    id: u16,
    group: u8,
}

impl CacheItem for Task {
    type Key = u16;

    fn key(&self) -> u16 {
        self.id
    }

    fn is_close_to(&self, other: &Self) -> bool {
        self.group == other.group
    }
}

/// Shared runtime; the caches never start polling, they only need a handle.
fn runtime() -> &'static Runtime {
    static RUNTIME: OnceLock<Runtime> = OnceLock::new();
    RUNTIME.get_or_init(|| Runtime::new().expect("tokio runtime"))
}

fn cache(fuzzy: bool, max_attempts: u32) -> IntervalCache<Task> {
    IntervalCache::<Task>::builder()
        .name("prop")
        .flush_interval(Duration::from_secs(3600))
        .item_expiration(Duration::from_secs(3600))
        .item_expiration_attempts(max_attempts)
        .auto_start(false)
        .fuzzy_rejection(fuzzy)
        .runtime(runtime().handle().clone())
        .build()
        .expect("explicit runtime")
}

// =============================================================================
// Strategies
// =============================================================================

/// Admission sequences with plenty of repeated ids and groups
fn task_sequence_strategy() -> impl Strategy<Value = Vec<Task>> {
    prop::collection::vec((0u16..32, 0u8..8).prop_map(|(id, group)| Task { id, group }), 0..64)
}

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Resolve,
    Retry,
    Fault,
    Panic,
}

fn outcome_strategy() -> impl Strategy<Value = Outcome> {
    prop_oneof![
        Just(Outcome::Resolve),
        Just(Outcome::Retry),
        Just(Outcome::Fault),
        Just(Outcome::Panic),
    ]
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Without fuzzy rejection, exactly the first occurrence of each id is
    /// admitted.
    #[test]
    fn admission_accepts_first_of_each_key(tasks in task_sequence_strategy()) {
        let cache = cache(false, 5);
        let mut seen = HashSet::new();

        for task in tasks {
            let first = seen.insert(task.id);
            prop_assert_eq!(cache.add(task), first);
        }
        prop_assert_eq!(cache.get_count(), seen.len());
    }

    /// With fuzzy rejection, no two cached (unresolved) tasks share a group.
    #[test]
    fn fuzzy_admission_keeps_groups_unique(tasks in task_sequence_strategy()) {
        let cache = cache(true, 5);
        let mut ids = HashSet::new();
        let mut groups = HashSet::new();

        for task in tasks {
            let (id, group) = (task.id, task.group);
            if cache.add(task) {
                prop_assert!(ids.insert(id));
                prop_assert!(groups.insert(group));
            }
        }
        prop_assert_eq!(cache.get_count(), ids.len());
    }

    /// An item that is never resolved survives exactly `max_attempts - 1`
    /// passes and is removed after the `max_attempts`-th.
    #[test]
    fn attempt_ceiling_is_exact(max_attempts in 1u32..8, count in 1u16..10) {
        let cache = cache(false, max_attempts);
        cache.set_flush_operation(|_| Ok(false));
        for id in 0..count {
            cache.add(Task { id, group: 0 });
        }

        for _ in 1..max_attempts {
            cache.flush_cache();
            prop_assert_eq!(cache.clear_deletable_items(), 0);
        }
        cache.flush_cache();
        prop_assert_eq!(cache.clear_deletable_items(), usize::from(count));
        prop_assert!(cache.is_empty());
    }

    /// Every pass attempts each unresolved entry exactly once, whatever the
    /// operation does, and cleanup leaves nothing deletable behind.
    #[test]
    fn passes_and_cleanup_hold_invariants(
        outcomes in prop::collection::vec(outcome_strategy(), 1..24),
        passes in 1usize..6,
    ) {
        let max_attempts = 4;
        let cache = cache(false, max_attempts);
        let outcomes = Arc::new(outcomes);
        let calls = Arc::new(Mutex::new(Vec::new()));

        let table = outcomes.clone();
        let log = calls.clone();
        cache.set_flush_operation(move |entry| {
            let id = *entry.key();
            log.lock().push(id);
            match table[usize::from(id)] {
                Outcome::Resolve => Ok(true),
                Outcome::Retry => Ok(false),
                Outcome::Fault => Err(FlushError::failed("fault")),
                Outcome::Panic => panic!("operation panicked"),
            }
        });
        for id in 0..outcomes.len() {
            cache.add(Task { id: id as u16, group: 0 });
        }

        for _ in 0..passes {
            let live: HashSet<u16> = (0..outcomes.len() as u16)
                .filter(|id| cache.get(id).map_or(false, |e| !e.is_deleted()))
                .collect();

            calls.lock().clear();
            cache.flush_cache();
            let attempted = calls.lock().clone();

            prop_assert_eq!(attempted.len(), live.len());
            prop_assert_eq!(attempted.into_iter().collect::<HashSet<_>>(), live);
            prop_assert!(!cache.is_flushing());

            cache.clear_deletable_items();
            for id in 0..outcomes.len() as u16 {
                if let Some(entry) = cache.get(&id) {
                    prop_assert!(!entry.is_deleted());
                    prop_assert!(entry.attempts() < max_attempts);
                }
            }
            prop_assert_eq!(cache.clear_deletable_items(), 0);
        }
    }
}
