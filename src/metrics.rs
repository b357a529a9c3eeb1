// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for interval caches.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The embedding application is responsible for choosing the exporter.
//!
//! # Metric Naming Convention
//! - `interval_cache_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `cache`: the configured cache name
//! - `outcome` / `reason`: what happened

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

// ═══════════════════════════════════════════════════════════════════════════
// ADMISSION
// ═══════════════════════════════════════════════════════════════════════════

/// Record an admitted item
pub fn record_admitted(cache: &str) {
    counter!(
        "interval_cache_admissions_total",
        "cache" => cache.to_string(),
        "outcome" => "accepted"
    )
    .increment(1);
}

/// Record a refused admission
pub fn record_rejected(cache: &str, reason: &str) {
    counter!(
        "interval_cache_admissions_total",
        "cache" => cache.to_string(),
        "outcome" => "rejected",
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Set current entry count
pub fn set_items(cache: &str, count: usize) {
    gauge!(
        "interval_cache_items",
        "cache" => cache.to_string()
    )
    .set(count as f64);
}

// ═══════════════════════════════════════════════════════════════════════════
// FLUSH PASSES
// ═══════════════════════════════════════════════════════════════════════════

/// Record the outcome of one flush attempt (`success`, `failure`, `fault`, `suppressed`)
pub fn record_flush_attempt(cache: &str, outcome: &str) {
    counter!(
        "interval_cache_flush_attempts_total",
        "cache" => cache.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a pass that could not start because another was running
pub fn record_pass_skipped(cache: &str) {
    counter!(
        "interval_cache_passes_skipped_total",
        "cache" => cache.to_string()
    )
    .increment(1);
}

/// Record a completed flush pass
pub fn record_pass(cache: &str, succeeded: usize, duration: Duration) {
    counter!(
        "interval_cache_passes_total",
        "cache" => cache.to_string()
    )
    .increment(1);
    histogram!(
        "interval_cache_pass_seconds",
        "cache" => cache.to_string()
    )
    .record(duration.as_secs_f64());
    histogram!(
        "interval_cache_pass_succeeded",
        "cache" => cache.to_string()
    )
    .record(succeeded as f64);
}

// ═══════════════════════════════════════════════════════════════════════════
// CLEANUP
// ═══════════════════════════════════════════════════════════════════════════

/// Record removed entries by reason (`resolved`, `age`, `attempts`, `reset`)
pub fn record_removed(cache: &str, reason: &str, count: usize) {
    if count == 0 {
        return;
    }
    counter!(
        "interval_cache_removed_total",
        "cache" => cache.to_string(),
        "reason" => reason.to_string()
    )
    .increment(count as u64);
}

// ═══════════════════════════════════════════════════════════════════════════
// SCHEDULER
// ═══════════════════════════════════════════════════════════════════════════

/// Record a polling state transition
pub fn record_poll_transition(cache: &str, state: &str) {
    counter!(
        "interval_cache_poll_transitions_total",
        "cache" => cache.to_string(),
        "state" => state.to_string()
    )
    .increment(1);
}

/// Set whether polling is running (1 = running, 0 = not)
pub fn set_polling(cache: &str, running: bool) {
    gauge!(
        "interval_cache_polling",
        "cache" => cache.to_string()
    )
    .set(if running { 1.0 } else { 0.0 });
}

/// Record tick duration (flush + cleanup)
pub fn record_tick_duration(cache: &str, duration: Duration) {
    histogram!(
        "interval_cache_tick_seconds",
        "cache" => cache.to_string()
    )
    .record(duration.as_secs_f64());
}

/// A timing guard that records tick duration on drop
pub struct TickTimer<'a> {
    cache: &'a str,
    start: Instant,
}

impl<'a> TickTimer<'a> {
    pub fn new(cache: &'a str) -> Self {
        Self {
            cache,
            start: Instant::now(),
        }
    }
}

impl Drop for TickTimer<'_> {
    fn drop(&mut self) {
        record_tick_duration(self.cache, self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    // Without a recorder installed these are no-ops; they must not panic.

    #[test]
    fn test_admission_metrics() {
        record_admitted("c");
        record_rejected("c", "duplicate_key");
        set_items("c", 3);
    }

    #[test]
    fn test_flush_metrics() {
        record_flush_attempt("c", "success");
        record_flush_attempt("c", "fault");
        record_pass_skipped("c");
        record_pass("c", 2, Duration::from_millis(4));
    }

    #[test]
    fn test_scheduler_metrics() {
        record_poll_transition("c", "running");
        set_polling("c", true);
        {
            let _timer = TickTimer::new("c");
        }
    }

    #[test]
    fn test_counters_reach_recorder() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_admitted("orders");
            record_admitted("orders");
            record_removed("orders", "age", 0);
            record_removed("orders", "attempts", 3);
        });

        let snapshot = snapshotter.snapshot().into_vec();
        let counter_value = |name: &str| {
            snapshot.iter().find_map(|(key, _, _, value)| {
                match (key.key().name() == name, value) {
                    (true, DebugValue::Counter(v)) => Some(*v),
                    _ => None,
                }
            })
        };

        assert_eq!(counter_value("interval_cache_admissions_total"), Some(2));
        // zero-count removals are not recorded at all
        assert_eq!(counter_value("interval_cache_removed_total"), Some(3));
    }
}
