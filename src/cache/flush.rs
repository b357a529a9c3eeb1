// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Flush passes.
//!
//! One pass snapshots every unresolved entry, orders them least recently
//! attempted first, and invokes the flush operation on each in turn. The
//! operation runs outside any store lock; the resulting state is written back
//! as a single atomic replace of the entry.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::debug;

use crate::events::CacheEvent;
use crate::item::{CacheItem, Entry};

use super::types::{Attempt, FlushFn};
use super::{CacheInner, FlushError};

/// Holds the in-progress flag for the lifetime of a pass.
///
/// Released on drop, so the flag clears exactly once per pass, at its end,
/// even if a sink or the sort panics.
struct FlushGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> FlushGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl<T: CacheItem> CacheInner<T> {
    /// Run one flush pass. Returns the number of entries resolved by the
    /// flush operation.
    pub(super) fn flush_pass(&self) -> usize {
        let name = self.name();

        let Some(_guard) = FlushGuard::acquire(&self.flushing) else {
            crate::metrics::record_pass_skipped(&name);
            self.emit(CacheEvent::PassSkipped { cache: name });
            return 0;
        };

        let Some(operation) = self.flush_op.read().clone() else {
            debug!(cache = %name, "No flush operation installed, nothing to do");
            return 0;
        };

        let fuzzy = self.config.borrow().use_fuzzy_rejection;
        let mut candidates = self.store.collect_where(|e| !e.is_deleted());
        if candidates.is_empty() {
            return 0;
        }
        candidates.sort_by_key(Entry::flush_order);

        let started = Instant::now();
        self.emit(CacheEvent::PassStarted {
            cache: name.clone(),
            candidates: candidates.len(),
        });

        let mut attempted = 0;
        let mut succeeded = 0;

        for candidate in candidates {
            let key = candidate.key();

            // Removed since the snapshot (reset or concurrent cleanup)
            let Some(current) = self.store.get(key) else {
                continue;
            };

            if fuzzy && self.has_deleted_close_to(current.item()) {
                self.store.update(key, Entry::mark_deleted);
                crate::metrics::record_flush_attempt(&name, "suppressed");
                self.emit(CacheEvent::ItemSuppressed {
                    cache: name.clone(),
                    key: format!("{:?}", key),
                });
                continue;
            }

            let outcome = invoke(&operation, &current);
            let resolved = matches!(outcome, Ok(true));
            let attempts = self
                .store
                .update(key, |e| e.record_attempt(Instant::now(), resolved))
                .map_or(current.attempts().saturating_add(1), |e| e.attempts());
            attempted += 1;

            let key = format!("{:?}", key);
            match outcome {
                Ok(true) => {
                    succeeded += 1;
                    crate::metrics::record_flush_attempt(&name, "success");
                    self.emit(CacheEvent::ItemFlushed { cache: name.clone(), key, attempts });
                }
                Ok(false) => {
                    crate::metrics::record_flush_attempt(&name, "failure");
                    self.emit(CacheEvent::ItemFlushFailed { cache: name.clone(), key, attempts });
                }
                Err(e) => {
                    crate::metrics::record_flush_attempt(&name, "fault");
                    self.emit(CacheEvent::ItemFlushFaulted {
                        cache: name.clone(),
                        key,
                        attempts,
                        error: e.to_string(),
                    });
                }
            }
        }

        let elapsed = started.elapsed();
        crate::metrics::record_pass(&name, succeeded, elapsed);
        self.emit(CacheEvent::PassCompleted {
            cache: name,
            attempted,
            succeeded,
            elapsed,
        });
        succeeded
    }

    /// Whether an already-resolved entry is close to `item`. Same linear
    /// cost as the admission check.
    fn has_deleted_close_to(&self, item: &T) -> bool {
        self.store
            .any(|existing| existing.is_deleted() && existing.item().is_close_to(item))
    }
}

/// Call the flush operation, turning a panic into a fault.
fn invoke<T: CacheItem>(operation: &FlushFn<T>, entry: &Entry<T>) -> Attempt {
    match panic::catch_unwind(AssertUnwindSafe(|| operation(entry))) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            Err(FlushError::Panicked(message))
        }
    }
}
