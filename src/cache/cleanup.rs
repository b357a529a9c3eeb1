// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cleanup: the removal backstop.
//!
//! Removal by age or attempt count does not depend on the flush operation
//! ever succeeding, so every entry eventually leaves the store.

use std::time::{Duration, Instant};

use crate::events::{CacheEvent, ExpireReason, StopReason};
use crate::item::{CacheItem, Entry};

use super::CacheInner;

/// Why `entry` should be removed at `now`, if at all. Resolution wins over
/// age, age over attempts.
fn removal_reason<T: CacheItem>(
    entry: &Entry<T>,
    now: Instant,
    max_age: Duration,
    max_attempts: u32,
) -> Option<ExpireReason> {
    if entry.is_deleted() {
        Some(ExpireReason::Resolved)
    } else if entry.is_expired_by_age(now, max_age) {
        Some(ExpireReason::Age)
    } else if entry.attempts() >= max_attempts {
        Some(ExpireReason::Attempts)
    } else {
        None
    }
}

impl<T: CacheItem> CacheInner<T> {
    pub(super) fn clear_deletable(&self) -> usize {
        if self.store.is_empty() {
            return 0;
        }

        let (name, max_age, max_attempts) = {
            let config = self.config.borrow();
            (config.name.clone(), config.item_expiration(), config.item_expiration_attempts)
        };
        let now = Instant::now();
        let reason_for = |e: &Entry<T>| removal_reason(e, now, max_age, max_attempts);

        let doomed = self.store.collect_where(|e| reason_for(e).is_some());

        let mut resolved = 0;
        let mut by_age = 0;
        let mut by_attempts = 0;

        for candidate in doomed {
            // Re-checked under the shard lock; a racing remover wins or loses
            // atomically.
            let Some(removed) = self.store.remove_if(candidate.key(), |e| reason_for(e).is_some())
            else {
                continue;
            };
            let Some(reason) = reason_for(&removed) else {
                continue;
            };
            match reason {
                ExpireReason::Resolved => resolved += 1,
                ExpireReason::Age => by_age += 1,
                ExpireReason::Attempts => by_attempts += 1,
            }
            self.emit(CacheEvent::ItemExpired {
                cache: name.clone(),
                key: format!("{:?}", removed.key()),
                reason,
            });
        }

        let removed = resolved + by_age + by_attempts;
        let remaining = self.store.len();
        crate::metrics::record_removed(&name, "resolved", resolved);
        crate::metrics::record_removed(&name, "age", by_age);
        crate::metrics::record_removed(&name, "attempts", by_attempts);
        crate::metrics::set_items(&name, remaining);
        self.emit(CacheEvent::ItemsCleared { cache: name, removed, remaining });
        removed
    }

    pub(super) fn clear_and_reset(&self) -> usize {
        self.stop_polling(StopReason::Requested);

        let name = self.name();
        let removed = self
            .store
            .keys()
            .iter()
            .filter(|key| self.store.remove(key).is_some())
            .count();

        let remaining = self.store.len();
        crate::metrics::record_removed(&name, "reset", removed);
        crate::metrics::set_items(&name, remaining);
        self.emit(CacheEvent::ItemsCleared { cache: name, removed, remaining });
        removed
    }
}
