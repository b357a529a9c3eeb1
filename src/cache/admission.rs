// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Admission: identity and near-duplicate checks before insert.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::debug;

use crate::events::{CacheEvent, RejectReason};
use crate::item::{CacheItem, Entry};

use super::{CacheInner, PollState};

impl<T: CacheItem> CacheInner<T> {
    pub(super) fn admit(self: &Arc<Self>, item: T) -> bool {
        let (name, fuzzy, auto_start) = {
            let config = self.config.borrow();
            (config.name.clone(), config.use_fuzzy_rejection, config.auto_start)
        };
        let key = item.key();

        if self.poll_state() == PollState::Disposed {
            self.reject(&name, &key, RejectReason::Disposed);
            return false;
        }

        if self.store.contains(&key) {
            self.reject(&name, &key, RejectReason::DuplicateKey);
            return false;
        }

        if fuzzy && self.has_live_close_to(&item) {
            self.reject(&name, &key, RejectReason::CloseToLive);
            return false;
        }

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        if !self.store.insert_if_absent(Entry::new(item, sequence)) {
            // Lost a race with a concurrent add of the same key
            self.reject(&name, &key, RejectReason::DuplicateKey);
            return false;
        }

        crate::metrics::record_admitted(&name);
        crate::metrics::set_items(&name, self.store.len());
        self.emit(CacheEvent::ItemAdmitted {
            cache: name.clone(),
            key: format!("{:?}", key),
        });

        if auto_start {
            if let Err(e) = self.start_polling() {
                debug!(cache = %name, error = %e, "Auto-start skipped");
            }
        }
        true
    }

    /// Whether any entry that is not yet resolved reports itself close to
    /// `item`.
    ///
    /// Linear in the number of cached entries: every admission is compared
    /// pairwise against all of them. Fine for bounded retry buffers, not a
    /// similarity index.
    pub(super) fn has_live_close_to(&self, item: &T) -> bool {
        self.store
            .any(|existing| !existing.is_deleted() && existing.item().is_close_to(item))
    }

    fn reject(&self, name: &str, key: &T::Key, reason: RejectReason) {
        crate::metrics::record_rejected(name, &reason.to_string());
        self.emit(CacheEvent::ItemRejected {
            cache: name.to_string(),
            key: format!("{:?}", key),
            reason,
        });
    }
}
