// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;

use crate::item::{CacheItem, Entry};

/// Concurrent identity → entry map.
///
/// Every operation is individually atomic (per-shard locking). Iteration is
/// a consistent view per shard but not a linearizable snapshot of the whole map.
/// Closures passed in run under a shard lock and must not call back into the
/// store.
pub struct EntryStore<T: CacheItem> {
    data: DashMap<T::Key, Entry<T>>,
}

impl<T: CacheItem> EntryStore<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    /// Get current entry count
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn contains(&self, key: &T::Key) -> bool {
        self.data.contains_key(key)
    }

    /// Snapshot of one entry.
    #[must_use]
    pub fn get(&self, key: &T::Key) -> Option<Entry<T>> {
        self.data.get(key).map(|r| r.value().clone())
    }

    /// Insert only if the key is vacant. Returns `false` if it was occupied.
    pub fn insert_if_absent(&self, entry: Entry<T>) -> bool {
        match self.data.entry(entry.key().clone()) {
            MapEntry::Occupied(_) => false,
            MapEntry::Vacant(slot) => {
                slot.insert(entry);
                true
            }
        }
    }

    /// Replace the state of an existing entry. Returns the new state, or
    /// `None` if the key is no longer present.
    pub fn update<F>(&self, key: &T::Key, f: F) -> Option<Entry<T>>
    where
        F: FnOnce(&mut Entry<T>),
    {
        let mut slot = self.data.get_mut(key)?;
        let mut next = slot.value().clone();
        f(&mut next);
        *slot.value_mut() = next.clone();
        Some(next)
    }

    /// Remove the entry if `predicate` still holds for it. Only one of several
    /// racing removers gets `Some`.
    pub fn remove_if<F>(&self, key: &T::Key, predicate: F) -> Option<Entry<T>>
    where
        F: FnOnce(&Entry<T>) -> bool,
    {
        self.data
            .remove_if(key, |_, entry| predicate(entry))
            .map(|(_, entry)| entry)
    }

    pub fn remove(&self, key: &T::Key) -> Option<Entry<T>> {
        self.data.remove(key).map(|(_, entry)| entry)
    }

    /// True if any entry satisfies `predicate`.
    pub fn any<F>(&self, mut predicate: F) -> bool
    where
        F: FnMut(&Entry<T>) -> bool,
    {
        self.data.iter().any(|r| predicate(r.value()))
    }

    /// Snapshot of all entries matching `predicate`.
    pub fn collect_where<F>(&self, mut predicate: F) -> Vec<Entry<T>>
    where
        F: FnMut(&Entry<T>) -> bool,
    {
        self.data
            .iter()
            .filter(|r| predicate(r.value()))
            .map(|r| r.value().clone())
            .collect()
    }

    /// Snapshot of every key.
    pub fn keys(&self) -> Vec<T::Key> {
        self.data.iter().map(|r| r.key().clone()).collect()
    }

    #[cfg(test)]
    pub(crate) fn with_entry_mut<F>(&self, key: &T::Key, f: F) -> bool
    where
        F: FnOnce(&mut Entry<T>),
    {
        match self.data.get_mut(key) {
            Some(mut slot) => {
                f(slot.value_mut());
                true
            }
            None => false,
        }
    }
}

impl<T: CacheItem> Default for EntryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}
