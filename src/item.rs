// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache items and their retry bookkeeping.
//!
//! The embedding application implements [`CacheItem`] for its payload type:
//! a stable identity plus an optional near-duplicate predicate. The cache wraps
//! each admitted item in an [`Entry`] which carries the bookkeeping the flush
//! engine and cleanup work from (timestamps, attempt counter, delete flag).

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A unit of retryable work held in an [`IntervalCache`](crate::IntervalCache).
///
/// # Example
///
/// ```
/// use interval_cache::CacheItem;
///
/// struct Webhook { id: u64, url: String, body: String }
///
/// impl CacheItem for Webhook {
///     type Key = u64;
///
///     fn key(&self) -> u64 { self.id }
///
///     // Two deliveries of the same body to the same endpoint are duplicates.
///     fn is_close_to(&self, other: &Self) -> bool {
///         self.url == other.url && self.body == other.body
///     }
/// }
/// ```
pub trait CacheItem: Send + Sync + 'static {
    /// Identity used as the store key. Compared by full equality.
    type Key: Eq + Hash + Clone + Debug + Send + Sync + 'static;

    /// Stable identity for the lifetime of the item.
    fn key(&self) -> Self::Key;

    /// Near-duplicate predicate used by fuzzy rejection.
    ///
    /// Defaults to "never close", so fuzzy rejection is opt-in per item type.
    fn is_close_to(&self, _other: &Self) -> bool {
        false
    }
}

/// Retry bookkeeping for one admitted item.
///
/// Entries are snapshots: cloning one is cheap (the item is behind an `Arc`)
/// and the flush engine replaces the stored state rather than mutating
/// through shared references.
#[derive(Debug)]
pub struct Entry<T: CacheItem> {
    item: Arc<T>,
    key: T::Key,
    sequence: u64,
    original_attempt: Instant,
    last_attempt: Option<Instant>,
    attempts: u32,
    delete_flag: bool,
}

impl<T: CacheItem> Clone for Entry<T> {
    fn clone(&self) -> Self {
        Self {
            item: Arc::clone(&self.item),
            key: self.key.clone(),
            sequence: self.sequence,
            original_attempt: self.original_attempt,
            last_attempt: self.last_attempt,
            attempts: self.attempts,
            delete_flag: self.delete_flag,
        }
    }
}

impl<T: CacheItem> Entry<T> {
    /// Create a fresh entry, stamped with the current time.
    pub(crate) fn new(item: T, sequence: u64) -> Self {
        let key = item.key();
        Self {
            item: Arc::new(item),
            key,
            sequence,
            original_attempt: Instant::now(),
            last_attempt: None,
            attempts: 0,
            delete_flag: false,
        }
    }

    /// The wrapped item.
    #[must_use]
    pub fn item(&self) -> &T {
        &self.item
    }

    /// Shared handle to the wrapped item.
    #[must_use]
    pub fn item_arc(&self) -> Arc<T> {
        Arc::clone(&self.item)
    }

    #[must_use]
    pub fn key(&self) -> &T::Key {
        &self.key
    }

    /// Admission order within the owning cache.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// When the item was admitted. Never changes.
    #[must_use]
    pub fn original_attempt(&self) -> Instant {
        self.original_attempt
    }

    /// When a flush was last attempted, `None` if never.
    #[must_use]
    pub fn last_attempt(&self) -> Option<Instant> {
        self.last_attempt
    }

    /// Number of flush attempts so far (successes, failures and faults).
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether the item has been resolved and awaits removal.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.delete_flag
    }

    /// Time since admission.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.original_attempt.elapsed()
    }

    /// Sort key for flush passes: least recently attempted first, never
    /// attempted before everything else, admission order as tie-breaker.
    pub(crate) fn flush_order(&self) -> (Option<Instant>, u64) {
        (self.last_attempt, self.sequence)
    }

    /// Whether this entry is older than `max_age` at `now`.
    pub(crate) fn is_expired_by_age(&self, now: Instant, max_age: Duration) -> bool {
        now.saturating_duration_since(self.original_attempt) > max_age
    }

    /// State after one flush attempt made at `at`.
    pub(crate) fn record_attempt(&mut self, at: Instant, resolved: bool) {
        self.attempts = self.attempts.saturating_add(1);
        self.last_attempt = Some(at);
        if resolved {
            self.delete_flag = true;
        }
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.delete_flag = true;
    }

    #[cfg(test)]
    pub(crate) fn set_last_attempt(&mut self, at: Option<Instant>) {
        self.last_attempt = at;
    }

    #[cfg(test)]
    pub(crate) fn set_attempts(&mut self, attempts: u32) {
        self.attempts = attempts;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Job {
        id: u32,
        group: &'static str,
    }

    impl CacheItem for Job {
        type Key = u32;

        fn key(&self) -> u32 {
            self.id
        }
    }

    #[test]
    fn test_new_entry() {
        let before = Instant::now();
        let entry = Entry::new(Job { id: 7, group: "a" }, 3);

        assert_eq!(*entry.key(), 7);
        assert_eq!(entry.sequence(), 3);
        assert_eq!(entry.attempts(), 0);
        assert!(entry.last_attempt().is_none());
        assert!(!entry.is_deleted());
        assert!(entry.original_attempt() >= before);
        assert_eq!(entry.item().group, "a");
    }

    #[test]
    fn test_default_is_close_to_is_never() {
        let a = Job { id: 1, group: "same" };
        let b = Job { id: 2, group: "same" };
        assert!(!a.is_close_to(&b));
        assert!(!a.is_close_to(&a));
    }

    #[test]
    fn test_record_attempt_failure() {
        let mut entry = Entry::new(Job { id: 1, group: "a" }, 0);
        let now = Instant::now();
        entry.record_attempt(now, false);

        assert_eq!(entry.attempts(), 1);
        assert_eq!(entry.last_attempt(), Some(now));
        assert!(!entry.is_deleted());
    }

    #[test]
    fn test_record_attempt_success_marks_deleted() {
        let mut entry = Entry::new(Job { id: 1, group: "a" }, 0);
        entry.record_attempt(Instant::now(), true);

        assert_eq!(entry.attempts(), 1);
        assert!(entry.is_deleted());
    }

    #[test]
    fn test_record_attempt_keeps_original_attempt() {
        let mut entry = Entry::new(Job { id: 1, group: "a" }, 0);
        let original = entry.original_attempt();
        entry.record_attempt(Instant::now() + Duration::from_secs(5), false);
        assert_eq!(entry.original_attempt(), original);
    }

    #[test]
    fn test_flush_order_never_attempted_first() {
        let mut attempted = Entry::new(Job { id: 1, group: "a" }, 0);
        attempted.record_attempt(Instant::now(), false);
        let fresh = Entry::new(Job { id: 2, group: "a" }, 1);

        assert!(fresh.flush_order() < attempted.flush_order());
    }

    #[test]
    fn test_flush_order_ties_break_on_sequence() {
        let first = Entry::new(Job { id: 1, group: "a" }, 0);
        let second = Entry::new(Job { id: 2, group: "a" }, 1);
        assert!(first.flush_order() < second.flush_order());
    }

    #[test]
    fn test_expired_by_age() {
        let entry = Entry::new(Job { id: 1, group: "a" }, 0);
        let later = entry.original_attempt() + Duration::from_secs(60);

        assert!(entry.is_expired_by_age(later, Duration::from_secs(53)));
        assert!(!entry.is_expired_by_age(later, Duration::from_secs(60)));
        // now earlier than admission saturates to zero age
        assert!(!entry.is_expired_by_age(entry.original_attempt(), Duration::ZERO));
    }

    #[test]
    fn test_clone_shares_item() {
        let entry = Entry::new(Job { id: 9, group: "x" }, 0);
        let cloned = entry.clone();
        assert!(Arc::ptr_eq(&entry.item_arc(), &cloned.item_arc()));
        assert_eq!(cloned.key(), entry.key());
    }
}
