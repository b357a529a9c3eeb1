// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Interval-driven retry cache.
//!
//! The [`IntervalCache`] ties together the pieces:
//! - admission into a concurrent [`EntryStore`], with optional fuzzy rejection
//! - flush passes that invoke the caller's operation on every live entry
//! - cleanup of resolved, aged-out and over-attempted entries
//! - a polling task that runs flush + cleanup on an interval
//!
//! # Lifecycle
//!
//! ```text
//! Stopped → Running (start / add with auto_start)
//! Running → Stopped (stop / tick leaves the store empty)
//! any     → Disposed (dispose / drop)
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use interval_cache::{CacheItem, IntervalCache};
//! use std::time::Duration;
//!
//! struct Delivery { id: u64 }
//!
//! impl CacheItem for Delivery {
//!     type Key = u64;
//!     fn key(&self) -> u64 { self.id }
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let cache = IntervalCache::<Delivery>::builder()
//!     .name("deliveries")
//!     .flush_interval(Duration::from_millis(500))
//!     .flush_with(|entry| Ok(entry.item().id % 2 == 0))
//!     .build()
//!     .expect("inside a tokio runtime");
//!
//! assert!(cache.add(Delivery { id: 1 }));
//! assert!(cache.is_running());
//! # }
//! ```

mod types;
mod admission;
mod flush;
mod cleanup;
mod lifecycle;
#[cfg(test)]
mod testing;

pub use types::{CacheError, FlushError, FlushFn, PollState};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::config::IntervalCacheConfig;
use crate::events::{CacheEvent, EventSink, TracingSink};
use crate::item::{CacheItem, Entry};
use crate::store::EntryStore;

use lifecycle::PollerSlot;

/// Concurrent retry cache flushed on an interval.
///
/// # Thread Safety
///
/// The cache is `Send + Sync`; share it behind an `Arc`. Admission, manual
/// passes and the polling task operate on the same store concurrently,
/// synchronized only by the store's per-entry atomicity.
///
/// Dropping the cache disposes it.
pub struct IntervalCache<T: CacheItem> {
    inner: Arc<CacheInner<T>>,
}

/// State shared between the public handle and the polling task.
pub(crate) struct CacheInner<T: CacheItem> {
    store: EntryStore<T>,

    /// Current configuration; the polling task subscribes for interval changes
    config: watch::Sender<IntervalCacheConfig>,

    flush_op: RwLock<Option<FlushFn<T>>>,

    sink: Arc<dyn EventSink>,

    /// Held for the whole duration of a flush pass
    flushing: AtomicBool,

    /// Admission sequence, used as flush-order tie-breaker
    sequence: AtomicU64,

    poller: Mutex<PollerSlot>,

    runtime: Handle,
}

impl<T: CacheItem> CacheInner<T> {
    fn emit(&self, event: CacheEvent) {
        self.sink.emit(&event);
    }

    fn name(&self) -> String {
        self.config.borrow().name.clone()
    }

    fn settings(&self) -> IntervalCacheConfig {
        self.config.borrow().clone()
    }
}

/// Builder for [`IntervalCache`].
pub struct IntervalCacheBuilder<T: CacheItem> {
    config: IntervalCacheConfig,
    flush_op: Option<FlushFn<T>>,
    sink: Arc<dyn EventSink>,
    runtime: Option<Handle>,
    start_immediately: bool,
}

impl<T: CacheItem> IntervalCacheBuilder<T> {
    fn new(config: IntervalCacheConfig) -> Self {
        Self {
            config,
            flush_op: None,
            sink: Arc::new(TracingSink),
            runtime: None,
            start_immediately: false,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.config.flush_interval_ms = duration_to_millis(interval);
        self
    }

    /// Items older than this are removed by cleanup (millisecond resolution).
    pub fn item_expiration(mut self, age: Duration) -> Self {
        self.config.item_expiration_ms = duration_to_millis(age);
        self
    }

    pub fn item_expiration_attempts(mut self, attempts: u32) -> Self {
        self.config.item_expiration_attempts = attempts;
        self
    }

    pub fn auto_start(mut self, enabled: bool) -> Self {
        self.config.auto_start = enabled;
        self
    }

    pub fn fuzzy_rejection(mut self, enabled: bool) -> Self {
        self.config.use_fuzzy_rejection = enabled;
        self
    }

    /// The operation every flush pass runs on each live entry.
    pub fn flush_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&Entry<T>) -> Result<bool, FlushError> + Send + Sync + 'static,
    {
        self.flush_op = Some(types::boxed_flush_fn(f));
        self
    }

    /// Replace the default [`TracingSink`].
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Runtime the polling task is spawned on. Defaults to the current one.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Start polling as soon as the cache is built.
    pub fn start_immediately(mut self, enabled: bool) -> Self {
        self.start_immediately = enabled;
        self
    }

    /// Build the cache.
    ///
    /// # Errors
    ///
    /// [`CacheError::NoRuntime`] if no runtime was given and none is current.
    pub fn build(self) -> Result<IntervalCache<T>, CacheError> {
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| CacheError::NoRuntime)?,
        };

        let (config_tx, _) = watch::channel(self.config);
        let cache = IntervalCache {
            inner: Arc::new(CacheInner {
                store: EntryStore::new(),
                config: config_tx,
                flush_op: RwLock::new(self.flush_op),
                sink: self.sink,
                flushing: AtomicBool::new(false),
                sequence: AtomicU64::new(0),
                poller: Mutex::new(PollerSlot::default()),
                runtime,
            }),
        };

        if self.start_immediately {
            cache.start_flush_polling()?;
        }
        Ok(cache)
    }
}

fn duration_to_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl<T: CacheItem> IntervalCache<T> {
    /// Builder starting from [`IntervalCacheConfig::default`].
    #[must_use]
    pub fn builder() -> IntervalCacheBuilder<T> {
        IntervalCacheBuilder::new(IntervalCacheConfig::default())
    }

    /// Builder starting from an explicit configuration.
    #[must_use]
    pub fn with_config(config: IntervalCacheConfig) -> IntervalCacheBuilder<T> {
        IntervalCacheBuilder::new(config)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Admission
    // ═══════════════════════════════════════════════════════════════════

    /// Admit an item.
    ///
    /// Returns `false` (and changes nothing) if an item with the same key is
    /// cached, if fuzzy rejection is on and a live entry is close to it, or if
    /// the cache was disposed. A successful add starts polling when
    /// `auto_start` is set.
    pub fn add(&self, item: T) -> bool {
        self.inner.admit(item)
    }

    /// Number of cached entries, including resolved ones not yet swept.
    #[must_use]
    pub fn get_count(&self) -> usize {
        self.inner.store.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.store.is_empty()
    }

    #[must_use]
    pub fn contains(&self, key: &T::Key) -> bool {
        self.inner.store.contains(key)
    }

    /// Snapshot of one entry.
    #[must_use]
    pub fn get(&self, key: &T::Key) -> Option<Entry<T>> {
        self.inner.store.get(key)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Flush & cleanup
    // ═══════════════════════════════════════════════════════════════════

    /// Run one flush pass now, on the calling thread.
    ///
    /// Returns the number of entries the operation resolved. Returns 0
    /// without touching anything if another pass is still running.
    pub fn flush_cache(&self) -> usize {
        self.inner.flush_pass()
    }

    /// Remove resolved, aged-out and over-attempted entries.
    pub fn clear_deletable_items(&self) -> usize {
        self.inner.clear_deletable()
    }

    /// Stop polling and remove every entry regardless of state.
    pub fn clear_and_reset(&self) -> usize {
        self.inner.clear_and_reset()
    }

    // ═══════════════════════════════════════════════════════════════════
    // Scheduler
    // ═══════════════════════════════════════════════════════════════════

    /// Start the polling task. No-op if already running.
    ///
    /// # Errors
    ///
    /// [`CacheError::Disposed`] once the cache has been disposed.
    pub fn start_flush_polling(&self) -> Result<(), CacheError> {
        self.inner.start_polling()
    }

    /// Stop the polling task. No-op if not running.
    pub fn stop_flush_polling(&self) {
        self.inner.stop_polling(crate::events::StopReason::Requested);
    }

    /// Halt the polling task for good.
    ///
    /// Idempotent and safe to call from any thread, including while a tick
    /// is running. Once this returns no new tick starts.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    #[must_use]
    pub fn poll_state(&self) -> PollState {
        self.inner.poll_state()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.poll_state() == PollState::Running
    }

    /// Whether a flush pass is in progress.
    #[must_use]
    pub fn is_flushing(&self) -> bool {
        self.inner.flushing.load(Ordering::Acquire)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Runtime configuration
    // ═══════════════════════════════════════════════════════════════════

    /// Snapshot of the current configuration.
    #[must_use]
    pub fn config(&self) -> IntervalCacheConfig {
        self.inner.settings()
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.inner.name()
    }

    /// Modify the configuration in place. A changed flush interval is
    /// picked up by a running polling task without a restart.
    pub fn update_config<F>(&self, f: F)
    where
        F: FnOnce(&mut IntervalCacheConfig),
    {
        self.inner.config.send_modify(f);
    }

    pub fn set_name(&self, name: impl Into<String>) {
        let name = name.into();
        self.update_config(|c| c.name = name);
    }

    pub fn set_flush_interval(&self, interval: Duration) {
        self.update_config(|c| c.flush_interval_ms = duration_to_millis(interval));
    }

    /// Millisecond resolution, like the builder setting.
    pub fn set_item_expiration(&self, age: Duration) {
        self.update_config(|c| c.item_expiration_ms = duration_to_millis(age));
    }

    pub fn set_item_expiration_attempts(&self, attempts: u32) {
        self.update_config(|c| c.item_expiration_attempts = attempts);
    }

    pub fn set_auto_start(&self, enabled: bool) {
        self.update_config(|c| c.auto_start = enabled);
    }

    pub fn set_fuzzy_rejection(&self, enabled: bool) {
        self.update_config(|c| c.use_fuzzy_rejection = enabled);
    }

    /// Install or replace the flush operation. Takes effect on the next pass.
    pub fn set_flush_operation<F>(&self, f: F)
    where
        F: Fn(&Entry<T>) -> Result<bool, FlushError> + Send + Sync + 'static,
    {
        *self.inner.flush_op.write() = Some(types::boxed_flush_fn(f));
    }

    /// Remove the flush operation; passes become no-ops until one is set.
    pub fn clear_flush_operation(&self) {
        *self.inner.flush_op.write() = None;
    }
}

impl<T: CacheItem> Drop for IntervalCache<T> {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{job, manual_cache, Job};
    use super::*;

    #[tokio::test]
    async fn test_build_without_runtime_handle_uses_current() {
        let cache: IntervalCache<Job> = IntervalCache::builder().build().unwrap();
        assert_eq!(cache.poll_state(), PollState::Stopped);
        assert_eq!(cache.name(), "IntervalCache");
    }

    #[test]
    fn test_build_outside_runtime_fails() {
        let result: Result<IntervalCache<Job>, _> = IntervalCache::builder().build();
        assert_eq!(result.err(), Some(CacheError::NoRuntime));
    }

    #[test]
    fn test_build_with_explicit_runtime() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let cache: IntervalCache<Job> = IntervalCache::builder()
            .runtime(rt.handle().clone())
            .auto_start(false)
            .build()
            .unwrap();

        assert!(cache.add(job(1)));
        assert_eq!(cache.get_count(), 1);
        assert!(!cache.is_running());
    }

    #[tokio::test]
    async fn test_builder_applies_settings() {
        let cache: IntervalCache<Job> = IntervalCache::builder()
            .name("orders")
            .flush_interval(Duration::from_millis(250))
            .item_expiration(Duration::from_secs(30))
            .item_expiration_attempts(9)
            .auto_start(false)
            .fuzzy_rejection(false)
            .build()
            .unwrap();

        let config = cache.config();
        assert_eq!(config.name, "orders");
        assert_eq!(config.flush_interval_ms, 250);
        assert_eq!(config.item_expiration_ms, 30_000);
        assert_eq!(config.item_expiration_attempts, 9);
        assert!(!config.auto_start);
        assert!(!config.use_fuzzy_rejection);
    }

    #[tokio::test]
    async fn test_start_immediately() {
        let cache: IntervalCache<Job> = IntervalCache::builder()
            .start_immediately(true)
            .build()
            .unwrap();
        assert!(cache.is_running());
    }

    #[tokio::test]
    async fn test_runtime_setters() {
        let (cache, _) = manual_cache(|_| Ok(true));

        cache.set_name("renamed");
        cache.set_flush_interval(Duration::from_secs(2));
        cache.set_item_expiration(Duration::from_secs(7));
        cache.set_item_expiration_attempts(2);
        cache.set_auto_start(true);
        cache.set_fuzzy_rejection(false);

        let config = cache.config();
        assert_eq!(config.name, "renamed");
        assert_eq!(config.flush_interval_ms, 2000);
        assert_eq!(config.item_expiration_ms, 7_000);
        assert_eq!(config.item_expiration_attempts, 2);
        assert!(config.auto_start);
        assert!(!config.use_fuzzy_rejection);
    }

    #[tokio::test]
    async fn test_get_and_contains() {
        let (cache, _) = manual_cache(|_| Ok(true));
        cache.add(job(5));

        assert!(cache.contains(&5));
        assert!(!cache.contains(&6));
        let entry = cache.get(&5).unwrap();
        assert_eq!(entry.attempts(), 0);
        assert!(!cache.is_empty());
    }

    #[tokio::test]
    async fn test_flush_operation_can_be_replaced() {
        let (cache, _) = manual_cache(|_| Ok(false));
        cache.add(job(1));

        assert_eq!(cache.flush_cache(), 0);
        cache.set_flush_operation(|_| Ok(true));
        assert_eq!(cache.flush_cache(), 1);
    }

    #[tokio::test]
    async fn test_drop_disposes() {
        let (cache, _) = manual_cache(|_| Ok(true));
        cache.start_flush_polling().unwrap();
        let inner = Arc::clone(&cache.inner);

        drop(cache);
        assert_eq!(inner.poll_state(), PollState::Disposed);
    }
}
