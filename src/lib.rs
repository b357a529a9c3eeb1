//! # Interval Cache
//!
//! A concurrent retry buffer: items that could not be delivered (or
//! processed) go into the cache, and a background timer keeps re-invoking a
//! caller-supplied flush operation on them until it succeeds, they age out,
//! or they run out of attempts.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Admission                           │
//! │  • Rejects duplicate keys                                  │
//! │  • Optional fuzzy rejection of near-duplicates             │
//! │  • Auto-starts polling on the first accepted item          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     EntryStore (DashMap)                    │
//! │  • Keyed by item identity                                  │
//! │  • Per-entry atomic state replace                          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                     (every flush interval)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Flush pass → Cleanup                      │
//! │  • Least recently attempted first                          │
//! │  • Faults and panics are contained per entry               │
//! │  • Resolved / aged-out / over-attempted entries removed    │
//! │  • Timer stops itself once the store is empty              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use interval_cache::{CacheItem, FlushError, IntervalCache};
//! use std::time::Duration;
//!
//! #[derive(Debug)]
//! struct Webhook {
//!     id: u64,
//!     url: String,
//! }
//!
//! impl CacheItem for Webhook {
//!     type Key = u64;
//!
//!     fn key(&self) -> u64 {
//!         self.id
//!     }
//!
//!     // Two pending webhooks to the same URL are near-duplicates
//!     fn is_close_to(&self, other: &Self) -> bool {
//!         self.url == other.url
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let cache = IntervalCache::<Webhook>::builder()
//!         .name("webhooks")
//!         .flush_interval(Duration::from_secs(5))
//!         .item_expiration_attempts(10)
//!         .flush_with(|entry| {
//!             // Deliver entry.item(); Ok(true) once it went through
//!             if entry.item().url.starts_with("https://") {
//!                 Ok(true)
//!             } else {
//!                 Err(FlushError::failed("unsupported scheme"))
//!             }
//!         })
//!         .build()
//!         .expect("inside a tokio runtime");
//!
//!     cache.add(Webhook { id: 1, url: "https://example.com/hook".into() });
//!     assert!(cache.is_running());
//! }
//! ```
//!
//! ## Configuration
//!
//! See [`IntervalCacheConfig`] for all configuration options. Every setting
//! can be changed on a live cache; a new flush interval is picked up by the
//! running timer.
//!
//! ## Modules
//!
//! - [`cache`]: The [`IntervalCache`] and its scheduler
//! - [`store`]: Concurrent entry storage
//! - [`item`]: The [`CacheItem`] contract and per-entry bookkeeping
//! - [`events`]: Structured lifecycle events and sinks
//! - [`metrics`]: Counters, gauges and histograms via the `metrics` facade

pub mod config;
pub mod item;
pub mod store;
pub mod events;
pub mod cache;
pub mod metrics;

pub use config::IntervalCacheConfig;
pub use item::{CacheItem, Entry};
pub use store::EntryStore;
pub use events::{CacheEvent, EventSink, ExpireReason, MemorySink, NoopSink, RejectReason, StopReason, TracingSink};
pub use cache::{CacheError, FlushError, FlushFn, IntervalCache, IntervalCacheBuilder, PollState};
pub use metrics::TickTimer;
