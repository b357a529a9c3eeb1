// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Structured cache events and the sinks that receive them.
//!
//! The cache never logs through a fixed global logger. Every significant
//! action is turned into a [`CacheEvent`] and handed to the [`EventSink`]
//! injected at construction. [`TracingSink`] (the default) forwards events to
//! `tracing`; the embedding application can swap in its own policy.
//!
//! # Example
//!
//! ```
//! use interval_cache::{CacheEvent, EventSink, MemorySink, RejectReason};
//!
//! let sink = MemorySink::new();
//! sink.emit(&CacheEvent::ItemRejected {
//!     cache: "demo".into(),
//!     key: "42".into(),
//!     reason: RejectReason::DuplicateKey,
//! });
//! assert_eq!(sink.len(), 1);
//! ```

use std::time::Duration;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

/// Why an admission was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// An entry with the same identity is already cached
    DuplicateKey,
    /// A live entry reported itself close to the new item
    CloseToLive,
    /// The cache has been disposed
    Disposed,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateKey => write!(f, "duplicate_key"),
            Self::CloseToLive => write!(f, "close_to_live"),
            Self::Disposed => write!(f, "disposed"),
        }
    }
}

/// Why cleanup removed an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpireReason {
    /// Delete flag was set (flushed or suppressed)
    Resolved,
    /// Admitted longer ago than the expiration age
    Age,
    /// Reached the attempt ceiling
    Attempts,
}

impl std::fmt::Display for ExpireReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Resolved => write!(f, "resolved"),
            Self::Age => write!(f, "age"),
            Self::Attempts => write!(f, "attempts"),
        }
    }
}

/// Why polling stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Explicit stop or reset
    Requested,
    /// A tick left the store empty
    Idle,
    /// The cache was disposed
    Disposed,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Requested => write!(f, "requested"),
            Self::Idle => write!(f, "idle"),
            Self::Disposed => write!(f, "disposed"),
        }
    }
}

/// Something the cache did. Keys are rendered with their `Debug` form.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEvent {
    ItemAdmitted { cache: String, key: String },
    ItemRejected { cache: String, key: String, reason: RejectReason },
    PassStarted { cache: String, candidates: usize },
    /// A pass was requested while another was still running
    PassSkipped { cache: String },
    PassCompleted { cache: String, attempted: usize, succeeded: usize, elapsed: Duration },
    ItemFlushed { cache: String, key: String, attempts: u32 },
    ItemFlushFailed { cache: String, key: String, attempts: u32 },
    ItemFlushFaulted { cache: String, key: String, attempts: u32, error: String },
    /// Resolved without a flush because a close item was already handled
    ItemSuppressed { cache: String, key: String },
    ItemExpired { cache: String, key: String, reason: ExpireReason },
    ItemsCleared { cache: String, removed: usize, remaining: usize },
    PollingStarted { cache: String, interval: Duration },
    PollingStopped { cache: String, reason: StopReason },
}

impl CacheEvent {
    /// Short stable name, used as a metrics label.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ItemAdmitted { .. } => "item_admitted",
            Self::ItemRejected { .. } => "item_rejected",
            Self::PassStarted { .. } => "pass_started",
            Self::PassSkipped { .. } => "pass_skipped",
            Self::PassCompleted { .. } => "pass_completed",
            Self::ItemFlushed { .. } => "item_flushed",
            Self::ItemFlushFailed { .. } => "item_flush_failed",
            Self::ItemFlushFaulted { .. } => "item_flush_faulted",
            Self::ItemSuppressed { .. } => "item_suppressed",
            Self::ItemExpired { .. } => "item_expired",
            Self::ItemsCleared { .. } => "items_cleared",
            Self::PollingStarted { .. } => "polling_started",
            Self::PollingStopped { .. } => "polling_stopped",
        }
    }
}

/// Receiver of cache events.
///
/// Called synchronously from whichever thread performed the action (caller
/// of `add`, the flush pass, the scheduler). Implementations should be cheap.
/// No store or scheduler lock is held while a sink runs, so a sink may call
/// back into the cache that emitted the event.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &CacheEvent);
}

/// Default sink: forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &CacheEvent) {
        match event {
            CacheEvent::ItemAdmitted { cache, key } => {
                debug!(cache = %cache, key = %key, "Item admitted");
            }
            CacheEvent::ItemRejected { cache, key, reason } => {
                debug!(cache = %cache, key = %key, reason = %reason, "Item rejected");
            }
            CacheEvent::PassStarted { cache, candidates } => {
                debug!(cache = %cache, candidates, "Flush pass starting");
            }
            CacheEvent::PassSkipped { cache } => {
                debug!(cache = %cache, "Flush pass already in progress, skipping");
            }
            CacheEvent::PassCompleted { cache, attempted, succeeded, elapsed } => {
                info!(cache = %cache, attempted, succeeded, elapsed = ?elapsed, "Flush pass complete");
            }
            CacheEvent::ItemFlushed { cache, key, attempts } => {
                debug!(cache = %cache, key = %key, attempts, "Item flushed");
            }
            CacheEvent::ItemFlushFailed { cache, key, attempts } => {
                debug!(cache = %cache, key = %key, attempts, "Item flush failed, will retry");
            }
            CacheEvent::ItemFlushFaulted { cache, key, attempts, error } => {
                warn!(cache = %cache, key = %key, attempts, error = %error, "Item flush faulted");
            }
            CacheEvent::ItemSuppressed { cache, key } => {
                debug!(cache = %cache, key = %key, "Item suppressed, close item already flushed");
            }
            CacheEvent::ItemExpired { cache, key, reason } => {
                debug!(cache = %cache, key = %key, reason = %reason, "Item removed");
            }
            CacheEvent::ItemsCleared { cache, removed, remaining } => {
                if *removed > 0 {
                    info!(cache = %cache, removed, remaining, "Cleared items");
                }
            }
            CacheEvent::PollingStarted { cache, interval } => {
                info!(cache = %cache, interval = ?interval, "Flush polling started");
            }
            CacheEvent::PollingStopped { cache, reason } => {
                info!(cache = %cache, reason = %reason, "Flush polling stopped");
            }
        }
    }
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: &CacheEvent) {}
}

/// Sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<CacheEvent>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<CacheEvent> {
        self.events.lock().clone()
    }

    /// Recorded events whose [`CacheEvent::kind`] matches.
    #[must_use]
    pub fn of_kind(&self, kind: &str) -> Vec<CacheEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.kind() == kind)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Drain recorded events.
    pub fn take(&self) -> Vec<CacheEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &CacheEvent) {
        self.events.lock().push(event.clone());
    }
}
