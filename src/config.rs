//! Configuration for an interval cache.
//!
//! # Example
//!
//! ```
//! use interval_cache::IntervalCacheConfig;
//! use std::time::Duration;
//!
//! // Defaults
//! let config = IntervalCacheConfig::default();
//! assert_eq!(config.flush_interval(), Duration::from_millis(20011));
//! assert_eq!(config.item_expiration_attempts, 5);
//!
//! // Tuned for a fast retry loop
//! let config = IntervalCacheConfig {
//!     name: "webhooks".into(),
//!     flush_interval_ms: 250,
//!     item_expiration_ms: 10_000,
//!     use_fuzzy_rejection: false,
//!     ..Default::default()
//! };
//! assert!(config.auto_start);
//! ```

use std::time::Duration;
use serde::Deserialize;

/// Configuration for an [`IntervalCache`](crate::IntervalCache).
///
/// Every field can be changed while the cache is running via
/// [`IntervalCache::update_config`](crate::IntervalCache::update_config).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IntervalCacheConfig {
    /// Diagnostic label, attached to every event and metric
    #[serde(default = "default_name")]
    pub name: String,

    /// Interval between flush ticks in milliseconds (clamped to at least 1)
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Items admitted longer ago than this (milliseconds) are removed by cleanup
    #[serde(default = "default_item_expiration_ms")]
    pub item_expiration_ms: u64,

    /// Items attempted this many times are removed by cleanup
    #[serde(default = "default_item_expiration_attempts")]
    pub item_expiration_attempts: u32,

    /// Start polling automatically when an item is admitted
    #[serde(default = "default_true")]
    pub auto_start: bool,

    /// Reject or suppress items that are close to other items
    #[serde(default = "default_true")]
    pub use_fuzzy_rejection: bool,
}

fn default_name() -> String { "IntervalCache".to_string() }
fn default_flush_interval_ms() -> u64 { 20_011 }
fn default_item_expiration_ms() -> u64 { 53_000 }
fn default_item_expiration_attempts() -> u32 { 5 }
fn default_true() -> bool { true }

impl Default for IntervalCacheConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            flush_interval_ms: default_flush_interval_ms(),
            item_expiration_ms: default_item_expiration_ms(),
            item_expiration_attempts: default_item_expiration_attempts(),
            auto_start: true,
            use_fuzzy_rejection: true,
        }
    }
}

impl IntervalCacheConfig {
    /// Tick period. Never zero.
    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms.max(1))
    }

    /// Maximum age before an item is expired.
    #[must_use]
    pub fn item_expiration(&self) -> Duration {
        Duration::from_millis(self.item_expiration_ms)
    }
}
