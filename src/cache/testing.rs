// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Shared fixtures for the cache unit tests.

use std::sync::Arc;
use std::time::Duration;

use crate::events::MemorySink;
use crate::item::{CacheItem, Entry};

use super::{FlushError, IntervalCache};

/// Test item: close to another job on the same topic.
#[derive(Debug, Clone)]
pub(super) struct Job {
    pub(super) id: u32,
    pub(super) topic: String,
}

impl CacheItem for Job {
    type Key = u32;

    fn key(&self) -> u32 {
        self.id
    }

    fn is_close_to(&self, other: &Self) -> bool {
        self.id != other.id && self.topic == other.topic
    }
}

/// A job no other job is close to.
pub(super) fn job(id: u32) -> Job {
    Job { id, topic: format!("unique-{}", id) }
}

pub(super) fn job_on(id: u32, topic: &str) -> Job {
    Job { id, topic: topic.to_string() }
}

/// Cache that never polls on its own: auto-start off, long interval,
/// fuzzy rejection on, events recorded.
pub(super) fn manual_cache<F>(op: F) -> (IntervalCache<Job>, Arc<MemorySink>)
where
    F: Fn(&Entry<Job>) -> Result<bool, FlushError> + Send + Sync + 'static,
{
    let sink = Arc::new(MemorySink::new());
    let cache = IntervalCache::builder()
        .name("test")
        .flush_interval(Duration::from_secs(3600))
        .auto_start(false)
        .fuzzy_rejection(true)
        .flush_with(op)
        .event_sink(sink.clone())
        .build()
        .expect("tests run inside a tokio runtime");
    (cache, sink)
}
