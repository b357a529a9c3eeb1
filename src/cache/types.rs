// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public types for the interval cache.

use std::sync::Arc;
use thiserror::Error;

use crate::item::{CacheItem, Entry};

/// Flush operation invoked once per eligible entry per pass.
///
/// `Ok(true)` resolves the entry, `Ok(false)` leaves it for the next pass,
/// `Err` is a fault: counted as an attempt and otherwise swallowed.
pub type FlushFn<T> = Arc<dyn Fn(&Entry<T>) -> Result<bool, FlushError> + Send + Sync>;

/// Fault raised by (or around) a flush operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlushError {
    #[error("Flush operation failed: {0}")]
    Failed(String),
    #[error("Flush operation panicked: {0}")]
    Panicked(String),
}

impl FlushError {
    /// Wrap any displayable error as a fault.
    pub fn failed(err: impl std::fmt::Display) -> Self {
        Self::Failed(err.to_string())
    }
}

/// Errors from building or driving the cache.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("No tokio runtime available to drive flush polling")]
    NoRuntime,
    #[error("Cache has been disposed")]
    Disposed,
}

/// Scheduler lifecycle state.
///
/// ```text
/// Stopped ⇄ Running
///    └────────┴──→ Disposed (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Timer not running
    Stopped,
    /// Timer ticking: flush, cleanup, auto-stop when empty
    Running,
    /// Timer halted for good
    Disposed,
}

impl std::fmt::Display for PollState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "Stopped"),
            Self::Running => write!(f, "Running"),
            Self::Disposed => write!(f, "Disposed"),
        }
    }
}

/// What the polling task should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TickOutcome {
    Continue,
    Halt,
}

/// Outcome of invoking the flush operation on one entry.
pub(super) type Attempt = Result<bool, FlushError>;

/// Anything that can be turned into a [`FlushFn`].
pub(super) fn boxed_flush_fn<T, F>(f: F) -> FlushFn<T>
where
    T: CacheItem,
    F: Fn(&Entry<T>) -> Result<bool, FlushError> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_state_display() {
        assert_eq!(format!("{}", PollState::Stopped), "Stopped");
        assert_eq!(format!("{}", PollState::Running), "Running");
        assert_eq!(format!("{}", PollState::Disposed), "Disposed");
    }

    #[test]
    fn test_flush_error_display() {
        let err = FlushError::failed("connection refused");
        assert_eq!(err, FlushError::Failed("connection refused".into()));
        assert_eq!(err.to_string(), "Flush operation failed: connection refused");
        assert_eq!(
            FlushError::Panicked("boom".into()).to_string(),
            "Flush operation panicked: boom"
        );
    }

    #[test]
    fn test_cache_error_display() {
        assert_eq!(CacheError::Disposed.to_string(), "Cache has been disposed");
        assert!(CacheError::NoRuntime.to_string().contains("tokio runtime"));
    }
}
