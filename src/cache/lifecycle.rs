// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Scheduler lifecycle: start, stop, dispose and the polling loop.
//!
//! The polling task holds only a `Weak` reference to the cache. Each tick it
//! upgrades, runs flush + cleanup on the blocking pool (the flush operation
//! is synchronous user code) and stops itself once the store is empty.
//!
//! Every start bumps a generation counter. A tick only does work while its
//! generation is the current one and the state is `Running`, so a stale task
//! that survives a stop/start cycle can never run a pass.

use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::config::IntervalCacheConfig;
use crate::events::{CacheEvent, StopReason};
use crate::item::CacheItem;
use crate::metrics::TickTimer;

use super::types::TickOutcome;
use super::{CacheError, CacheInner, PollState};

/// Scheduler state, guarded by the cache's poller mutex.
pub(super) struct PollerSlot {
    state: PollState,
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl Default for PollerSlot {
    fn default() -> Self {
        Self {
            state: PollState::Stopped,
            generation: 0,
            task: None,
        }
    }
}

impl<T: CacheItem> CacheInner<T> {
    pub(super) fn poll_state(&self) -> PollState {
        self.poller.lock().state
    }

    pub(super) fn start_polling(self: &Arc<Self>) -> Result<(), CacheError> {
        let interval = {
            let mut slot = self.poller.lock();
            match slot.state {
                PollState::Disposed => return Err(CacheError::Disposed),
                PollState::Running => return Ok(()),
                PollState::Stopped => {}
            }

            slot.generation += 1;
            let config_rx = self.config.subscribe();
            let interval = config_rx.borrow().flush_interval();
            let task = self.runtime.spawn(poll_loop(
                Arc::downgrade(self),
                slot.generation,
                config_rx,
            ));
            slot.task = Some(task);
            slot.state = PollState::Running;
            interval
        };

        // Emitted outside the lock: sinks may call back into the cache
        let name = self.name();
        crate::metrics::record_poll_transition(&name, "running");
        crate::metrics::set_polling(&name, true);
        self.emit(CacheEvent::PollingStarted { cache: name, interval });
        Ok(())
    }

    /// Returns whether polling was running.
    pub(super) fn stop_polling(&self, reason: StopReason) -> bool {
        let task = {
            let mut slot = self.poller.lock();
            if slot.state != PollState::Running {
                return false;
            }
            slot.state = PollState::Stopped;
            slot.task.take()
        };
        if let Some(task) = task {
            task.abort();
        }

        self.announce_stopped(reason);
        true
    }

    pub(super) fn dispose(&self) {
        let (was_running, task) = {
            let mut slot = self.poller.lock();
            if slot.state == PollState::Disposed {
                return;
            }
            let was_running = slot.state == PollState::Running;
            slot.state = PollState::Disposed;
            (was_running, slot.task.take())
        };
        if let Some(task) = task {
            task.abort();
        }

        let name = self.name();
        crate::metrics::record_poll_transition(&name, "disposed");
        if was_running {
            self.announce_stopped(StopReason::Disposed);
        } else {
            debug!(cache = %name, "Cache disposed");
        }
    }

    fn announce_stopped(&self, reason: StopReason) {
        let name = self.name();
        if reason != StopReason::Disposed {
            crate::metrics::record_poll_transition(&name, "stopped");
        }
        crate::metrics::set_polling(&name, false);
        self.emit(CacheEvent::PollingStopped { cache: name, reason });
    }

    fn is_current(&self, generation: u64) -> bool {
        let slot = self.poller.lock();
        slot.state == PollState::Running && slot.generation == generation
    }

    /// One scheduled tick: flush, clean up, stop if nothing is left.
    pub(super) fn on_tick(&self, generation: u64) -> TickOutcome {
        if !self.is_current(generation) {
            return TickOutcome::Halt;
        }

        let name = self.name();
        {
            let _timer = TickTimer::new(&name);
            self.flush_pass();
            self.clear_deletable();
        }

        if !self.store.is_empty() {
            return TickOutcome::Continue;
        }

        // Emptiness re-checked under the lock: an add that lands after this
        // decision finds the slot Stopped and starts a fresh task.
        let stopped = {
            let mut slot = self.poller.lock();
            if slot.state == PollState::Running
                && slot.generation == generation
                && self.store.is_empty()
            {
                slot.state = PollState::Stopped;
                // This task is the one running; dropping the handle detaches it
                slot.task = None;
                true
            } else {
                false
            }
        };

        if stopped {
            self.announce_stopped(StopReason::Idle);
            TickOutcome::Halt
        } else if self.is_current(generation) {
            TickOutcome::Continue
        } else {
            TickOutcome::Halt
        }
    }
}

fn ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Polling task body. Exits when halted, when the cache is gone, or when the
/// configuration channel closes.
async fn poll_loop<T: CacheItem>(
    cache: Weak<CacheInner<T>>,
    generation: u64,
    mut config_rx: watch::Receiver<IntervalCacheConfig>,
) {
    let mut period = config_rx.borrow().flush_interval();
    let mut interval = ticker(period);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let Some(inner) = cache.upgrade() else { break };
                match tokio::task::spawn_blocking(move || inner.on_tick(generation)).await {
                    Ok(TickOutcome::Continue) => {}
                    Ok(TickOutcome::Halt) => break,
                    Err(e) => warn!(error = %e, "Flush tick did not complete"),
                }
            }

            changed = config_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let next = config_rx.borrow_and_update().flush_interval();
                if next != period {
                    debug!(from = ?period, to = ?next, "Flush interval changed");
                    period = next;
                    interval = ticker(period);
                }
            }
        }
    }
}
