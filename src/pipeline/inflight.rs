//! In-flight accounting for scan completion.
//!
//! A scan is complete only when the walker has finished AND every record it
//! dispatched has been settled (aggregated, or dropped with a read error).
//! Queue emptiness says nothing about records still inside a worker.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
struct State {
    producer_closed: bool,
    dispatched: u64,
    settled: u64,
}

impl State {
    fn drained(&self) -> bool {
        self.producer_closed && self.dispatched == self.settled
    }
}

/// Counts records between dispatch by the walker and settlement downstream.
#[derive(Debug, Default)]
pub struct InFlight {
    state: Mutex<State>,
    drained: Condvar,
}

impl InFlight {
    /// Create an empty tracker with the producer still open.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record that one item entered the pipeline.
    pub fn dispatch(&self) {
        self.lock().dispatched += 1;
    }

    /// Record that one item left the pipeline.
    pub fn settle(&self) {
        let mut state = self.lock();
        state.settled += 1;
        debug_assert!(state.settled <= state.dispatched);
        if state.drained() {
            self.drained.notify_all();
        }
    }

    /// Mark the producer finished; no more dispatches follow.
    pub fn close(&self) {
        let mut state = self.lock();
        state.producer_closed = true;
        if state.drained() {
            self.drained.notify_all();
        }
    }

    /// Whether the producer is closed and every dispatched item has settled.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.lock().drained()
    }

    /// Number of items dispatched but not yet settled.
    #[must_use]
    pub fn pending(&self) -> u64 {
        let state = self.lock();
        state.dispatched - state.settled
    }

    /// Wait up to `timeout` for the pipeline to drain.
    ///
    /// Returns `true` if drained.
    pub fn wait_drained(&self, timeout: Duration) -> bool {
        let guard = self.lock();
        let (guard, _) = self
            .drained
            .wait_timeout_while(guard, timeout, |s| !s.drained())
            .unwrap_or_else(PoisonError::into_inner);
        guard.drained()
    }
}
