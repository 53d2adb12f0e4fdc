//! Cancellation shared by every pipeline stage.
//!
//! A [`CancelToken`] combines an atomic flag (cheap to poll inside loops)
//! with a channel that disconnects when cancellation is requested. Every
//! blocking send or receive in the pipeline selects on that channel, so a
//! producer blocked on a full queue wakes up instead of deadlocking when its
//! consumer has gone away.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crossbeam_channel::{select, Receiver, RecvTimeoutError, Sender};

/// Marker returned when a blocking operation was abandoned due to cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Cloneable cancellation handle.
#[derive(Debug, Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    trigger: Arc<Mutex<Option<Sender<()>>>>,
    signal: Receiver<()>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// Create a token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(0);
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            trigger: Arc::new(Mutex::new(Some(tx))),
            signal: rx,
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        // Dropping the only sender disconnects every receiver clone at once.
        self.trigger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Shared flag for components that poll rather than select.
    #[must_use]
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Receiver that becomes ready (disconnected) once cancelled.
    #[must_use]
    pub fn signal(&self) -> &Receiver<()> {
        &self.signal
    }

    /// Sleep for `timeout`, returning early with `Err(Cancelled)` if cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] when cancellation arrives before the timeout.
    pub fn sleep(&self, timeout: Duration) -> Result<(), Cancelled> {
        match self.signal.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => Ok(()),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => Err(Cancelled),
        }
    }
}

/// Blocking send that gives up when the token is cancelled.
///
/// # Errors
///
/// Returns [`Cancelled`] if cancellation was requested or the receiving side
/// has disconnected.
pub fn send_or_cancel<T>(tx: &Sender<T>, item: T, cancel: &CancelToken) -> Result<(), Cancelled> {
    if cancel.is_cancelled() {
        return Err(Cancelled);
    }
    select! {
        send(tx, item) -> res => res.map_err(|_| Cancelled),
        recv(cancel.signal()) -> _ => Err(Cancelled),
    }
}

/// Blocking receive that gives up when the token is cancelled.
///
/// Returns `None` when cancelled or when every sender has disconnected
/// and the queue is drained.
pub fn recv_or_cancel<T>(rx: &Receiver<T>, cancel: &CancelToken) -> Option<T> {
    if cancel.is_cancelled() {
        return None;
    }
    select! {
        recv(rx) -> msg => msg.ok(),
        recv(cancel.signal()) -> _ => None,
    }
}
