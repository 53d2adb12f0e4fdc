//! Periodic statistics snapshots.
//!
//! [`StatsSnapshot`] combines the registry counters with elapsed time and
//! the completion flag; throughput, duplicate percentage and its severity
//! band are derived on read, never stored.
//! [`StatsReporter`] emits one snapshot per interval until it has emitted a
//! snapshot that shows the scan complete (or the scan is cancelled).

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use super::cancel::CancelToken;
use super::inflight::InFlight;
use crate::duplicates::{Counters, SharedRegistry};
use crate::progress::ScanObserver;

/// Below this duplicate percentage the severity is [`Severity::Low`].
pub const MEDIUM_THRESHOLD: f64 = 5.0;

/// Above this duplicate percentage the severity is [`Severity::High`].
pub const HIGH_THRESHOLD: f64 = 15.0;

/// Band of the duplicate percentage, for colour-coding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Less than 5%
    Low,
    /// 5% to 15%
    Medium,
    /// More than 15%
    High,
}

impl Severity {
    /// Classify a duplicate percentage.
    #[must_use]
    pub fn from_percent(percent: f64) -> Self {
        if percent > HIGH_THRESHOLD {
            Self::High
        } else if percent >= MEDIUM_THRESHOLD {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Read-only view of scan progress.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatsSnapshot {
    /// Time since the scan started
    pub elapsed: Duration,
    /// Registry counters
    #[serde(flatten)]
    pub counters: Counters,
    /// Walker finished and every record has been aggregated or dropped
    pub scan_complete: bool,
    /// The scan was cancelled before completion
    pub cancelled: bool,
}

impl StatsSnapshot {
    /// Take a consistent snapshot.
    ///
    /// Completion is read before the counters: once the tracker is drained
    /// every insert has already released the write lock, so the counters
    /// read afterwards are final.
    #[must_use]
    pub fn capture(
        started: Instant,
        registry: &SharedRegistry,
        in_flight: &InFlight,
        cancel: &CancelToken,
    ) -> Self {
        let scan_complete = in_flight.is_drained();
        let counters = registry.counters();
        Self {
            elapsed: started.elapsed(),
            counters,
            scan_complete,
            cancelled: cancel.is_cancelled() && !scan_complete,
        }
    }

    /// Elapsed time in whole seconds.
    #[must_use]
    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed.as_secs()
    }

    /// Bytes aggregated per second; zero before any time has passed.
    #[must_use]
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.counters.total_bytes as f64 / secs
        } else {
            0.0
        }
    }

    /// Duplicate bytes as a percentage of all bytes, or `None` before any bytes.
    #[must_use]
    pub fn duplicate_percent(&self) -> Option<f64> {
        if self.counters.total_bytes == 0 {
            None
        } else {
            Some(self.counters.duplicate_bytes as f64 / self.counters.total_bytes as f64 * 100.0)
        }
    }

    /// Severity band of [`StatsSnapshot::duplicate_percent`].
    #[must_use]
    pub fn severity(&self) -> Option<Severity> {
        self.duplicate_percent().map(Severity::from_percent)
    }

    /// Whether the reporter has nothing further to report.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.scan_complete || self.cancelled
    }
}

/// Emits snapshots to an observer on a fixed interval.
pub struct StatsReporter {
    started: Instant,
    interval: Duration,
    registry: SharedRegistry,
    in_flight: Arc<InFlight>,
    cancel: CancelToken,
    observer: Arc<dyn ScanObserver>,
}

impl StatsReporter {
    /// Create a reporter.
    #[must_use]
    pub fn new(
        started: Instant,
        interval: Duration,
        registry: SharedRegistry,
        in_flight: Arc<InFlight>,
        cancel: CancelToken,
        observer: Arc<dyn ScanObserver>,
    ) -> Self {
        Self {
            started,
            interval,
            registry,
            in_flight,
            cancel,
            observer,
        }
    }

    /// Run until a final snapshot has been emitted. Returns that snapshot.
    pub fn run(self) -> StatsSnapshot {
        loop {
            // Wake early when the scan drains so the final snapshot is prompt.
            self.in_flight.wait_drained(self.interval);

            let snapshot = self.snapshot();
            self.observer.on_stats(&snapshot);

            if snapshot.is_final() {
                log::debug!(
                    "Stats reporter: final snapshot after {} s",
                    snapshot.elapsed_seconds()
                );
                return snapshot;
            }
        }
    }

    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot::capture(self.started, &self.registry, &self.in_flight, &self.cancel)
    }
}
