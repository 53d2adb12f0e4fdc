//! Single consumer that owns all registry mutation.
//!
//! Fingerprinter workers send a [`HashOutcome`] per file. The aggregator
//! applies each one to the registry under the write lock, publishes the
//! affected group's summary, and settles the record in the in-flight
//! tracker. Read errors travel the same queue so that every dispatched
//! record is settled in exactly one place.

use std::sync::Arc;

use crossbeam_channel::Receiver;

use super::SharedRegistry;
use crate::pipeline::cancel::{recv_or_cancel, CancelToken};
use crate::pipeline::inflight::InFlight;
use crate::progress::{ScanIssue, ScanObserver};
use crate::scanner::{FileRecord, Fingerprint, HashError};

/// Result of fingerprinting one record.
#[derive(Debug)]
pub enum HashOutcome {
    /// The record and the fingerprint it is grouped under
    Hashed {
        /// The discovered file
        record: FileRecord,
        /// Its content fingerprint
        fingerprint: Fingerprint,
    },
    /// The record was dropped
    Failed(HashError),
}

impl From<Result<(FileRecord, Fingerprint), HashError>> for HashOutcome {
    fn from(result: Result<(FileRecord, Fingerprint), HashError>) -> Self {
        match result {
            Ok((record, fingerprint)) => Self::Hashed {
                record,
                fingerprint,
            },
            Err(err) => Self::Failed(err),
        }
    }
}

/// Consumes fingerprinted records into the registry.
pub struct Aggregator {
    registry: SharedRegistry,
    in_flight: Arc<InFlight>,
    observer: Arc<dyn ScanObserver>,
}

impl Aggregator {
    /// Create an aggregator writing into `registry`.
    #[must_use]
    pub fn new(
        registry: SharedRegistry,
        in_flight: Arc<InFlight>,
        observer: Arc<dyn ScanObserver>,
    ) -> Self {
        Self {
            registry,
            in_flight,
            observer,
        }
    }

    /// Apply one outcome. Returns the read error, if it was one.
    pub fn apply(&self, outcome: HashOutcome) -> Option<HashError> {
        let result = match outcome {
            HashOutcome::Hashed {
                record,
                fingerprint,
            } => {
                log::trace!("Aggregating {}", record.path.display());
                let summary = self.registry.write().insert(fingerprint, record);
                if let Some(summary) = summary {
                    log::debug!(
                        "Group {:?}: {} duplicate(s) of {}",
                        summary.key,
                        summary.duplicate_count,
                        summary.canonical.display()
                    );
                    self.observer.on_group_updated(&summary);
                }
                None
            }
            HashOutcome::Failed(err) => {
                self.observer.on_issue(&ScanIssue::Read(&err));
                Some(err)
            }
        };
        self.in_flight.settle();
        result
    }

    /// Consume until the queue closes or the scan is cancelled.
    ///
    /// Returns the read errors collected along the way.
    pub fn run(self, rx: &Receiver<HashOutcome>, cancel: &CancelToken) -> Vec<HashError> {
        let mut errors = Vec::new();
        while let Some(outcome) = recv_or_cancel(rx, cancel) {
            if let Some(err) = self.apply(outcome) {
                errors.push(err);
            }
        }
        if cancel.is_cancelled() {
            log::debug!(
                "Aggregator: cancelled with {} record(s) in flight",
                self.in_flight.pending()
            );
        } else {
            log::debug!("Aggregator: input closed");
        }
        errors
    }
}
