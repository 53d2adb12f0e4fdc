//! Concurrent duplicate detection pipeline.
//!
//! # Overview
//!
//! ```text
//! Walker ──bounded──▶ Fingerprinter × N ──bounded──▶ Aggregator ──▶ Registry
//!                                                                    ▲
//!                                                     StatsReporter ─┘ (reads)
//! ```
//!
//! Each stage runs on its own thread. Bounded queues give backpressure, and
//! every blocking send/receive also watches the scan's [`CancelToken`], so
//! cancelling never leaves a producer stuck on a full queue.
//!
//! Completion is tracked explicitly by [`InFlight`]: the walker dispatches
//! each record before sending it and closes the tracker when it has walked
//! the whole tree; the aggregator settles each record after applying it.
//!
//! # Example
//!
//! ```no_run
//! use dupfu::pipeline::{DuplicateFinder, ScanConfig};
//! use std::path::Path;
//!
//! let finder = DuplicateFinder::new(ScanConfig::default().with_workers(4));
//! let outcome = finder.scan(Path::new("/some/path")).unwrap();
//!
//! println!("{} duplicates", outcome.stats.counters.duplicate_count);
//! for path in outcome.duplicates.duplicate_paths() {
//!     println!("{}", path.display());
//! }
//! ```

pub mod cancel;
pub mod inflight;
pub mod stats;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use crate::duplicates::aggregator::{Aggregator, HashOutcome};
use crate::duplicates::{DuplicateSnapshot, SharedRegistry};
use crate::progress::{NoopObserver, ScanIssue, ScanObserver};
use crate::scanner::{
    resolve_path, FileRecord, HashError, Hasher, ScanError, Walker, WalkerConfig,
};

pub use cancel::{CancelToken, Cancelled};
pub use inflight::InFlight;
pub use stats::{Severity, StatsReporter, StatsSnapshot};

/// Default capacity of the walker → fingerprinter queue.
pub const DEFAULT_WALK_QUEUE: usize = 200;

/// Default capacity of the fingerprinter → aggregator queue.
pub const DEFAULT_HASH_QUEUE: usize = 100;

/// Default interval between statistics snapshots.
pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(1);

/// Tuning for one scan.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Number of fingerprinter workers.
    pub workers: usize,
    /// Capacity of the walker → fingerprinter queue.
    pub walk_queue_capacity: usize,
    /// Capacity of the fingerprinter → aggregator queue.
    pub hash_queue_capacity: usize,
    /// Per-worker read buffer size.
    pub read_buffer_size: usize,
    /// Interval between statistics snapshots.
    pub stats_interval: Duration,
    /// Walker filters.
    pub walker_config: WalkerConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            walk_queue_capacity: DEFAULT_WALK_QUEUE,
            hash_queue_capacity: DEFAULT_HASH_QUEUE,
            read_buffer_size: crate::scanner::DEFAULT_BUFFER_SIZE,
            stats_interval: DEFAULT_STATS_INTERVAL,
            walker_config: WalkerConfig::default(),
        }
    }
}

impl ScanConfig {
    /// Set the worker count; 0 means available parallelism.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = if workers == 0 {
            default_workers()
        } else {
            workers
        };
        self
    }

    /// Set both queue capacities (minimum 1).
    #[must_use]
    pub fn with_queue_capacities(mut self, walk: usize, hash: usize) -> Self {
        self.walk_queue_capacity = walk.max(1);
        self.hash_queue_capacity = hash.max(1);
        self
    }

    /// Set the read buffer size.
    #[must_use]
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Set the statistics interval (minimum 10 ms).
    #[must_use]
    pub fn with_stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval.max(Duration::from_millis(10));
        self
    }

    /// Set the walker configuration.
    #[must_use]
    pub fn with_walker_config(mut self, config: WalkerConfig) -> Self {
        self.walker_config = config;
        self
    }
}

fn default_workers() -> usize {
    thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

/// Errors that abort a scan.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// The scan root cannot be opened.
    #[error("Cannot open scan root {path}: {source}")]
    RootInaccessible {
        /// The root as given
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The scan root is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The root became unreadable once the walk had started.
    #[error("Scan root lost during walk: {0}")]
    RootLost(#[source] ScanError),

    /// The scan was interrupted by user (Ctrl+C or cancel).
    #[error("Scan interrupted by user")]
    Interrupted,

    /// A pipeline thread could not be started.
    #[error("Failed to start {stage} thread: {source}")]
    Spawn {
        /// Stage name
        stage: &'static str,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A pipeline thread panicked.
    #[error("{0} thread panicked")]
    WorkerPanicked(&'static str),
}

/// Everything a single scan run shares between its stages.
///
/// Built once per scan, so independent scans never share state.
#[derive(Clone)]
pub struct ScanContext {
    root: PathBuf,
    started: Instant,
    registry: SharedRegistry,
    in_flight: Arc<InFlight>,
    cancel: CancelToken,
    observer: Arc<dyn ScanObserver>,
}

impl std::fmt::Debug for ScanContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanContext")
            .field("root", &self.root)
            .field("started", &self.started)
            .field("in_flight", &self.in_flight)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl ScanContext {
    /// Create a context for a scan of `root`.
    #[must_use]
    pub fn new(root: PathBuf, cancel: CancelToken, observer: Arc<dyn ScanObserver>) -> Self {
        Self {
            root,
            started: Instant::now(),
            registry: SharedRegistry::new(),
            in_flight: Arc::new(InFlight::new()),
            cancel,
            observer,
        }
    }

    /// Canonical scan root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The registry (read access for callers).
    #[must_use]
    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// The cancellation token for this scan.
    #[must_use]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Consistent statistics snapshot.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot::capture(self.started, &self.registry, &self.in_flight, &self.cancel)
    }
}

/// Non-fatal errors gathered over a scan.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Regular non-empty files the walker found
    pub files_discovered: u64,
    /// Entries that could not be visited
    pub traversal_errors: Vec<ScanError>,
    /// Files dropped because they could not be fingerprinted
    pub read_errors: Vec<HashError>,
}

impl ScanReport {
    /// Total number of non-fatal errors.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.traversal_errors.len() + self.read_errors.len()
    }

    /// Whether any non-fatal error occurred.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }
}

/// Results of a finished scan.
#[derive(Debug)]
pub struct ScanOutcome {
    /// Final statistics
    pub stats: StatsSnapshot,
    /// Every duplicate set at completion
    pub duplicates: DuplicateSnapshot,
    /// Non-fatal errors
    pub report: ScanReport,
}

struct WalkSummary {
    files: u64,
    errors: Vec<ScanError>,
    fatal: Option<ScanError>,
}

/// Handle to a running scan.
pub struct ScanHandle {
    ctx: ScanContext,
    walker: JoinHandle<WalkSummary>,
    workers: Vec<JoinHandle<u64>>,
    aggregator: JoinHandle<Vec<HashError>>,
    reporter: JoinHandle<StatsSnapshot>,
}

impl ScanHandle {
    /// Shared context of this scan.
    #[must_use]
    pub fn context(&self) -> &ScanContext {
        &self.ctx
    }

    /// Current statistics.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        self.ctx.snapshot()
    }

    /// Current duplicate sets.
    #[must_use]
    pub fn duplicates(&self) -> DuplicateSnapshot {
        self.ctx.registry.snapshot()
    }

    /// Whether every discovered file has been aggregated or dropped.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.ctx.in_flight.is_drained()
    }

    /// Stop the scan. Every stage unblocks and exits.
    pub fn cancel(&self) {
        log::info!("Cancelling scan of {}", self.ctx.root.display());
        self.ctx.cancel.cancel();
    }

    /// Wait for all stages to finish.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError::Interrupted`] if the scan was cancelled before
    /// completing, [`FinderError::RootLost`] if the root vanished mid-walk,
    /// or [`FinderError::WorkerPanicked`] if a stage panicked.
    pub fn wait(self) -> Result<ScanOutcome, FinderError> {
        let walk = self
            .walker
            .join()
            .map_err(|_| FinderError::WorkerPanicked("walker"))?;

        let mut hashed = 0;
        for worker in self.workers {
            hashed += worker
                .join()
                .map_err(|_| FinderError::WorkerPanicked("fingerprinter"))?;
        }

        let read_errors = self
            .aggregator
            .join()
            .map_err(|_| FinderError::WorkerPanicked("aggregator"))?;

        self.reporter
            .join()
            .map_err(|_| FinderError::WorkerPanicked("stats reporter"))?;

        let stats = self.ctx.snapshot();
        self.ctx.observer.on_complete(&stats);

        if let Some(fatal) = walk.fatal {
            return Err(FinderError::RootLost(fatal));
        }
        if !stats.scan_complete {
            log::info!("Scan interrupted after {} file(s)", stats.counters.files_scanned);
            return Err(FinderError::Interrupted);
        }

        log::info!(
            "Scan complete: {} files ({} fingerprinted), {} duplicates, {} bytes reclaimable",
            walk.files,
            hashed,
            stats.counters.duplicate_count,
            stats.counters.duplicate_bytes
        );

        Ok(ScanOutcome {
            stats,
            duplicates: self.ctx.registry.snapshot(),
            report: ScanReport {
                files_discovered: walk.files,
                traversal_errors: walk.errors,
                read_errors,
            },
        })
    }
}

/// Builds and starts scans.
pub struct DuplicateFinder {
    config: ScanConfig,
    observer: Arc<dyn ScanObserver>,
    cancel: Option<CancelToken>,
}

impl DuplicateFinder {
    /// Create a finder with the given configuration.
    #[must_use]
    pub fn new(config: ScanConfig) -> Self {
        Self {
            config,
            observer: Arc::new(NoopObserver),
            cancel: None,
        }
    }

    /// Create a finder with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(ScanConfig::default())
    }

    /// Set the observer that receives pipeline events.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ScanObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Use an externally owned cancellation token (e.g. wired to Ctrl+C).
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scan `root` and block until done.
    ///
    /// # Errors
    ///
    /// See [`DuplicateFinder::start`] and [`ScanHandle::wait`].
    pub fn scan(&self, root: &Path) -> Result<ScanOutcome, FinderError> {
        self.start(root)?.wait()
    }

    /// Validate `root` and start every stage.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError::RootInaccessible`] or
    /// [`FinderError::NotADirectory`] if the root cannot be scanned, and
    /// [`FinderError::Spawn`] if a thread cannot be started.
    pub fn start(&self, root: &Path) -> Result<ScanHandle, FinderError> {
        let root = std::fs::canonicalize(root).map_err(|source| FinderError::RootInaccessible {
            path: root.to_path_buf(),
            source,
        })?;
        if !root.is_dir() {
            return Err(FinderError::NotADirectory(root));
        }

        let mut walker_config = self.config.walker_config.clone();
        walker_config.exclude_dirs = walker_config
            .exclude_dirs
            .iter()
            .map(|dir| resolve_excluded(dir))
            .collect();

        let cancel = self.cancel.clone().unwrap_or_default();
        let walker = Walker::new(&root, walker_config).with_shutdown_flag(cancel.flag());
        walker
            .open_root()
            .map_err(|source| FinderError::RootInaccessible {
                path: root.clone(),
                source,
            })?;

        let ctx = ScanContext::new(root, cancel, Arc::clone(&self.observer));
        log::info!(
            "Scanning {} with {} fingerprint worker(s)",
            ctx.root.display(),
            self.config.workers
        );

        let (file_tx, file_rx) = crossbeam_channel::bounded(self.config.walk_queue_capacity);
        let (hash_tx, hash_rx) = crossbeam_channel::bounded(self.config.hash_queue_capacity);

        let spawned = self.spawn_stages(&ctx, walker, file_tx, file_rx, hash_tx, hash_rx);
        if spawned.is_err() {
            // Stop whatever did start.
            ctx.cancel.cancel();
        }
        let (walker, workers, aggregator, reporter) = spawned?;

        Ok(ScanHandle {
            ctx,
            walker,
            workers,
            aggregator,
            reporter,
        })
    }

    #[allow(clippy::type_complexity)]
    fn spawn_stages(
        &self,
        ctx: &ScanContext,
        walker: Walker,
        file_tx: Sender<FileRecord>,
        file_rx: Receiver<FileRecord>,
        hash_tx: Sender<HashOutcome>,
        hash_rx: Receiver<HashOutcome>,
    ) -> Result<
        (
            JoinHandle<WalkSummary>,
            Vec<JoinHandle<u64>>,
            JoinHandle<Vec<HashError>>,
            JoinHandle<StatsSnapshot>,
        ),
        FinderError,
    > {
        let aggregator = {
            let agg = Aggregator::new(
                ctx.registry.clone(),
                Arc::clone(&ctx.in_flight),
                Arc::clone(&ctx.observer),
            );
            let cancel = ctx.cancel.clone();
            spawn("dupfu-aggregator", "aggregator", move || {
                agg.run(&hash_rx, &cancel)
            })?
        };

        let reporter = {
            let reporter = StatsReporter::new(
                ctx.started,
                self.config.stats_interval,
                ctx.registry.clone(),
                Arc::clone(&ctx.in_flight),
                ctx.cancel.clone(),
                Arc::clone(&ctx.observer),
            );
            spawn("dupfu-stats", "stats reporter", move || reporter.run())?
        };

        let hasher = Hasher::new()
            .with_buffer_size(self.config.read_buffer_size)
            .with_shutdown_flag(ctx.cancel.flag());
        let mut workers = Vec::with_capacity(self.config.workers);
        for idx in 0..self.config.workers.max(1) {
            let hasher = hasher.clone();
            let rx = file_rx.clone();
            let tx = hash_tx.clone();
            let cancel = ctx.cancel.clone();
            workers.push(spawn(
                &format!("dupfu-hash-{idx}"),
                "fingerprinter",
                move || fingerprint_stage(&hasher, &rx, &tx, &cancel),
            )?);
        }
        // Channel disconnection is driven by the stage threads' clones.
        drop(file_rx);
        drop(hash_tx);

        let walker = {
            let ctx = ctx.clone();
            spawn("dupfu-walker", "walker", move || walk_stage(&walker, &file_tx, &ctx))?
        };

        Ok((walker, workers, aggregator, reporter))
    }
}

/// Excluded directories are matched against entries under the canonical
/// root, so they need the same spelling.
fn resolve_excluded(dir: &Path) -> PathBuf {
    resolve_path(dir).unwrap_or_else(|e| {
        log::debug!("Cannot resolve excluded directory {}: {}", dir.display(), e);
        dir.to_path_buf()
    })
}

fn spawn<T, F>(name: &str, stage: &'static str, f: F) -> Result<JoinHandle<T>, FinderError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .map_err(|source| FinderError::Spawn { stage, source })
}

/// Walk the tree and feed the fingerprinter queue.
fn walk_stage(walker: &Walker, tx: &Sender<FileRecord>, ctx: &ScanContext) -> WalkSummary {
    let mut summary = WalkSummary {
        files: 0,
        errors: Vec::new(),
        fatal: None,
    };

    for item in walker.walk() {
        match item {
            Ok(record) => {
                ctx.in_flight.dispatch();
                if cancel::send_or_cancel(tx, record, &ctx.cancel).is_err() {
                    ctx.in_flight.settle();
                    break;
                }
                summary.files += 1;
            }
            Err(err) if err.path() == walker.root() => {
                log::error!("Scan root became unreadable: {}", err);
                ctx.cancel.cancel();
                summary.fatal = Some(err);
                break;
            }
            Err(err) => {
                ctx.observer.on_issue(&ScanIssue::Traversal(&err));
                summary.errors.push(err);
            }
        }
    }

    if ctx.cancel.is_cancelled() {
        log::debug!("Walker: stopped early after {} file(s)", summary.files);
    } else {
        // Only a finished walk may declare the producer closed.
        ctx.in_flight.close();
        log::debug!(
            "Walker: finished, {} file(s), {} error(s)",
            summary.files,
            summary.errors.len()
        );
    }
    summary
}

/// Pull records, fingerprint them, push outcomes. Returns files hashed.
fn fingerprint_stage(
    hasher: &Hasher,
    rx: &Receiver<FileRecord>,
    tx: &Sender<HashOutcome>,
    cancel: &CancelToken,
) -> u64 {
    let mut buf = vec![0u8; hasher.buffer_size()];
    let mut hashed = 0;

    while let Some(record) = cancel::recv_or_cancel(rx, cancel) {
        let result = hasher.fingerprint_record(record, &mut buf);
        match &result {
            Ok(_) => hashed += 1,
            Err(err) => log::warn!("Failed to fingerprint {}: {}", err.path().display(), err),
        }
        let outcome = HashOutcome::from(result);
        if cancel::send_or_cancel(tx, outcome, cancel).is_err() {
            break;
        }
    }
    hashed
}
