//! Scan observation and terminal progress reporting.
//!
//! The pipeline reports what it is doing through the [`ScanObserver`] trait:
//! periodic statistics, group updates and per-file issues. The library never
//! renders anything itself. [`Progress`] is the indicatif-backed observer
//! used by the command-line binary.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use bytesize::ByteSize;
use indicatif::{ProgressBar, ProgressStyle};
use yansi::Paint;

use crate::duplicates::GroupSummary;
use crate::pipeline::stats::{Severity, StatsSnapshot};
use crate::scanner::{HashError, ScanError};

/// A non-fatal problem encountered during a scan.
#[derive(Debug, Clone, Copy)]
pub enum ScanIssue<'a> {
    /// An entry could not be visited
    Traversal(&'a ScanError),
    /// A file could not be fingerprinted and was dropped
    Read(&'a HashError),
}

impl fmt::Display for ScanIssue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Traversal(e) => write!(f, "traversal: {e}"),
            Self::Read(e) => write!(f, "read: {e}"),
        }
    }
}

/// Receives pipeline events.
///
/// Called from pipeline threads, so implementations must be thread-safe and
/// should return quickly. Every method has a no-op default.
pub trait ScanObserver: Send + Sync {
    /// A group gained a member; the summary replaces any earlier row with the same key.
    fn on_group_updated(&self, _summary: &GroupSummary) {}

    /// Periodic statistics.
    fn on_stats(&self, _stats: &StatsSnapshot) {}

    /// A per-file problem was recorded.
    fn on_issue(&self, _issue: &ScanIssue<'_>) {}

    /// The final snapshot, once all stages have stopped.
    fn on_complete(&self, _stats: &StatsSnapshot) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ScanObserver for NoopObserver {}

/// Progress reporter using indicatif.
pub struct Progress {
    bar: Option<ProgressBar>,
    issues: AtomicU64,
    latest: Mutex<String>,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, nothing is drawn.
    ///
    /// # Examples
    ///
    /// ```
    /// use dupfu::progress::Progress;
    ///
    /// let progress = Progress::new(true);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        let bar = (!quiet).then(|| {
            let pb = ProgressBar::new_spinner();
            pb.set_style(Self::style());
            pb.enable_steady_tick(Duration::from_millis(100));
            pb.set_message("Scanning");
            pb
        });
        Self {
            bar,
            issues: AtomicU64::new(0),
            latest: Mutex::new(String::new()),
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    /// Number of issues seen so far.
    #[must_use]
    pub fn issue_count(&self) -> u64 {
        self.issues.load(Ordering::Relaxed)
    }

    fn render(&self, stats: &StatsSnapshot) -> String {
        let latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        let mut msg = format!(
            "{} files, {} ({}/s) | {} duplicates, {} ({})",
            stats.counters.files_scanned,
            ByteSize::b(stats.counters.total_bytes),
            ByteSize::b(stats.throughput() as u64),
            stats.counters.duplicate_count,
            ByteSize::b(stats.counters.duplicate_bytes),
            format_percent(stats),
        );
        let issues = self.issue_count();
        if issues > 0 {
            msg.push_str(&format!(" | {issues} errors"));
        }
        if !latest.is_empty() {
            msg.push_str(&format!(" | {}", *latest));
        }
        msg
    }
}

impl ScanObserver for Progress {
    fn on_group_updated(&self, summary: &GroupSummary) {
        let path = summary.canonical.to_string_lossy();
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = truncate_path(&path, 30);
    }

    fn on_stats(&self, stats: &StatsSnapshot) {
        if let Some(pb) = &self.bar {
            pb.set_message(self.render(stats));
        }
    }

    fn on_issue(&self, _issue: &ScanIssue<'_>) {
        self.issues.fetch_add(1, Ordering::Relaxed);
    }

    fn on_complete(&self, stats: &StatsSnapshot) {
        if let Some(pb) = &self.bar {
            let status = if stats.scan_complete {
                "Scan complete"
            } else {
                "Scan interrupted"
            };
            pb.finish_with_message(format!("{status}: {}", self.render(stats)));
        }
    }
}

/// Duplicate percentage coloured by severity, or `-` when unavailable.
#[must_use]
pub fn format_percent(stats: &StatsSnapshot) -> String {
    match (stats.duplicate_percent(), stats.severity()) {
        (Some(p), Some(Severity::Low)) => format!("{:.2}%", p).green().to_string(),
        (Some(p), Some(Severity::Medium)) => format!("{:.2}%", p).yellow().to_string(),
        (Some(p), _) => format!("{:.2}%", p).red().to_string(),
        (None, _) => "-".to_string(),
    }
}

/// Truncate a path for display in the progress bar.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let count = file_name.chars().count();
    if count + 4 > max_len {
        let tail: String = file_name.chars().skip(count + 3 - max_len).collect();
        return format!("...{}", tail);
    }

    format!(".../{}", file_name)
}
