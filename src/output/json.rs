//! JSON report for scripting and automation.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "duplicates": [
//!     {
//!       "key": "af1349b9...",
//!       "canonical": { "path": "/a/x.jpg", "size": 1024, "modified": "2024-01-01T00:00:00Z" },
//!       "duplicates": [ { "path": "/b/x.jpg", "size": 1024, "modified": "..." } ]
//!     }
//!   ],
//!   "summary": {
//!     "files_scanned": 100,
//!     "total_bytes": 1048576,
//!     "duplicate_groups": 1,
//!     "duplicate_count": 1,
//!     "duplicate_bytes": 1024,
//!     "duplicate_percent": 0.09765625,
//!     "severity": "low",
//!     "throughput_bytes_per_sec": 524288.0,
//!     "scan_duration_ms": 2000,
//!     "exit_code": 0,
//!     "exit_code_name": "DF000"
//!   },
//!   "errors": [],
//!   "action": null
//! }
//! ```

use std::io::Write;

use serde::Serialize;

use crate::actions::{ActionKind, ActionReport};
use crate::duplicates::DuplicateSet;
use crate::error::ExitCode;
use crate::pipeline::{ScanOutcome, Severity};

/// Summary statistics.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Files aggregated
    pub files_scanned: u64,
    /// Bytes of all aggregated files
    pub total_bytes: u64,
    /// Number of duplicate sets
    pub duplicate_groups: usize,
    /// Non-canonical files
    pub duplicate_count: u64,
    /// Bytes held by non-canonical files
    pub duplicate_bytes: u64,
    /// `duplicate_bytes` as a percentage of `total_bytes`
    pub duplicate_percent: Option<f64>,
    /// Severity band of the percentage
    pub severity: Option<Severity>,
    /// Average scan throughput
    pub throughput_bytes_per_sec: f64,
    /// Wall-clock scan time
    pub scan_duration_ms: u64,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g. "DF000")
    pub exit_code_name: String,
}

/// Outcome of an action run after the scan.
#[derive(Debug, Clone, Serialize)]
pub struct JsonAction {
    /// Which action
    pub kind: ActionKind,
    /// Files (or lines) processed successfully
    pub success_count: usize,
    /// Bytes of those files
    pub bytes: u64,
    /// Destination directory or manifest
    pub target: Option<String>,
    /// Per-file failures
    pub errors: Vec<String>,
}

impl From<&ActionReport> for JsonAction {
    fn from(report: &ActionReport) -> Self {
        Self {
            kind: report.kind,
            success_count: report.success_count,
            bytes: report.bytes,
            target: report
                .target
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            errors: report.errors.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Complete JSON document.
#[derive(Debug, Serialize)]
pub struct JsonOutput<'a> {
    /// Duplicate sets, ordered by canonical path
    pub duplicates: &'a [DuplicateSet],
    /// Scan summary
    pub summary: JsonSummary,
    /// Non-fatal scan errors
    pub errors: Vec<String>,
    /// Action outcome, if an action ran
    pub action: Option<JsonAction>,
}

impl<'a> JsonOutput<'a> {
    /// Build the document for `outcome`.
    #[must_use]
    pub fn new(outcome: &'a ScanOutcome, exit_code: ExitCode) -> Self {
        let stats = &outcome.stats;
        Self {
            duplicates: outcome.duplicates.sets(),
            summary: JsonSummary {
                files_scanned: stats.counters.files_scanned,
                total_bytes: stats.counters.total_bytes,
                duplicate_groups: outcome.duplicates.sets().len(),
                duplicate_count: stats.counters.duplicate_count,
                duplicate_bytes: stats.counters.duplicate_bytes,
                duplicate_percent: stats.duplicate_percent(),
                severity: stats.severity(),
                throughput_bytes_per_sec: stats.throughput(),
                scan_duration_ms: u64::try_from(stats.elapsed.as_millis()).unwrap_or(u64::MAX),
                exit_code: exit_code.as_i32(),
                exit_code_name: exit_code.code_prefix().to_string(),
            },
            errors: outcome
                .report
                .traversal_errors
                .iter()
                .map(ToString::to_string)
                .chain(outcome.report.read_errors.iter().map(ToString::to_string))
                .collect(),
            action: None,
        }
    }

    /// Attach an action outcome.
    #[must_use]
    pub fn with_action(mut self, report: &ActionReport) -> Self {
        self.action = Some(JsonAction::from(report));
        self
    }

    /// Serialize to compact JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write JSON followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        let json = if pretty {
            self.to_json_pretty()?
        } else {
            self.to_json()?
        };
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Render the full JSON report.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn render(
    outcome: &ScanOutcome,
    action: Option<&ActionReport>,
    exit_code: ExitCode,
) -> Result<String, serde_json::Error> {
    let mut output = JsonOutput::new(outcome, exit_code);
    if let Some(report) = action {
        output = output.with_action(report);
    }
    output.to_json_pretty()
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}
