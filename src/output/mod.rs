//! Final scan reports for non-interactive use.
//!
//! - [`render_text`]: human-readable listing, severity-coloured via yansi
//! - [`json::render`]: machine-readable document
//!
//! # Example
//!
//! ```no_run
//! use dupfu::error::ExitCode;
//! use dupfu::output;
//! use dupfu::pipeline::DuplicateFinder;
//! use std::path::Path;
//!
//! let outcome = DuplicateFinder::with_defaults().scan(Path::new(".")).unwrap();
//! print!("{}", output::render_text(&outcome, None));
//! println!("{}", output::json::render(&outcome, None, ExitCode::Success).unwrap());
//! ```

pub mod json;

use std::fmt::Write;

use bytesize::ByteSize;
use yansi::Paint;

use crate::actions::ActionReport;
use crate::pipeline::ScanOutcome;
use crate::progress::format_percent;

/// Output format of the final report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable listing
    #[default]
    Text,
    /// JSON document
    Json,
}

/// Render the outcome (and the action run on it, if any) as text.
#[must_use]
pub fn render_text(outcome: &ScanOutcome, action: Option<&ActionReport>) -> String {
    let mut out = String::new();
    let stats = &outcome.stats;
    let sets = outcome.duplicates.sets();

    // Writing to a String cannot fail.
    let _ = writeln!(
        out,
        "Scanned {} files ({}) in {:.1}s",
        stats.counters.files_scanned,
        ByteSize::b(stats.counters.total_bytes),
        stats.elapsed.as_secs_f64()
    );

    if sets.is_empty() {
        let _ = writeln!(out, "No duplicates found.");
    } else {
        let _ = writeln!(
            out,
            "Found {} duplicate(s) in {} group(s): {} reclaimable ({})",
            stats.counters.duplicate_count,
            sets.len(),
            ByteSize::b(stats.counters.duplicate_bytes),
            format_percent(stats)
        );
        for set in sets {
            let _ = writeln!(
                out,
                "\n{} {}",
                set.canonical.path.display().bold(),
                format!("[{}]", ByteSize::b(set.canonical.size)).dim()
            );
            for dup in &set.duplicates {
                let _ = writeln!(out, "  = {}", dup.path.display());
            }
        }
    }

    let report = &outcome.report;
    if report.has_errors() {
        let _ = writeln!(out, "\n{} file(s) could not be scanned:", report.error_count());
        for e in &report.traversal_errors {
            let _ = writeln!(out, "  {}", e.yellow());
        }
        for e in &report.read_errors {
            let _ = writeln!(out, "  {}", e.yellow());
        }
    }

    if let Some(action) = action {
        let _ = writeln!(out, "\n{}", action.summary());
        for e in &action.errors {
            let _ = writeln!(out, "  {}", e.red());
        }
    }

    out
}
