//! Manifest export.
//!
//! The manifest is a UTF-8 text file with one absolute duplicate path per
//! line, in snapshot order. Reading it back line by line yields exactly the
//! paths written.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use super::{
    require_confirmation, ActionConfig, ActionError, ActionFatal, ActionKind, ActionPlan,
    ActionReport, Confirm,
};
use crate::duplicates::DuplicateSnapshot;

/// Default manifest file name.
pub const DEFAULT_MANIFEST_NAME: &str = "duplicates.txt";

/// Write every non-canonical path in `snapshot` to
/// `destination/<config.manifest_name>`.
///
/// Paths that are not valid UTF-8, or that contain `\n` or `\r`, are skipped
/// and reported. The report's
/// success count is the number of lines written.
///
/// # Errors
///
/// - [`ActionFatal::Declined`] if `confirm` refuses
/// - [`ActionFatal::CreateDestination`] if `destination` cannot be created
/// - [`ActionFatal::CreateManifest`] / [`ActionFatal::WriteManifest`] if the
///   file cannot be written
pub fn export_manifest(
    snapshot: &DuplicateSnapshot,
    destination: &Path,
    config: &ActionConfig,
    confirm: &dyn Confirm,
) -> Result<ActionReport, ActionFatal> {
    let plan = ActionPlan::new(ActionKind::Export, snapshot, Some(destination));
    require_confirmation(confirm, &plan)?;

    fs::create_dir_all(destination).map_err(|source| ActionFatal::CreateDestination {
        path: destination.to_path_buf(),
        source,
    })?;

    let manifest = destination.join(&config.manifest_name);
    let file = File::create(&manifest).map_err(|source| ActionFatal::CreateManifest {
        path: manifest.clone(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    let write_err = |source: std::io::Error| ActionFatal::WriteManifest {
        path: manifest.clone(),
        source,
    };

    let mut report = ActionReport::new(ActionKind::Export);
    for (duplicate, _) in snapshot.non_canonical() {
        let Some(line) = duplicate.path.to_str() else {
            report.record_failure(ActionError::NonUtf8Path(duplicate.path.clone()));
            continue;
        };
        if line.contains(['\n', '\r']) {
            report.record_failure(ActionError::MultiLinePath {
                path: duplicate.path.clone(),
            });
            continue;
        }
        writeln!(writer, "{line}").map_err(write_err)?;
        report.record_success(duplicate.size);
    }
    writer.flush().map_err(write_err)?;

    log::info!(
        "Exported {} path(s) to {}",
        report.success_count,
        manifest.display()
    );
    report.target = Some(manifest);
    Ok(report)
}
