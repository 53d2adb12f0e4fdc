//! Deletion of duplicate files.
//!
//! Duplicates go to the system trash by default (recoverable); permanent
//! removal must be requested through [`ActionConfig::permanent`]. The
//! canonical file of each set is never touched.
//!
//! # Example
//!
//! ```no_run
//! use dupfu::actions::delete::delete_to_trash;
//! use std::path::Path;
//!
//! match delete_to_trash(Path::new("/path/to/duplicate.txt")) {
//!     Ok(size) => println!("Freed {} bytes", size),
//!     Err(e) => eprintln!("Failed: {}", e),
//! }
//! ```

use std::fs;
use std::path::Path;

use super::verify::verify_duplicate;
use super::{
    require_confirmation, ActionConfig, ActionError, ActionFatal, ActionKind, ActionPlan,
    ActionReport, Confirm,
};
use crate::duplicates::DuplicateSnapshot;
use crate::scanner::FileRecord;

/// Move a single file to the system trash. Returns its size.
///
/// # Errors
///
/// - `NotFound` if the file doesn't exist
/// - `PermissionDenied` if its metadata cannot be read
/// - `Trash` if the trash backend fails
pub fn delete_to_trash(path: &Path) -> Result<u64, ActionError> {
    let size = fs::metadata(path)
        .map_err(|e| ActionError::from_io(path, e))?
        .len();

    trash::delete(path).map_err(|e| {
        log::error!("Trash operation failed for {}: {}", path.display(), e);
        ActionError::Trash {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    log::info!("Moved to trash: {} ({} bytes)", path.display(), size);
    Ok(size)
}

/// Permanently delete a single file. Returns its size.
///
/// **WARNING**: This operation cannot be undone.
///
/// # Errors
///
/// - `NotFound` if the file doesn't exist
/// - `PermissionDenied` if deletion is not allowed
/// - `Io` for any other failure
pub fn permanent_delete(path: &Path) -> Result<u64, ActionError> {
    let size = fs::metadata(path)
        .map_err(|e| ActionError::from_io(path, e))?
        .len();

    fs::remove_file(path).map_err(|e| ActionError::from_io(path, e))?;

    log::info!("Permanently deleted: {} ({} bytes)", path.display(), size);
    Ok(size)
}

fn delete_one(
    duplicate: &FileRecord,
    canonical: &FileRecord,
    config: &ActionConfig,
) -> Result<u64, ActionError> {
    if config.verify {
        verify_duplicate(duplicate, canonical, config.buffer_size)?;
    }
    if config.permanent {
        permanent_delete(&duplicate.path)
    } else {
        delete_to_trash(&duplicate.path)
    }
}

/// Delete every non-canonical file in `snapshot`.
///
/// One file's failure never stops the batch; it is recorded in the report.
///
/// # Errors
///
/// Returns [`ActionFatal::Declined`] if `confirm` refuses, in which case no
/// file is touched.
pub fn delete_duplicates(
    snapshot: &DuplicateSnapshot,
    config: &ActionConfig,
    confirm: &dyn Confirm,
) -> Result<ActionReport, ActionFatal> {
    let mut plan = ActionPlan::new(ActionKind::Delete, snapshot, None);
    plan.permanent = config.permanent;
    require_confirmation(confirm, &plan)?;

    let mut report = ActionReport::new(ActionKind::Delete);
    for (duplicate, canonical) in snapshot.non_canonical() {
        match delete_one(duplicate, canonical, config) {
            Ok(size) => report.record_success(size),
            Err(e) => report.record_failure(e),
        }
    }

    log::info!("{}", report.summary());
    Ok(report)
}
