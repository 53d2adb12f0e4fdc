//! Moving duplicates into a destination directory.
//!
//! Files keep their base names. When the name is already taken the first
//! free `stem-N.ext` (N = 1, 2, ...) is used instead. Files are placed with
//! exclusive creation, so nothing is ever overwritten.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::verify::verify_duplicate;
use super::{
    require_confirmation, ActionConfig, ActionError, ActionFatal, ActionKind, ActionPlan,
    ActionReport, Confirm,
};
use crate::duplicates::DuplicateSnapshot;
use crate::scanner::FileRecord;

/// First path in `dir` for `file_name` that does not exist yet.
///
/// ```
/// use dupfu::actions::unique_destination;
/// use std::ffi::OsStr;
///
/// let dir = tempfile::tempdir().unwrap();
/// std::fs::write(dir.path().join("a.txt"), b"x").unwrap();
///
/// let next = unique_destination(dir.path(), OsStr::new("a.txt"));
/// assert_eq!(next, dir.path().join("a-1.txt"));
/// ```
#[must_use]
pub fn unique_destination(dir: &Path, file_name: &std::ffi::OsStr) -> PathBuf {
    let candidate = dir.join(file_name);
    if !occupied(&candidate) {
        return candidate;
    }

    let as_path = Path::new(file_name);
    let stem = as_path.file_stem().unwrap_or(file_name);
    let ext = as_path.extension();

    let mut n: u64 = 1;
    loop {
        let mut name = OsString::from(stem);
        name.push(format!("-{n}"));
        if let Some(ext) = ext {
            name.push(".");
            name.push(ext);
        }
        let candidate = dir.join(&name);
        if !occupied(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Broken symlinks count as occupied.
fn occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Move `source` into `dir`. Returns the new path.
///
/// The file is hard-linked under its free name and the source unlinked
/// afterwards. Linking fails instead of replacing a file that appeared after
/// the name was picked; the next free name is tried then. Where linking is
/// not possible (e.g. crossing filesystems) the content is copied into a
/// newly created file.
///
/// # Errors
///
/// Returns the failing path's [`ActionError`]. If the source cannot be
/// removed the new copy is removed again and the source is left in place.
pub fn relocate_file(source: &Path, dir: &Path) -> Result<PathBuf, ActionError> {
    let name = source
        .file_name()
        .ok_or_else(|| ActionError::from_io(source, io::Error::other("path has no file name")))?;

    let target = loop {
        let target = unique_destination(dir, name);
        match place(source, &target) {
            Ok(()) => break target,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                log::debug!("{} was taken meanwhile, picking another name", target.display());
            }
            Err(e) => return Err(ActionError::from_io(source, e)),
        }
    };

    if let Err(e) = fs::remove_file(source) {
        let _ = fs::remove_file(&target);
        return Err(ActionError::from_io(source, e));
    }

    log::info!("Moved {} -> {}", source.display(), target.display());
    Ok(target)
}

/// Create `target` with the content of `source`. Never replaces an existing
/// `target`.
fn place(source: &Path, target: &Path) -> io::Result<()> {
    match fs::hard_link(source, target) {
        Ok(()) => Ok(()),
        Err(e) if matches!(
            e.kind(),
            io::ErrorKind::AlreadyExists | io::ErrorKind::NotFound
        ) =>
        {
            Err(e)
        }
        Err(e) => {
            log::debug!(
                "Hard link of {} failed ({}), falling back to copy",
                source.display(),
                e
            );
            copy_new(source, target)
        }
    }
}

fn copy_new(source: &Path, target: &Path) -> io::Result<()> {
    let mut reader = fs::File::open(source)?;
    let permissions = reader.metadata()?.permissions();
    let mut writer = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)?;

    let copied = io::copy(&mut reader, &mut writer)
        .and_then(|_| writer.set_permissions(permissions))
        .and_then(|()| writer.sync_all());
    if copied.is_err() {
        drop(writer);
        let _ = fs::remove_file(target);
    }
    copied
}

fn move_one(
    duplicate: &FileRecord,
    canonical: &FileRecord,
    destination: &Path,
    config: &ActionConfig,
) -> Result<u64, ActionError> {
    if config.verify {
        verify_duplicate(duplicate, canonical, config.buffer_size)?;
    }
    relocate_file(&duplicate.path, destination)?;
    Ok(duplicate.size)
}

/// Move every non-canonical file in `snapshot` into `destination`.
///
/// The directory is created (recursively) if missing.
///
/// # Errors
///
/// - [`ActionFatal::Declined`] if `confirm` refuses
/// - [`ActionFatal::CreateDestination`] if the directory cannot be created
///
/// In both cases no file is moved.
pub fn move_duplicates(
    snapshot: &DuplicateSnapshot,
    destination: &Path,
    config: &ActionConfig,
    confirm: &dyn Confirm,
) -> Result<ActionReport, ActionFatal> {
    let plan = ActionPlan::new(ActionKind::Move, snapshot, Some(destination));
    require_confirmation(confirm, &plan)?;

    fs::create_dir_all(destination).map_err(|source| {
        log::error!(
            "Cannot create destination {}: {}",
            destination.display(),
            source
        );
        ActionFatal::CreateDestination {
            path: destination.to_path_buf(),
            source,
        }
    })?;

    let mut report = ActionReport::new(ActionKind::Move);
    report.target = Some(destination.to_path_buf());
    for (duplicate, canonical) in snapshot.non_canonical() {
        match move_one(duplicate, canonical, destination, config) {
            Ok(size) => report.record_success(size),
            Err(e) => report.record_failure(e),
        }
    }

    log::info!("{}", report.summary());
    Ok(report)
}
