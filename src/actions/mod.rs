//! Bulk actions over a duplicate snapshot.
//!
//! Every action works on a [`DuplicateSnapshot`] taken once after the scan,
//! and only ever touches non-canonical files:
//! - [`delete`]: move duplicates to the system trash, or remove them
//! - [`relocate`]: move duplicates into a destination directory
//! - [`export`]: write a manifest of duplicate paths
//!
//! Per-file failures never stop a batch; they are collected as
//! [`ActionError`]s in the returned [`ActionReport`]. Only setup failures
//! (no destination directory, unwritable manifest) or a declined
//! confirmation abort an action, as [`ActionFatal`].
//!
//! Before deleting or moving, each duplicate is re-checked against its scan
//! record and byte-compared with its group's canonical file (see [`verify`]).
//!
//! ```no_run
//! use dupfu::actions::{ActionConfig, ActionExecutor, AutoConfirm};
//! use dupfu::pipeline::DuplicateFinder;
//! use std::path::Path;
//!
//! let outcome = DuplicateFinder::with_defaults().scan(Path::new(".")).unwrap();
//! let executor = ActionExecutor::new(&outcome.duplicates, ActionConfig::permanent());
//! let report = executor.delete(&AutoConfirm).unwrap();
//! println!("{}", report.summary());
//! ```

pub mod delete;
pub mod export;
pub mod relocate;
pub mod verify;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use bytesize::ByteSize;
use thiserror::Error;

use crate::duplicates::DuplicateSnapshot;

pub use delete::{delete_duplicates, delete_to_trash, permanent_delete};
pub use export::{export_manifest, DEFAULT_MANIFEST_NAME};
pub use relocate::{move_duplicates, unique_destination};
pub use verify::{files_identical, verify_duplicate, FileSnapshot};

/// Per-file action failure. The batch continues.
#[derive(Debug, Error)]
pub enum ActionError {
    /// File was not found (may have been deleted or moved).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// File was modified since the scan.
    #[error("file modified since scan: {0}")]
    Modified(PathBuf),

    /// File content no longer matches its canonical copy.
    #[error("content of {path} differs from {canonical}")]
    ContentMismatch {
        /// The duplicate
        path: PathBuf,
        /// The canonical file it was compared with
        canonical: PathBuf,
    },

    /// Path cannot be written to a UTF-8 manifest.
    #[error("path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),

    /// Path contains a line break and cannot be one manifest line.
    #[error("path contains a line break: {path:?}")]
    MultiLinePath {
        /// The offending path
        path: PathBuf,
    },

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path involved
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Trash operation failed.
    #[error("trash operation failed for {path}: {message}")]
    Trash {
        /// Path involved
        path: PathBuf,
        /// Message from the trash backend
        message: String,
    },
}

impl ActionError {
    /// Classify an I/O error for `path`.
    #[must_use]
    pub fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }

    /// Path associated with this error.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(p)
            | Self::PermissionDenied(p)
            | Self::Modified(p)
            | Self::NonUtf8Path(p)
            | Self::ContentMismatch { path: p, .. }
            | Self::MultiLinePath { path: p }
            | Self::Io { path: p, .. }
            | Self::Trash { path: p, .. } => p,
        }
    }
}

/// Failure that aborts a whole action. Nothing is touched after it.
#[derive(Debug, Error)]
pub enum ActionFatal {
    /// The destination directory could not be created.
    #[error("cannot create destination directory {path}: {source}")]
    CreateDestination {
        /// Directory path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The manifest file could not be created.
    #[error("cannot create manifest {path}: {source}")]
    CreateManifest {
        /// Manifest path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Writing the manifest failed part-way.
    #[error("failed writing manifest {path}: {source}")]
    WriteManifest {
        /// Manifest path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The confirmation hook refused the action.
    #[error("{0} declined")]
    Declined(ActionKind),
}

/// Which bulk action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Delete duplicates
    Delete,
    /// Move duplicates into a directory
    Move,
    /// Write a manifest of duplicates
    Export,
}

impl ActionKind {
    /// Whether the action removes files from their original location.
    #[must_use]
    pub fn is_destructive(self) -> bool {
        !matches!(self, Self::Export)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Delete => "delete",
            Self::Move => "move",
            Self::Export => "export",
        };
        f.write_str(name)
    }
}

/// What an action is about to do, shown to the confirmation hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionPlan {
    /// The action
    pub kind: ActionKind,
    /// Number of duplicate files affected
    pub files: usize,
    /// Total size of those files
    pub bytes: u64,
    /// Destination directory, for move and export
    pub destination: Option<PathBuf>,
    /// Whether deletion bypasses the trash
    pub permanent: bool,
}

impl ActionPlan {
    /// Plan `kind` over every non-canonical file in `snapshot`.
    #[must_use]
    pub fn new(kind: ActionKind, snapshot: &DuplicateSnapshot, destination: Option<&Path>) -> Self {
        Self {
            kind,
            files: snapshot.duplicate_count(),
            bytes: snapshot.duplicate_bytes(),
            destination: destination.map(Path::to_path_buf),
            permanent: false,
        }
    }

    /// One-line description for prompts.
    #[must_use]
    pub fn describe(&self) -> String {
        let verb = match (self.kind, self.permanent) {
            (ActionKind::Delete, true) => "Permanently delete",
            (ActionKind::Delete, false) => "Move to trash",
            (ActionKind::Move, _) => "Move",
            (ActionKind::Export, _) => "Export the paths of",
        };
        let mut text = format!(
            "{verb} {} duplicate file(s) ({})",
            self.files,
            ByteSize::b(self.bytes)
        );
        if let Some(dest) = &self.destination {
            text.push_str(&format!(" to {}", dest.display()));
        }
        text
    }
}

/// Decides whether an action may proceed.
///
/// The library never prompts; the caller supplies this hook.
pub trait Confirm {
    /// Return `true` to proceed.
    fn confirm(&self, plan: &ActionPlan) -> bool;
}

/// Accepts every plan.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoConfirm;

impl Confirm for AutoConfirm {
    fn confirm(&self, _plan: &ActionPlan) -> bool {
        true
    }
}

impl<F> Confirm for F
where
    F: Fn(&ActionPlan) -> bool,
{
    fn confirm(&self, plan: &ActionPlan) -> bool {
        self(plan)
    }
}

/// Ask `confirm` about `plan`, logging and failing on refusal.
pub(crate) fn require_confirmation(
    confirm: &dyn Confirm,
    plan: &ActionPlan,
) -> Result<(), ActionFatal> {
    if confirm.confirm(plan) {
        Ok(())
    } else {
        log::info!("Declined: {}", plan.describe());
        Err(ActionFatal::Declined(plan.kind))
    }
}

/// Settings shared by every action.
#[derive(Debug, Clone)]
pub struct ActionConfig {
    /// Remove files instead of moving them to the trash.
    pub permanent: bool,
    /// Re-check and byte-compare each duplicate before deleting or moving it.
    pub verify: bool,
    /// Read buffer size used for byte comparison.
    pub buffer_size: usize,
    /// File name of the exported manifest.
    pub manifest_name: String,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            permanent: false,
            verify: true,
            buffer_size: verify::COMPARE_BUFFER_SIZE,
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
        }
    }
}

impl ActionConfig {
    /// Config for trash deletion.
    #[must_use]
    pub fn trash() -> Self {
        Self::default()
    }

    /// Config for permanent deletion.
    #[must_use]
    pub fn permanent() -> Self {
        Self {
            permanent: true,
            ..Self::default()
        }
    }

    /// Enable/disable verification before destructive actions.
    #[must_use]
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Set the comparison buffer size.
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Set the manifest file name.
    #[must_use]
    pub fn with_manifest_name(mut self, name: impl Into<String>) -> Self {
        self.manifest_name = name.into();
        self
    }
}

/// Outcome of one action.
#[derive(Debug)]
pub struct ActionReport {
    /// The action
    pub kind: ActionKind,
    /// Files processed successfully (lines written, for export)
    pub success_count: usize,
    /// Bytes of the files processed successfully
    pub bytes: u64,
    /// Per-file failures
    pub errors: Vec<ActionError>,
    /// Destination directory or manifest file, if any
    pub target: Option<PathBuf>,
}

impl ActionReport {
    pub(crate) fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            success_count: 0,
            bytes: 0,
            errors: Vec::new(),
            target: None,
        }
    }

    pub(crate) fn record_success(&mut self, size: u64) {
        self.success_count += 1;
        self.bytes += size;
    }

    pub(crate) fn record_failure(&mut self, error: ActionError) {
        log::warn!("{} failed: {}", self.kind, error);
        self.errors.push(error);
    }

    /// Number of per-file failures.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.errors.len()
    }

    /// Whether every file succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.errors.is_empty()
    }

    /// Human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let done = match self.kind {
            ActionKind::Delete => format!(
                "Deleted {} file(s), freed {}",
                self.success_count,
                ByteSize::b(self.bytes)
            ),
            ActionKind::Move => format!(
                "Moved {} file(s) ({})",
                self.success_count,
                ByteSize::b(self.bytes)
            ),
            ActionKind::Export => format!("Exported {} path(s)", self.success_count),
        };
        let mut text = match &self.target {
            Some(target) => format!("{done} to {}", target.display()),
            None => done,
        };
        if !self.all_succeeded() {
            text.push_str(&format!(", {} failed", self.failure_count()));
        }
        text
    }
}

/// Runs actions over one snapshot.
pub struct ActionExecutor<'a> {
    snapshot: &'a DuplicateSnapshot,
    config: ActionConfig,
}

impl<'a> ActionExecutor<'a> {
    /// Create an executor over `snapshot`.
    #[must_use]
    pub fn new(snapshot: &'a DuplicateSnapshot, config: ActionConfig) -> Self {
        Self { snapshot, config }
    }

    /// The snapshot being acted on.
    #[must_use]
    pub fn snapshot(&self) -> &DuplicateSnapshot {
        self.snapshot
    }

    /// Delete every duplicate.
    ///
    /// # Errors
    ///
    /// Returns [`ActionFatal::Declined`] if `confirm` refuses.
    pub fn delete(&self, confirm: &dyn Confirm) -> Result<ActionReport, ActionFatal> {
        delete_duplicates(self.snapshot, &self.config, confirm)
    }

    /// Move every duplicate into `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`ActionFatal`] if `confirm` refuses or `destination` cannot
    /// be created.
    pub fn relocate(
        &self,
        destination: &Path,
        confirm: &dyn Confirm,
    ) -> Result<ActionReport, ActionFatal> {
        move_duplicates(self.snapshot, destination, &self.config, confirm)
    }

    /// Write the manifest into `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`ActionFatal`] if `confirm` refuses or the manifest cannot be
    /// written.
    pub fn export(
        &self,
        destination: &Path,
        confirm: &dyn Confirm,
    ) -> Result<ActionReport, ActionFatal> {
        export_manifest(self.snapshot, destination, &self.config, confirm)
    }
}
