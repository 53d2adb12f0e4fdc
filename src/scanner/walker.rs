//! Directory walker implementation using walkdir.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct for traversing a directory
//! tree and producing a [`FileRecord`] for every regular, non-empty file.
//! Traversal is single-threaded; fingerprinting is where the parallelism is.
//!
//! # Features
//!
//! - Symlinks, directories and special files are never emitted
//! - Empty files are skipped before fingerprinting
//! - Gitignore-style pattern matching via the `ignore` crate
//! - Hidden file filtering and excluded subtrees
//! - Per-entry errors are yielded, not fatal
//! - Graceful shutdown via atomic flag
//!
//! # Example
//!
//! ```no_run
//! use dupfu::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/home/user/Downloads"), WalkerConfig::default());
//! let files: Vec<_> = walker.walk().filter_map(Result::ok).collect();
//! println!("Found {} candidate files", files.len());
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use walkdir::{DirEntry, WalkDir};

use super::{FileRecord, ScanError, WalkerConfig};

/// Directory walker for file discovery.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given path.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// When the flag is set to `true`, the walker stops yielding entries.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Root directory of this walk.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Check that the root can be opened as a directory.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the root is missing, unreadable,
    /// or not a directory.
    pub fn open_root(&self) -> io::Result<()> {
        std::fs::read_dir(&self.root).map(drop)
    }

    /// Build gitignore matcher from config patterns.
    fn build_gitignore(&self) -> Option<Gitignore> {
        if self.config.ignore_patterns.is_empty() {
            return None;
        }

        let mut builder = GitignoreBuilder::new(&self.root);
        for pattern in &self.config.ignore_patterns {
            if let Err(e) = builder.add_line(None, pattern) {
                log::warn!("Invalid ignore pattern '{}': {}", pattern, e);
            }
        }

        match builder.build() {
            Ok(gitignore) if !gitignore.is_empty() => Some(gitignore),
            Ok(_) => None,
            Err(e) => {
                log::warn!("Failed to build ignore patterns: {}", e);
                None
            }
        }
    }

    /// Decide whether an entry (and, for directories, its subtree) is walked.
    fn keep_entry(&self, entry: &DirEntry, gitignore: Option<&Gitignore>) -> bool {
        if entry.depth() == 0 {
            return true;
        }

        if self.config.skip_hidden
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with('.'))
        {
            log::trace!("Skipping hidden entry: {}", entry.path().display());
            return false;
        }

        let is_dir = entry.file_type().is_dir();
        if is_dir
            && self
                .config
                .exclude_dirs
                .iter()
                .any(|d| entry.path() == d.as_path())
        {
            log::debug!("Skipping excluded directory: {}", entry.path().display());
            return false;
        }

        if let Some(gi) = gitignore {
            let relative = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
            if gi.matched(relative, is_dir).is_ignore() {
                log::trace!("Ignoring: {}", entry.path().display());
                return false;
            }
        }

        true
    }

    /// Walk the directory tree, yielding file records.
    ///
    /// Errors are yielded as [`ScanError`] values rather than stopping
    /// iteration. Entries are visited in file-name order.
    pub fn walk(&self) -> impl Iterator<Item = Result<FileRecord, ScanError>> + '_ {
        let gitignore = self.build_gitignore();

        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| self.keep_entry(entry, gitignore.as_ref()))
            .take_while(move |_| {
                if self.is_shutdown_requested() {
                    log::debug!("Walker: Shutdown requested, stopping iteration");
                    false
                } else {
                    true
                }
            })
            .filter_map(move |entry_result| match entry_result {
                Ok(entry) => self.process_entry(&entry),
                Err(e) => Some(Err(Self::convert_walk_error(&self.root, e))),
            })
    }

    /// Turn a walked entry into a record if it qualifies.
    fn process_entry(&self, entry: &DirEntry) -> Option<Result<FileRecord, ScanError>> {
        let file_type = entry.file_type();
        if file_type.is_dir() {
            return None;
        }
        if file_type.is_symlink() {
            log::trace!("Skipping symlink: {}", entry.path().display());
            return None;
        }
        if !file_type.is_file() {
            log::trace!("Skipping special file: {}", entry.path().display());
            return None;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => return Some(Err(Self::convert_walk_error(&self.root, e))),
        };

        let size = metadata.len();
        if size == 0 {
            log::debug!("Skipping empty file: {}", entry.path().display());
            return None;
        }

        let modified = modified_or_oldest(entry.path(), metadata.modified());

        Some(Ok(FileRecord::new(entry.path().to_path_buf(), size, modified)))
    }

    /// Convert a walkdir error into a [`ScanError`].
    fn convert_walk_error(root: &Path, error: walkdir::Error) -> ScanError {
        let path = error
            .path()
            .map_or_else(|| root.to_path_buf(), Path::to_path_buf);

        match error.io_error().map(io::Error::kind) {
            Some(io::ErrorKind::PermissionDenied) => {
                log::warn!("Permission denied: {}", path.display());
                ScanError::PermissionDenied(path)
            }
            Some(io::ErrorKind::NotFound) => {
                log::debug!("Entry vanished during walk: {}", path.display());
                ScanError::NotFound(path)
            }
            _ => {
                log::warn!("Walker error for {}: {}", path.display(), error);
                match error.into_io_error() {
                    Some(source) => ScanError::Io { path, source },
                    None => ScanError::Walk {
                        message: "filesystem loop detected".to_string(),
                        path,
                    },
                }
            }
        }
    }
}

/// A file without a modification time ranks as the oldest of its group.
fn modified_or_oldest(path: &Path, modified: io::Result<SystemTime>) -> SystemTime {
    modified.unwrap_or_else(|e| {
        log::debug!(
            "No modification time for {} ({}), treating it as oldest",
            path.display(),
            e
        );
        SystemTime::UNIX_EPOCH
    })
}
