//! Scanner module for directory traversal and content fingerprinting.
//!
//! This module provides functionality for:
//! - Single-threaded recursive directory walking using walkdir
//! - Streaming BLAKE3 fingerprints over a bounded read buffer
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and file discovery
//! - [`hasher`]: Content fingerprinting (streaming)
//!
//! # Example
//!
//! ```no_run
//! use dupfu::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("."), WalkerConfig::default());
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{}: {} bytes", file.path.display(), file.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod hasher;
pub mod walker;

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub use hasher::{hash_to_hex, Fingerprint, Hasher, DEFAULT_BUFFER_SIZE};
pub use walker::Walker;

/// One on-disk regular file as seen at scan time.
///
/// Created by the walker with path, size and modification time. The
/// fingerprint is filled in by a fingerprinter worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Absolute path to the file
    pub path: PathBuf,
    /// File size in bytes, as reported by the filesystem
    pub size: u64,
    /// Last modification time
    pub modified: SystemTime,
    /// Content fingerprint, `None` until computed
    pub fingerprint: Option<Fingerprint>,
}

impl FileRecord {
    /// Create a record without a fingerprint.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the file
    /// * `size` - File size in bytes
    /// * `modified` - Last modification time
    #[must_use]
    pub fn new(path: PathBuf, size: u64, modified: SystemTime) -> Self {
        Self {
            path,
            size,
            modified,
            fingerprint: None,
        }
    }

    /// Return this record enriched with its fingerprint.
    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: Fingerprint) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }
}

/// Resolve `path` to the spelling the walker uses for entries under a
/// canonical root.
///
/// Symlinks and `..` are resolved through the longest existing ancestor; the
/// components that do not exist yet are appended unchanged. Two spellings of
/// the same directory resolve to the same path.
///
/// # Errors
///
/// Returns the I/O error if the current directory or an existing ancestor
/// cannot be resolved.
pub fn resolve_path(path: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let mut base = absolute.as_path();
    let mut missing: Vec<OsString> = Vec::new();

    let mut resolved = loop {
        match std::fs::canonicalize(base) {
            Ok(resolved) => break resolved,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let (Some(parent), Some(last)) = (base.parent(), base.components().next_back())
                else {
                    return Err(e);
                };
                missing.push(last.as_os_str().to_os_string());
                base = parent;
            }
            Err(e) => return Err(e),
        }
    };

    for component in missing.iter().rev() {
        if component == ".." {
            resolved.pop();
        } else if component != "." {
            resolved.push(component);
        }
    }
    Ok(resolved)
}

/// Configuration for directory walking.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Skip hidden files and directories (names starting with `.`).
    pub skip_hidden: bool,

    /// Glob patterns to ignore (gitignore-style), relative to the root.
    pub ignore_patterns: Vec<String>,

    /// Directories whose subtrees are never entered.
    ///
    /// Used to keep the action destination out of the scan.
    pub exclude_dirs: Vec<PathBuf>,
}

impl WalkerConfig {
    /// Create a new configuration from CLI arguments.
    #[must_use]
    pub fn new(skip_hidden: bool, ignore_patterns: Vec<String>) -> Self {
        Self {
            skip_hidden,
            ignore_patterns,
            exclude_dirs: Vec::new(),
        }
    }

    /// Add a directory to skip during traversal.
    #[must_use]
    pub fn with_excluded_dir(mut self, dir: PathBuf) -> Self {
        self.exclude_dirs.push(dir);
        self
    }
}

/// Errors that can occur while walking a directory tree.
///
/// All of these are per-entry and non-fatal: traversal continues.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The entry vanished between listing and inspection.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// An I/O error occurred while accessing an entry.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The traversal itself failed (for example a loop or an unreadable directory).
    #[error("Walk error at {path}: {message}")]
    Walk {
        /// Path where the error occurred
        path: PathBuf,
        /// Description from the walker
        message: String,
    },
}

impl ScanError {
    /// Path associated with this error.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::PermissionDenied(p) | Self::NotFound(p) => p,
            Self::Io { path, .. } | Self::Walk { path, .. } => path,
        }
    }
}

/// Errors that can occur while fingerprinting a file.
///
/// A file that fails to fingerprint is dropped from the pipeline.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The number of bytes read differs from the size seen by the walker.
    #[error("Size changed for {path}: expected {expected} bytes, read {actual}")]
    SizeMismatch {
        /// Path of the file
        path: PathBuf,
        /// Size reported at discovery time
        expected: u64,
        /// Bytes actually read
        actual: u64,
    },

    /// Reading stopped because the scan was cancelled.
    #[error("Interrupted while reading {0}")]
    Interrupted(PathBuf),
}

impl HashError {
    /// Map an I/O error on `path` to the matching variant.
    pub(crate) fn from_io(path: &std::path::Path, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }

    /// Path associated with this error.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::NotFound(p) | Self::PermissionDenied(p) | Self::Interrupted(p) => p,
            Self::Io { path, .. } | Self::SizeMismatch { path, .. } => path,
        }
    }
}
