//! Checks run before a duplicate is deleted or moved.
//!
//! Fingerprint equality is not proof of equal content, and files can change
//! between scan and action. [`verify_duplicate`] guards against both: the
//! duplicate must still match its scan record, and its bytes must equal the
//! canonical file's.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::ActionError;
use crate::scanner::FileRecord;

/// Buffer size used per file when comparing contents.
pub const COMPARE_BUFFER_SIZE: usize = 256 * 1024;

/// File metadata snapshot for TOCTOU verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSnapshot {
    /// Path to the file.
    pub path: PathBuf,
    /// File size in bytes.
    pub size: u64,
    /// Last modification time.
    pub mtime: Option<SystemTime>,
}

impl FileSnapshot {
    /// Capture a file's current state.
    ///
    /// # Errors
    ///
    /// Returns error if the file doesn't exist or can't be accessed.
    pub fn capture(path: &Path) -> Result<Self, ActionError> {
        let metadata = fs::metadata(path).map_err(|e| ActionError::from_io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            size: metadata.len(),
            mtime: metadata.modified().ok(),
        })
    }

    /// The state a scan recorded for `record`.
    #[must_use]
    pub fn from_record(record: &FileRecord) -> Self {
        Self {
            path: record.path.clone(),
            size: record.size,
            mtime: Some(record.modified),
        }
    }

    /// Verify that the file still matches this snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Modified`] if size or mtime changed, or the
    /// access error if the file is gone or unreadable.
    pub fn verify(&self) -> Result<(), ActionError> {
        let current = Self::capture(&self.path)?;

        if let (Some(orig), Some(curr)) = (self.mtime, current.mtime) {
            if orig != curr {
                log::warn!(
                    "File modified since scan: {} (mtime changed)",
                    self.path.display()
                );
                return Err(ActionError::Modified(self.path.clone()));
            }
        }

        if self.size != current.size {
            log::warn!(
                "File modified since scan: {} (size changed from {} to {})",
                self.path.display(),
                self.size,
                current.size
            );
            return Err(ActionError::Modified(self.path.clone()));
        }

        Ok(())
    }
}

/// Compare two files byte for byte, reading `buffer_size` bytes at a time.
///
/// # Errors
///
/// Returns the first I/O error from either file.
pub fn files_identical(a: &Path, b: &Path, buffer_size: usize) -> io::Result<bool> {
    let mut fa = File::open(a)?;
    let mut fb = File::open(b)?;
    if fa.metadata()?.len() != fb.metadata()?.len() {
        return Ok(false);
    }

    let size = buffer_size.max(1);
    let mut buf_a = vec![0u8; size];
    let mut buf_b = vec![0u8; size];
    loop {
        let na = read_full(&mut fa, &mut buf_a)?;
        let nb = read_full(&mut fb, &mut buf_b)?;
        if na != nb || buf_a[..na] != buf_b[..nb] {
            return Ok(false);
        }
        if na == 0 {
            return Ok(true);
        }
    }
}

/// Fill `buf` as far as possible; fewer bytes only at end of file.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Check that `duplicate` is unchanged since the scan and still equal to
/// `canonical`.
///
/// # Errors
///
/// - [`ActionError::Modified`] if the duplicate's size or mtime changed
/// - [`ActionError::ContentMismatch`] if the bytes differ
/// - an access error for whichever file could not be read
pub fn verify_duplicate(
    duplicate: &FileRecord,
    canonical: &FileRecord,
    buffer_size: usize,
) -> Result<(), ActionError> {
    FileSnapshot::from_record(duplicate).verify()?;

    match files_identical(&duplicate.path, &canonical.path, buffer_size) {
        Ok(true) => Ok(()),
        Ok(false) => {
            log::warn!(
                "Content of {} no longer matches {}",
                duplicate.path.display(),
                canonical.path.display()
            );
            Err(ActionError::ContentMismatch {
                path: duplicate.path.clone(),
                canonical: canonical.path.clone(),
            })
        }
        Err(e) => {
            // Attribute the failure to whichever file is actually unreadable.
            let culprit = if File::open(&duplicate.path).is_err() {
                &duplicate.path
            } else {
                &canonical.path
            };
            Err(ActionError::from_io(culprit, e))
        }
    }
}
