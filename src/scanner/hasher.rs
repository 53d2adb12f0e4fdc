//! Streaming content fingerprints.
//!
//! # Overview
//!
//! [`Hasher`] reads a file through a fixed-size buffer and feeds it to
//! BLAKE3, so memory use stays bounded no matter how large the file is.
//! The resulting [`Fingerprint`] is the duplicate-equality key.
//!
//! Fingerprint equality is treated as content equality. Destructive actions
//! can add a byte-level comparison on top (see [`crate::actions::verify`]).

use std::fmt;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Serialize, Serializer};

use super::{FileRecord, HashError};

/// Default read buffer size (2 MiB).
pub const DEFAULT_BUFFER_SIZE: usize = 2 * 1024 * 1024;

/// Smallest accepted read buffer.
pub const MIN_BUFFER_SIZE: usize = 4 * 1024;

/// Largest accepted read buffer.
pub const MAX_BUFFER_SIZE: usize = 64 * 1024 * 1024;

/// Content-derived digest used as the registry key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Wrap raw digest bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hexadecimal form.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hash_to_hex(&self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form keeps log lines readable
        write!(f, "Fingerprint({})", &self.to_hex()[..16])
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Convert digest bytes to a lowercase hex string.
#[must_use]
pub fn hash_to_hex(bytes: &[u8]) -> String {
    use fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// Streaming file fingerprinter.
///
/// Cheap to clone; every fingerprinter worker owns its own copy and its
/// own read buffer.
#[derive(Debug, Clone)]
pub struct Hasher {
    buffer_size: usize,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a hasher with the default buffer size.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            shutdown_flag: None,
        }
    }

    /// Set the read buffer size, clamped to a sane range.
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.clamp(MIN_BUFFER_SIZE, MAX_BUFFER_SIZE);
        self
    }

    /// Set the shutdown flag; reading stops between chunks once it is raised.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Configured read buffer size.
    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Fingerprint a file, returning the digest and the number of bytes read.
    ///
    /// Allocates a fresh buffer; workers that hash many files should use
    /// [`Hasher::fingerprint_with_buffer`].
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read, or if the
    /// scan was cancelled mid-read.
    pub fn fingerprint(&self, path: &Path) -> Result<(Fingerprint, u64), HashError> {
        let mut buf = vec![0u8; self.buffer_size];
        self.fingerprint_with_buffer(path, &mut buf)
    }

    /// Fingerprint a file using a caller-owned buffer.
    ///
    /// # Errors
    ///
    /// See [`Hasher::fingerprint`].
    pub fn fingerprint_with_buffer(
        &self,
        path: &Path,
        buf: &mut [u8],
    ) -> Result<(Fingerprint, u64), HashError> {
        let mut file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let mut hasher = blake3::Hasher::new();
        let mut total: u64 = 0;

        loop {
            if self.is_shutdown_requested() {
                return Err(HashError::Interrupted(path.to_path_buf()));
            }
            let n = match file.read(buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path, e)),
            };
            hasher.update(&buf[..n]);
            total += n as u64;
        }

        Ok((Fingerprint(*hasher.finalize().as_bytes()), total))
    }

    /// Fingerprint a discovered record.
    ///
    /// Returns the record (with its fingerprint filled in) alongside the
    /// fingerprint itself. The record is rejected when the bytes read differ from the size the
    /// walker saw, since the file changed underneath the scan.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::SizeMismatch`] on a size change, or any error from
    /// [`Hasher::fingerprint_with_buffer`].
    pub fn fingerprint_record(
        &self,
        record: FileRecord,
        buf: &mut [u8],
    ) -> Result<(FileRecord, Fingerprint), HashError> {
        let (fingerprint, read) = self.fingerprint_with_buffer(&record.path, buf)?;
        if read != record.size {
            return Err(HashError::SizeMismatch {
                path: record.path,
                expected: record.size,
                actual: read,
            });
        }
        Ok((record.with_fingerprint(fingerprint), fingerprint))
    }
}
