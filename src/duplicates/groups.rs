//! Duplicate groups and their published summaries.
//!
//! # Overview
//!
//! A [`DuplicateGroup`] holds every record that shares one fingerprint,
//! kept in ascending modification-time order. Member 0 is the canonical
//! ("keep") file; the rest are duplicates. Ties keep arrival order.
//!
//! # Example
//!
//! ```
//! use dupfu::duplicates::DuplicateGroup;
//! use dupfu::scanner::{FileRecord, Fingerprint};
//! use std::path::PathBuf;
//! use std::time::{Duration, SystemTime};
//!
//! let fp = Fingerprint::from_bytes([1u8; 32]);
//! let t = SystemTime::UNIX_EPOCH;
//! let newer = FileRecord::new(PathBuf::from("/b"), 4, t + Duration::from_secs(10))
//!     .with_fingerprint(fp);
//! let older = FileRecord::new(PathBuf::from("/a"), 4, t).with_fingerprint(fp);
//!
//! let mut group = DuplicateGroup::new(fp, newer);
//! group.insert(older);
//!
//! assert_eq!(group.canonical().path, PathBuf::from("/a"));
//! assert_eq!(group.duplicate_count(), 1);
//! ```

use std::path::PathBuf;

use serde::Serialize;

use crate::scanner::{FileRecord, Fingerprint};

/// Stable key of a group, so a display can update rows in place.
pub type GroupKey = Fingerprint;

/// All records sharing one fingerprint, sorted by modification time.
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    key: GroupKey,
    members: Vec<FileRecord>,
}

impl DuplicateGroup {
    /// Create a singleton group.
    #[must_use]
    pub fn new(key: GroupKey, first: FileRecord) -> Self {
        Self {
            key,
            members: vec![first],
        }
    }

    /// Insert a record at its ordered position.
    ///
    /// Uses the upper bound on modification time, so a record that ties
    /// with existing members lands after them (stable). Returns the index
    /// the record was inserted at.
    pub fn insert(&mut self, record: FileRecord) -> usize {
        let idx = self
            .members
            .partition_point(|m| m.modified <= record.modified);
        self.members.insert(idx, record);
        idx
    }

    /// Fingerprint shared by all members.
    #[must_use]
    pub fn key(&self) -> GroupKey {
        self.key
    }

    /// Members in canonical order.
    #[must_use]
    pub fn members(&self) -> &[FileRecord] {
        &self.members
    }

    /// The earliest-modified member.
    #[must_use]
    pub fn canonical(&self) -> &FileRecord {
        // A group is never constructed empty and members are never removed.
        &self.members[0]
    }

    /// Members after the canonical one.
    #[must_use]
    pub fn duplicates(&self) -> &[FileRecord] {
        &self.members[1..]
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always false; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether the group holds at least two members.
    #[must_use]
    pub fn is_duplicate_set(&self) -> bool {
        self.members.len() > 1
    }

    /// Number of non-canonical members.
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.members.len().saturating_sub(1)
    }

    /// Total size of the non-canonical members.
    #[must_use]
    pub fn duplicate_bytes(&self) -> u64 {
        self.duplicates().iter().map(|m| m.size).sum()
    }

    /// External summary for display.
    #[must_use]
    pub fn summary(&self) -> GroupSummary {
        GroupSummary {
            key: self.key,
            canonical: self.canonical().path.clone(),
            duplicate_count: self.duplicate_count(),
            first_duplicate: self.duplicates().first().map(|r| r.path.clone()),
        }
    }
}

/// What a display shows for one duplicate set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    /// Stable row key
    pub key: GroupKey,
    /// Path of the file that is kept
    pub canonical: PathBuf,
    /// Number of duplicates of the canonical file
    pub duplicate_count: usize,
    /// The first duplicate in canonical order
    pub first_duplicate: Option<PathBuf>,
}

impl GroupSummary {
    /// Condensed duplicate listing: the first duplicate, plus `(+N more)`
    /// when there are others.
    #[must_use]
    pub fn condensed(&self) -> String {
        let Some(first) = &self.first_duplicate else {
            return String::new();
        };
        let first = first.display();
        if self.duplicate_count > 1 {
            format!("{} (+{} more)", first, self.duplicate_count - 1)
        } else {
            first.to_string()
        }
    }
}

/// A point-in-time copy of one duplicate set.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateSet {
    /// Shared fingerprint
    pub key: GroupKey,
    /// File that is kept
    #[serde(serialize_with = "serialize_record")]
    pub canonical: FileRecord,
    /// Files considered redundant, in canonical order
    #[serde(serialize_with = "serialize_records")]
    pub duplicates: Vec<FileRecord>,
}

impl DuplicateSet {
    /// Total bytes held by the duplicates.
    #[must_use]
    pub fn duplicate_bytes(&self) -> u64 {
        self.duplicates.iter().map(|d| d.size).sum()
    }
}

impl From<&DuplicateGroup> for DuplicateSet {
    fn from(group: &DuplicateGroup) -> Self {
        Self {
            key: group.key(),
            canonical: group.canonical().clone(),
            duplicates: group.duplicates().to_vec(),
        }
    }
}

#[derive(Serialize)]
struct RecordView<'a> {
    path: &'a std::path::Path,
    size: u64,
    modified: chrono::DateTime<chrono::Utc>,
}

impl<'a> From<&'a FileRecord> for RecordView<'a> {
    fn from(r: &'a FileRecord) -> Self {
        Self {
            path: &r.path,
            size: r.size,
            modified: r.modified.into(),
        }
    }
}

fn serialize_record<S: serde::Serializer>(r: &FileRecord, s: S) -> Result<S::Ok, S::Error> {
    RecordView::from(r).serialize(s)
}

fn serialize_records<S: serde::Serializer>(rs: &[FileRecord], s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(rs.iter().map(RecordView::from))
}
