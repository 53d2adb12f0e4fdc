//! Duplicate detection module.
//!
//! This module provides:
//! - [`DuplicateGroup`]: records sharing a fingerprint, in canonical order
//! - [`Registry`]: fingerprint → group map plus running counters
//! - [`aggregator`]: the single consumer that mutates the registry
//! - [`DuplicateSnapshot`]: a consistent copy of every duplicate set
//!
//! The registry is only mutated by the aggregator. Everyone else reads it
//! through a shared read lock and takes copies, so a reader never sees a
//! group and the counters out of step.

pub mod aggregator;
pub mod groups;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use crate::scanner::{FileRecord, Fingerprint};

pub use aggregator::Aggregator;
pub use groups::{DuplicateGroup, DuplicateSet, GroupKey, GroupSummary};

/// Raw counters maintained alongside the groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    /// Records aggregated so far
    pub files_scanned: u64,
    /// Bytes of every aggregated record
    pub total_bytes: u64,
    /// Sum over groups of (members - 1)
    pub duplicate_count: u64,
    /// Sum of sizes of all non-canonical members
    pub duplicate_bytes: u64,
}

/// Mapping from fingerprint to duplicate group, with counters.
#[derive(Debug, Default)]
pub struct Registry {
    groups: HashMap<GroupKey, DuplicateGroup>,
    counters: Counters,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fingerprinted record.
    ///
    /// Counters and group membership change together. Returns the group's
    /// new summary when the record joined an existing group (the group is
    /// now, or still is, a duplicate set); `None` for a new singleton.
    pub fn insert(&mut self, fingerprint: Fingerprint, record: FileRecord) -> Option<GroupSummary> {
        self.counters.files_scanned += 1;
        self.counters.total_bytes += record.size;

        match self.groups.get_mut(&fingerprint) {
            None => {
                self.groups
                    .insert(fingerprint, DuplicateGroup::new(fingerprint, record));
                None
            }
            Some(group) => {
                // The newcomer may outrank the current canonical file, so the
                // byte delta is taken from the group rather than the record.
                let before = group.duplicate_bytes();
                group.insert(record);
                let after = group.duplicate_bytes();

                self.counters.duplicate_count += 1;
                self.counters.duplicate_bytes = self.counters.duplicate_bytes - before + after;

                Some(group.summary())
            }
        }
    }

    /// Current counter values.
    #[must_use]
    pub fn counters(&self) -> Counters {
        self.counters
    }

    /// Iterate over every group, singletons included.
    pub fn groups(&self) -> impl Iterator<Item = &DuplicateGroup> {
        self.groups.values()
    }

    /// Copy every group with at least two members.
    #[must_use]
    pub fn snapshot(&self) -> DuplicateSnapshot {
        let mut sets: Vec<DuplicateSet> = self
            .groups
            .values()
            .filter(|g| g.is_duplicate_set())
            .map(DuplicateSet::from)
            .collect();
        sets.sort_by(|a, b| a.canonical.path.cmp(&b.canonical.path));
        DuplicateSnapshot { sets }
    }
}

/// Registry handle shared between the aggregator and readers.
#[derive(Debug, Clone, Default)]
pub struct SharedRegistry(Arc<RwLock<Registry>>);

impl SharedRegistry {
    /// Create an empty shared registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a read lock.
    ///
    /// Every write completes a whole insert before releasing the lock, so a
    /// poisoned lock still guards consistent data.
    pub fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the counters.
    #[must_use]
    pub fn counters(&self) -> Counters {
        self.read().counters()
    }

    /// Copy of every duplicate set.
    #[must_use]
    pub fn snapshot(&self) -> DuplicateSnapshot {
        self.read().snapshot()
    }
}

/// Point-in-time copy of all duplicate sets, ordered by canonical path.
///
/// Actions operate on this; it never changes once taken.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DuplicateSnapshot {
    sets: Vec<DuplicateSet>,
}

impl DuplicateSnapshot {
    /// Build a snapshot from sets (sets with no duplicates are dropped).
    #[must_use]
    pub fn from_sets(sets: Vec<DuplicateSet>) -> Self {
        Self {
            sets: sets.into_iter().filter(|s| !s.duplicates.is_empty()).collect(),
        }
    }

    /// Duplicate sets.
    #[must_use]
    pub fn sets(&self) -> &[DuplicateSet] {
        &self.sets
    }

    /// Whether there are no duplicates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Every non-canonical record paired with its group's canonical record.
    pub fn non_canonical(&self) -> impl Iterator<Item = (&FileRecord, &FileRecord)> {
        self.sets
            .iter()
            .flat_map(|s| s.duplicates.iter().map(move |d| (d, &s.canonical)))
    }

    /// Paths of every non-canonical record.
    #[must_use]
    pub fn duplicate_paths(&self) -> Vec<PathBuf> {
        self.non_canonical().map(|(d, _)| d.path.clone()).collect()
    }

    /// Number of non-canonical records.
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.sets.iter().map(|s| s.duplicates.len()).sum()
    }

    /// Bytes held by non-canonical records.
    #[must_use]
    pub fn duplicate_bytes(&self) -> u64 {
        self.sets.iter().map(DuplicateSet::duplicate_bytes).sum()
    }

    /// Whether `path` is the canonical file of some set.
    #[must_use]
    pub fn is_canonical(&self, path: &Path) -> bool {
        self.sets.iter().any(|s| s.canonical.path == path)
    }
}
