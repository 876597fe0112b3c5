//! First-seen duplicate detection over content fingerprints.

use crate::hasher::Fingerprint;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};

/// Outcome of registering one file with the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateStatus {
    /// First file seen with this content, or a file that could not be hashed.
    Canonical,
    /// Same content as the earlier file at the given path.
    DuplicateOf(PathBuf),
}

impl DuplicateStatus {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateOf(_))
    }
}

/// Maps each fingerprint to the first file registered with it.
///
/// Records must be registered in traversal order: the tie-break between
/// identical files is purely "who was registered first".
#[derive(Debug, Default)]
pub struct DuplicateIndex {
    first_seen: HashMap<Fingerprint, PathBuf>,
    duplicates: usize,
}

impl DuplicateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a file and reports whether it duplicates an earlier one.
    ///
    /// Files without a fingerprint (hashing failed) are never compared and
    /// are always reported as canonical.
    pub fn register(&mut self, path: &Path, fingerprint: Option<&Fingerprint>) -> DuplicateStatus {
        let Some(fingerprint) = fingerprint else {
            return DuplicateStatus::Canonical;
        };

        match self.first_seen.entry(*fingerprint) {
            Entry::Occupied(first) => {
                self.duplicates += 1;
                DuplicateStatus::DuplicateOf(first.get().clone())
            }
            Entry::Vacant(slot) => {
                slot.insert(path.to_path_buf());
                DuplicateStatus::Canonical
            }
        }
    }

    /// Number of files flagged as duplicates so far.
    pub fn duplicate_count(&self) -> usize {
        self.duplicates
    }

    /// Number of distinct fingerprints seen so far.
    pub fn unique_count(&self) -> usize {
        self.first_seen.len()
    }
}
