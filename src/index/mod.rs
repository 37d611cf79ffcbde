//! In-memory file index of the served tree.
//!
//! A background task walks the root on a schedule (`builder`), wraps the result in an
//! immutable `MetadataSnapshot`, and publishes it through `SharedIndex` (`shared`). Every
//! published state owns its own `DirSizeCache` (`dir_size`), so size memos can never outlive
//! the snapshot they were computed from. Nothing here is persisted.

mod builder;
mod dir_size;
mod shared;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use builder::rebuild;
pub use dir_size::DirSizeCache;
pub use shared::{spawn_refresh_loop, IndexState, RefreshSchedule, SharedIndex};

/// One regular file under the served root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    /// Root-relative path using '/' separators.
    pub path: String,
    pub size: u64,
    pub modified_at: DateTime<Utc>,
    pub is_dir: bool,
}

impl IndexEntry {
    pub fn file(path: impl Into<String>, size: u64, modified_at: DateTime<Utc>) -> Self {
        Self { path: path.into(), size, modified_at, is_dir: false }
    }

    pub fn name(&self) -> &str {
        crate::paths::base_name(&self.path)
    }
}

/// Immutable, walk-ordered list of entries with unique paths.
#[derive(Debug, Clone, Default)]
pub struct MetadataSnapshot {
    entries: Vec<IndexEntry>,
}

impl MetadataSnapshot {
    /// Build a snapshot, keeping the first occurrence of any repeated path.
    pub fn from_entries(entries: Vec<IndexEntry>) -> Self {
        let mut seen: HashSet<String> = HashSet::with_capacity(entries.len());
        let entries = entries.into_iter().filter(|e| seen.insert(e.path.clone())).collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[IndexEntry] { &self.entries }
    pub fn iter(&self) -> std::slice::Iter<'_, IndexEntry> { self.entries.iter() }
    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Sum of all entry sizes.
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }
}

impl<'a> IntoIterator for &'a MetadataSnapshot {
    type Item = &'a IndexEntry;
    type IntoIter = std::slice::Iter<'a, IndexEntry>;
    fn into_iter(self) -> Self::IntoIter { self.entries.iter() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_entries_drops_duplicate_paths() {
        let t = Utc::now();
        let snap = MetadataSnapshot::from_entries(vec![
            IndexEntry::file("a.txt", 1, t),
            IndexEntry::file("b/c.txt", 2, t),
            IndexEntry::file("a.txt", 99, t),
        ]);
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.entries()[0].size, 1);
        assert_eq!(snap.total_size(), 3);
    }

    #[test]
    fn entry_name_is_last_segment() {
        let e = IndexEntry::file("docs/notes/rfc.md", 10, Utc::now());
        assert_eq!(e.name(), "rfc.md");
        assert!(!e.is_dir);
    }
}
