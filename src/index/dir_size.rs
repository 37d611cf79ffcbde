use std::collections::HashMap;

use parking_lot::RwLock;

use super::MetadataSnapshot;
use crate::paths;

/// Memoized directory sizes for exactly one snapshot.
///
/// Instances live inside an `IndexState` next to the snapshot they summarize, so publishing a
/// new snapshot drops the whole cache with it.
#[derive(Debug, Default)]
pub struct DirSizeCache {
    sizes: RwLock<HashMap<String, u64>>,
}

impl DirSizeCache {
    pub fn new() -> Self { Self::default() }

    /// Total size of files under `dir` in `snapshot`, computed once per directory.
    /// Unknown directories and paths that escape the root report 0.
    pub(crate) fn size_of(&self, snapshot: &MetadataSnapshot, dir: &str) -> u64 {
        let Ok(key) = paths::clean_request_path(dir) else { return 0; };
        if let Some(v) = self.sizes.read().get(&key) {
            return *v;
        }
        let total: u64 = snapshot
            .iter()
            .filter(|e| paths::is_under(&e.path, &key))
            .map(|e| e.size)
            .sum();
        *self.sizes.write().entry(key).or_insert(total)
    }

    pub fn cached_dirs(&self) -> usize { self.sizes.read().len() }
}
