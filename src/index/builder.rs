use std::path::Path;
use std::time::{Instant, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::{IndexEntry, MetadataSnapshot};
use crate::paths;

/// Walk `root` and snapshot every regular file beneath it.
///
/// Unreadable subtrees, broken links and symlink loops are logged and skipped; the walk
/// carries on and the (partial) snapshot is still returned. Directories are descended into
/// but not recorded. A missing root yields an empty snapshot.
pub fn rebuild(root: &Path) -> MetadataSnapshot {
    let started = Instant::now();
    let mut entries: Vec<IndexEntry> = Vec::new();
    let mut skipped = 0usize;

    for item in WalkDir::new(root).follow_links(true) {
        let ent = match item {
            Ok(ent) => ent,
            Err(e) => {
                // walkdir does not descend into a directory it failed to read
                skipped += 1;
                warn!(target: "index", path = ?e.path(), "visit error, skipping: {}", e);
                continue;
            }
        };
        if !ent.file_type().is_file() { continue; }
        let meta = match ent.metadata() {
            Ok(m) => m,
            Err(e) => {
                skipped += 1;
                warn!(target: "index", path = ?ent.path(), "stat error, skipping: {}", e);
                continue;
            }
        };
        let rel = match ent.path().strip_prefix(root) {
            Ok(r) => paths::to_slash(r),
            Err(_) => continue,
        };
        // root itself is a plain file
        if rel.is_empty() { continue; }
        let modified_at: DateTime<Utc> = meta.modified().unwrap_or(UNIX_EPOCH).into();
        entries.push(IndexEntry { path: rel, size: meta.len(), modified_at, is_dir: false });
    }

    debug!(target: "index", files = entries.len(), skipped, elapsed_ms = started.elapsed().as_millis() as u64, "walk finished");
    MetadataSnapshot::from_entries(entries)
}
