//! JSON directory listings and search results, filtered by the effective policy.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::AppResult;
use crate::index::IndexState;
use crate::paths;
use crate::policy::AccessPolicy;

/// Single-child directory chains are collapsed at most this many levels deep.
pub const MAX_COLLAPSE_DEPTH: usize = 5;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub size: u64,
    /// Modification time in milliseconds since the epoch.
    pub mtime: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Listing {
    pub files: Vec<FileInfo>,
    pub auth: AccessPolicy,
}

fn mtime_ms(t: SystemTime) -> i64 {
    DateTime::<Utc>::from(t).timestamp_millis()
}

/// List `rel` (a cleaned logical directory), or search the index beneath it when `search` is set.
pub fn build_listing(
    root: &Path,
    rel: &str,
    search: Option<&str>,
    policy: &AccessPolicy,
    identity: Option<&str>,
    index: &IndexState,
) -> AppResult<Listing> {
    let files = match search.map(str::trim).filter(|s| !s.is_empty()) {
        Some(q) => search_entries(rel, q, policy, index),
        None => list_directory(root, rel, policy, index)?,
    };
    Ok(Listing { files, auth: policy.decided_for(identity) })
}

fn search_entries(rel: &str, query: &str, policy: &AccessPolicy, index: &IndexState) -> Vec<FileInfo> {
    let hits = index.search(query);
    debug!(target: "index", query, hits = hits.len(), generation = index.generation(), "search");
    hits.into_iter()
        .filter(|e| paths::is_under(&e.path, rel))
        .filter(|e| policy.is_visible(e.name()))
        .map(|e| {
            let name = if rel.is_empty() { e.path.clone() } else { e.path[rel.len() + 1..].to_string() };
            FileInfo { name, path: e.path.clone(), kind: "file".into(), size: e.size, mtime: e.modified_at.timestamp_millis() }
        })
        .collect()
}

fn list_directory(root: &Path, rel: &str, policy: &AccessPolicy, index: &IndexState) -> AppResult<Vec<FileInfo>> {
    let local = paths::local_path(root, rel);
    let mut out = Vec::new();
    for ent in std::fs::read_dir(&local)? {
        let ent = ent?;
        let name = ent.file_name().to_string_lossy().to_string();
        if !policy.is_visible(&name) { continue; }
        let meta = match std::fs::metadata(ent.path()) {
            Ok(m) => m,
            Err(_) => ent.metadata()?,
        };
        let mtime = mtime_ms(meta.modified().unwrap_or(UNIX_EPOCH));
        if meta.is_dir() {
            let collapsed = deep_path(&local, &name);
            let path = paths::join_logical(rel, &collapsed);
            let size = index.size_of(&path);
            out.push(FileInfo { name: collapsed, path, kind: "dir".into(), size, mtime });
        } else {
            let path = paths::join_logical(rel, &name);
            out.push(FileInfo { name, path, kind: "file".into(), size: meta.len(), mtime });
        }
    }
    out.sort_by(|a, b| (a.kind != "dir", &a.name).cmp(&(b.kind != "dir", &b.name)));
    Ok(out)
}

/// Follow a chain of directories that each hold exactly one subdirectory and return the
/// collapsed display name, e.g. `a` -> `a/b/c`.
pub fn deep_path(base: &Path, name: &str) -> String {
    let mut name = name.to_string();
    for _ in 0..=MAX_COLLAPSE_DEPTH {
        let Ok(rd) = std::fs::read_dir(paths::local_path(base, &name)) else { break; };
        let children: Vec<_> = rd.flatten().take(2).collect();
        if children.len() != 1 { break; }
        let child = &children[0];
        let is_dir = std::fs::metadata(child.path()).map(|m| m.is_dir()).unwrap_or(false);
        if !is_dir { break; }
        name = format!("{}/{}", name, child.file_name().to_string_lossy());
    }
    name
}
