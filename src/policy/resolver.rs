use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::model::{AccessPolicy, PolicyFragment};
use crate::error::PolicyError;
use crate::paths;

/// Reserved file name of a directory-local policy fragment.
pub const POLICY_FILE_NAME: &str = ".ghs.json";

/// Computes effective policies by folding fragments from the root down to a request path.
///
/// Every call reads the fragments fresh from disk; nothing is cached between requests, so an
/// edited fragment takes effect on the next request.
#[derive(Debug, Clone)]
pub struct PolicyResolver {
    root: PathBuf,
    defaults: AccessPolicy,
}

impl PolicyResolver {
    pub fn new(root: impl Into<PathBuf>, defaults: AccessPolicy) -> Self {
        Self { root: root.into(), defaults }
    }

    /// Effective policy for `request_path` (a root-relative URL path, file or directory).
    /// Never fails: unreadable or malformed fragments are logged and skipped.
    pub fn resolve(&self, request_path: &str) -> AccessPolicy {
        match paths::clean_request_path(request_path) {
            Ok(rel) => self.resolve_clean(&rel),
            Err(e) => {
                warn!(target: "policy", request_path, "unresolvable request path, using root policy: {}", e);
                self.resolve_clean("")
            }
        }
    }

    fn resolve_clean(&self, rel: &str) -> AccessPolicy {
        let inherited = match paths::parent_of(rel) {
            None => self.defaults.clone(),
            Some(parent) => self.resolve_clean(parent),
        };
        let mut dir = paths::local_path(&self.root, rel);
        if paths::is_file(&dir) {
            if let Some(parent) = dir.parent() { dir = parent.to_path_buf(); }
        }
        match load_fragment(&dir) {
            Ok(Some(frag)) => {
                debug!(target: "policy", dir = %dir.display(), "applying policy fragment");
                inherited.overlaid(&frag)
            }
            Ok(None) => inherited,
            Err(e) => {
                warn!(target: "policy", "{}; inheriting parent policy", e);
                inherited
            }
        }
    }
}

/// Read the fragment in `dir`. `Ok(None)` when there is none.
pub fn load_fragment(dir: &Path) -> Result<Option<PolicyFragment>, PolicyError> {
    let path = dir.join(POLICY_FILE_NAME);
    let bytes = match std::fs::read(&path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(PolicyError::Read { path, source }),
    };
    PolicyFragment::parse(&bytes)
        .map(Some)
        .map_err(|source| PolicyError::Parse { path, source })
}

/// Write `frag` as the fragment of `dir`, replacing any existing one.
pub fn write_fragment(dir: &Path, frag: &PolicyFragment) -> std::io::Result<()> {
    let body = serde_json::to_vec_pretty(frag).map_err(std::io::Error::other)?;
    std::fs::write(dir.join(POLICY_FILE_NAME), body)
}
