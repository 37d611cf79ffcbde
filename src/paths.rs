use anyhow::{bail, Result};
use path_absolutize::Absolutize;
use std::path::{Component, Path, PathBuf};

/// Normalize the served root to an absolute path without resolving symlinks.
pub fn normalize_root(root: &str) -> Result<PathBuf> {
    let root = if root.trim().is_empty() { "./" } else { root };
    let abs = Path::new(root).absolutize()?.to_path_buf();
    Ok(abs)
}

/// Clean a request path into a root-relative, '/'-separated logical path.
/// - backslashes are treated as separators
/// - empty and '.' segments are dropped, '..' pops the previous segment
/// - a '..' that would climb above the root is rejected
/// The root itself is the empty string.
pub fn clean_request_path(raw: &str) -> Result<String> {
    if raw.contains('\u{0000}') {
        bail!("request path cannot contain NUL characters");
    }
    let unified = raw.replace('\\', "/");
    let mut segs: Vec<&str> = Vec::new();
    for seg in unified.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                if segs.pop().is_none() {
                    bail!("request path escapes the served root");
                }
            }
            s => segs.push(s),
        }
    }
    Ok(segs.join("/"))
}

/// Parent of a logical path; `None` for the root.
pub fn parent_of(rel: &str) -> Option<&str> {
    if rel.is_empty() { return None; }
    Some(rel.rfind('/').map(|i| &rel[..i]).unwrap_or(""))
}

/// Last segment of a logical path.
pub fn base_name(rel: &str) -> &str {
    rel.rsplit('/').next().unwrap_or(rel)
}

/// Join two logical paths, either of which may be the root.
pub fn join_logical(base: &str, name: &str) -> String {
    match (base.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{}/{}", base, name),
    }
}

/// Map a cleaned logical path onto the local filesystem under `root`.
pub fn local_path(root: &Path, rel: &str) -> PathBuf {
    let mut p = root.to_path_buf();
    for seg in rel.split('/').filter(|s| !s.is_empty()) {
        p.push(seg);
    }
    p
}

/// Render a filesystem-relative path with '/' separators on every platform.
pub fn to_slash(rel: &Path) -> String {
    let mut out = String::new();
    for comp in rel.components() {
        if let Component::Normal(s) = comp {
            if !out.is_empty() { out.push('/'); }
            out.push_str(&s.to_string_lossy());
        }
    }
    out
}

/// True when `path` lies under directory `dir` (component-wise). The root contains everything.
pub fn is_under(path: &str, dir: &str) -> bool {
    if dir.is_empty() { return true; }
    path.len() > dir.len() && path.starts_with(dir) && path.as_bytes()[dir.len()] == b'/'
}

pub fn is_file(p: &Path) -> bool {
    std::fs::metadata(p).map(|m| m.is_file()).unwrap_or(false)
}

pub fn is_dir(p: &Path) -> bool {
    std::fs::metadata(p).map(|m| m.is_dir()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_drops_dots_and_slashes() {
        assert_eq!(clean_request_path("/").unwrap(), "");
        assert_eq!(clean_request_path("").unwrap(), "");
        assert_eq!(clean_request_path("/a//b/./c/").unwrap(), "a/b/c");
        assert_eq!(clean_request_path("a/b/../c").unwrap(), "a/c");
        assert_eq!(clean_request_path("a\\b").unwrap(), "a/b");
    }

    #[test]
    fn clean_rejects_escape() {
        assert!(clean_request_path("..").is_err());
        assert!(clean_request_path("a/../../etc").is_err());
        assert!(clean_request_path("a\u{0000}b").is_err());
    }

    #[test]
    fn parent_and_base() {
        assert_eq!(parent_of(""), None);
        assert_eq!(parent_of("a"), Some(""));
        assert_eq!(parent_of("a/b/c"), Some("a/b"));
        assert_eq!(base_name("a/b/c.txt"), "c.txt");
        assert_eq!(base_name("top"), "top");
    }

    #[test]
    fn under_is_component_wise() {
        assert!(is_under("docs/a.txt", "docs"));
        assert!(is_under("docs/x/y", "docs/x"));
        assert!(!is_under("docs2/a.txt", "docs"));
        assert!(!is_under("docs", "docs"));
        assert!(is_under("anything", ""));
    }

    #[test]
    fn to_slash_uses_forward_slashes() {
        let p: PathBuf = ["a", "b", "c.txt"].iter().collect();
        assert_eq!(to_slash(&p), "a/b/c.txt");
        assert_eq!(join_logical("", "x"), "x");
        assert_eq!(join_logical("a", "x"), "a/x");
    }
}
