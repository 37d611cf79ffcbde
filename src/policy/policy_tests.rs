use super::*;
use std::fs;
use std::path::Path;

fn write(dir: &Path, rel: &str, body: &str) {
    let p = dir.join(rel);
    if let Some(parent) = p.parent() { fs::create_dir_all(parent).unwrap(); }
    fs::write(p, body).unwrap();
}

fn resolver(root: &Path) -> PolicyResolver {
    PolicyResolver::new(root, AccessPolicy::with_defaults(false, false, false))
}

#[test]
fn fragment_is_inherited_by_descendants_only() {
    let tmp = tempfile::tempdir().unwrap();
    fs::create_dir_all(tmp.path().join("a/b/c")).unwrap();
    fs::create_dir_all(tmp.path().join("x")).unwrap();
    write(tmp.path(), "a/.ghs.json", r#"{"upload": true}"#);

    let r = resolver(tmp.path());
    assert!(r.resolve("/a/b/c").upload);
    assert!(r.resolve("a").upload);
    assert!(!r.resolve("/x").upload);
    assert!(!r.resolve("/").upload);
}

#[test]
fn partial_fragment_keeps_parent_values() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "p/.ghs.json", r#"{"upload": true, "mkdir": true}"#);
    write(tmp.path(), "p/q/.ghs.json", r#"{"delete": true}"#);

    let eff = resolver(tmp.path()).resolve("p/q");
    assert!(eff.upload);
    assert!(eff.delete);
    assert!(eff.mkdir);
}

#[test]
fn closer_fragment_wins() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "p/.ghs.json", r#"{"upload": true}"#);
    write(tmp.path(), "p/q/.ghs.json", r#"{"upload": false}"#);
    let r = resolver(tmp.path());
    assert!(r.resolve("p").upload);
    assert!(!r.resolve("p/q").upload);
}

#[test]
fn root_fragment_overlays_defaults() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), ".ghs.json", r#"{"mkdir": true}"#);
    let r = resolver(tmp.path());
    assert!(r.resolve("").mkdir);
    assert!(r.resolve("deep/er").mkdir);
}

#[test]
fn file_path_uses_containing_directory() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "docs/.ghs.json", r#"{"delete": true}"#);
    write(tmp.path(), "docs/readme.md", "hello");
    let r = resolver(tmp.path());
    assert!(r.resolve("docs/readme.md").delete);
}

#[test]
fn malformed_fragment_falls_back_to_parent() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "a/.ghs.json", r#"{"upload": true}"#);
    write(tmp.path(), "a/broken/.ghs.json", "{ upload: yes ");
    let r = resolver(tmp.path());
    assert_eq!(r.resolve("a/broken"), r.resolve("a"));
    assert!(r.resolve("a/broken/child").upload);
}

#[test]
fn wrong_typed_fragment_falls_back_to_parent() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "a/.ghs.json", r#"{"upload": "sometimes"}"#);
    let r = resolver(tmp.path());
    assert_eq!(r.resolve("a"), r.resolve(""));
}

#[test]
fn lists_replace_wholesale_down_the_tree() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "a/.ghs.json", r#"{"users": [{"email": "a@x.com", "upload": true}], "accessTables": [{"regex": "^\\.", "allow": false}]}"#);
    write(tmp.path(), "a/b/.ghs.json", r#"{"users": [{"email": "b@x.com", "delete": true}]}"#);
    let eff = resolver(tmp.path()).resolve("a/b");
    assert_eq!(eff.users.len(), 1);
    assert_eq!(eff.users[0].email, "b@x.com");
    // untouched list is still inherited
    assert_eq!(eff.access_tables.len(), 1);
    assert!(!eff.is_visible(".env"));
    assert!(!eff.can_upload(Some("a@x.com")));
    assert!(eff.can_delete(Some("b@x.com")));
}

#[test]
fn fragments_below_the_request_are_ignored() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "a/b/.ghs.json", r#"{"upload": true}"#);
    let r = resolver(tmp.path());
    assert!(!r.resolve("a").upload);
}

#[test]
fn escaping_path_resolves_to_root_policy() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), ".ghs.json", r#"{"upload": true}"#);
    let r = resolver(tmp.path());
    assert!(r.resolve("../../etc").upload);
}

#[test]
fn edits_are_seen_on_next_resolve() {
    let tmp = tempfile::tempdir().unwrap();
    fs::create_dir_all(tmp.path().join("live")).unwrap();
    let r = resolver(tmp.path());
    assert!(!r.resolve("live").upload);
    write_fragment(&tmp.path().join("live"), &PolicyFragment { upload: Some(true), ..Default::default() }).unwrap();
    assert!(r.resolve("live").upload);
    assert_eq!(load_fragment(&tmp.path().join("live")).unwrap().unwrap().upload, Some(true));
}

#[test]
fn file_in_the_middle_of_a_path_inherits() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), ".ghs.json", r#"{"upload": true}"#);
    write(tmp.path(), "docs/.ghs.json", r#"{"delete": true}"#);
    write(tmp.path(), "docs/f.txt", "not a directory");
    let r = resolver(tmp.path());
    let eff = r.resolve("docs/f.txt/x");
    assert_eq!(eff, r.resolve("docs"));
    assert!(eff.upload);
    assert!(eff.delete);
}
