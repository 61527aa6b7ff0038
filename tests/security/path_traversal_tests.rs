//! Path traversal tests.
//!
//! Every write goes through `PathGuard::contain`; these cover literal and
//! encoded `..`, absolute escapes, and traversal smuggled in through
//! detector-proposed changes.

use doc_guardian::security::{PathGuard, PathSecurityError, contain, validate_doc_root};
use doc_guardian::{BackupStore, Change, ChangeApplier, GuardianError};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn docs() -> (TempDir, PathGuard) {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("docs/api")).unwrap();
    fs::write(dir.path().join("docs/a.md"), "a\n").unwrap();
    fs::write(dir.path().join("secret.txt"), "secret\n").unwrap();
    let guard = PathGuard::new(dir.path().join("docs")).unwrap();
    (dir, guard)
}

#[test]
fn test_rejects_literal_parent_reference() {
    let (_dir, guard) = docs();
    let err = guard.contain("../secret.txt", true).unwrap_err();
    assert!(matches!(err, PathSecurityError::TraversalAttempt(_)));
}

#[test]
fn test_rejects_deep_traversal_from_absolute_path() {
    let err = contain("/docs/../../../etc/passwd", "/", true).unwrap_err();
    assert!(matches!(err, PathSecurityError::TraversalAttempt(_)));
}

#[test]
fn test_rejects_encoded_traversal() {
    let (_dir, guard) = docs();
    for attempt in ["%2e%2e/secret.txt", "%2E%2E/secret.txt", "%252e%252e/x", "api/..%2fsecret"] {
        let err = guard.contain(attempt, true).unwrap_err();
        assert!(
            matches!(err, PathSecurityError::EncodedTraversal(_)),
            "{attempt} was not rejected as encoded traversal"
        );
    }
}

#[test]
fn test_rejects_absolute_path_outside_root() {
    let (dir, guard) = docs();
    let err = guard.contain(dir.path().join("secret.txt"), false).unwrap_err();
    assert!(matches!(err, PathSecurityError::OutsideRoot { .. }));
}

#[test]
fn test_rejects_null_byte_and_newline() {
    let (_dir, guard) = docs();
    assert!(matches!(
        guard.contain("a.md\0.txt", true).unwrap_err(),
        PathSecurityError::NullByteInPath(_)
    ));
    assert!(matches!(
        guard.contain("a\n.md", true).unwrap_err(),
        PathSecurityError::ControlCharacter(_)
    ));
}

#[test]
fn test_rejects_overlong_path() {
    let (_dir, guard) = docs();
    let guard = guard.with_max_path_length(32);
    let err = guard.contain("a".repeat(40), true).unwrap_err();
    assert!(matches!(err, PathSecurityError::TooLong { length: 40, limit: 32 }));
}

#[test]
fn test_accepts_paths_inside_root() {
    let (dir, guard) = docs();
    let root = guard.root().to_path_buf();

    let existing = guard.contain("a.md", false).unwrap();
    assert_eq!(existing.as_path(), root.join("a.md"));
    assert_eq!(existing.relative(), Path::new("a.md"));

    let planned = guard.contain("api/new.md", true).unwrap();
    assert_eq!(planned.as_path(), root.join("api/new.md"));

    let same = contain(dir.path().join("docs/a.md"), dir.path().join("docs"), false).unwrap();
    assert_eq!(same.as_path(), root.join("a.md"));
}

#[test]
fn test_missing_file_requires_allow_nonexistent() {
    let (_dir, guard) = docs();
    assert!(matches!(
        guard.contain("missing.md", false).unwrap_err(),
        PathSecurityError::NotFound(_)
    ));
}

#[test]
fn test_doc_root_must_stay_inside_project() {
    let outer = TempDir::new().unwrap();
    fs::create_dir_all(outer.path().join("project")).unwrap();
    fs::create_dir_all(outer.path().join("elsewhere")).unwrap();

    assert!(validate_doc_root(Path::new("../elsewhere"), &outer.path().join("project")).is_err());
    assert!(validate_doc_root(&outer.path().join("elsewhere"), &outer.path().join("project")).is_err());
}

#[test]
fn test_applier_refuses_change_outside_docs() {
    let (dir, guard) = docs();
    let applier = ChangeApplier::new(guard, BackupStore::new(dir.path().join(".backups")));
    let change = Change::builder("fix_typos", dir.path().join("secret.txt"))
        .line(1)
        .replace("secret", "leaked")
        .confidence(0.99)
        .build()
        .unwrap();

    let err = applier.apply(&change).unwrap_err();
    assert!(matches!(err, GuardianError::PathSecurity(_)));
    assert_eq!(fs::read_to_string(dir.path().join("secret.txt")).unwrap(), "secret\n");
}
