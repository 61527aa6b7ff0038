//! Symlink and TOCTOU tests for reads and writes.

use doc_guardian::security::{PathGuard, PathSecurityError, SafeFileReader, SafeIoError};
use doc_guardian::{BackupStore, Change, ChangeApplier, Config, RunContext, ShutdownFlag};
use std::fs;
use tempfile::TempDir;

#[cfg(unix)]
use std::os::unix::fs::symlink;

const LIMIT: u64 = 1024 * 1024;

#[cfg(unix)]
#[test]
fn test_reader_rejects_symlink_file() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("target.md");
    let link = dir.path().join("link.md");
    fs::write(&target, "content").unwrap();
    symlink(&target, &link).unwrap();

    let err = SafeFileReader::read_to_string(&link, LIMIT).unwrap_err();
    assert!(matches!(err, SafeIoError::SymlinkRejected(_)));
    assert_eq!(SafeFileReader::read_to_string(&target, LIMIT).unwrap(), "content");
}

#[test]
fn test_reader_rejects_directory_and_oversized_file() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        SafeFileReader::read_to_string(dir.path(), LIMIT).unwrap_err(),
        SafeIoError::NotAFile(_)
    ));

    let big = dir.path().join("big.md");
    fs::write(&big, "x".repeat(2048)).unwrap();
    assert!(matches!(
        SafeFileReader::read_to_string(&big, 1024).unwrap_err(),
        SafeIoError::TooLarge { size: 2048, limit: 1024, .. }
    ));
}

#[cfg(unix)]
#[test]
fn test_guard_rejects_symlink_escaping_root() {
    let dir = TempDir::new().unwrap();
    let docs = dir.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(dir.path().join("outside.md"), "outside").unwrap();
    symlink(dir.path().join("outside.md"), docs.join("escape.md")).unwrap();
    symlink(dir.path(), docs.join("up")).unwrap();

    let guard = PathGuard::new(&docs).unwrap();
    assert!(matches!(
        guard.contain("escape.md", false).unwrap_err(),
        PathSecurityError::OutsideRoot { .. }
    ));
    assert!(matches!(
        guard.contain("up/new.md", true).unwrap_err(),
        PathSecurityError::OutsideRoot { .. }
    ));
}

#[cfg(unix)]
#[test]
fn test_guard_allows_symlink_inside_root() {
    let dir = TempDir::new().unwrap();
    let docs = dir.path().join("docs");
    fs::create_dir_all(docs.join("real")).unwrap();
    fs::write(docs.join("real/page.md"), "page").unwrap();
    symlink(docs.join("real"), docs.join("alias")).unwrap();

    let guard = PathGuard::new(&docs).unwrap();
    let validated = guard.contain("alias/page.md", false).unwrap();
    assert_eq!(validated.as_path(), guard.root().join("real/page.md"));
}

#[cfg(unix)]
#[test]
fn test_applier_never_writes_through_escaping_symlink() {
    let dir = TempDir::new().unwrap();
    let docs = dir.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(dir.path().join("outside.md"), "teh outside\n").unwrap();
    symlink(dir.path().join("outside.md"), docs.join("escape.md")).unwrap();

    let applier = ChangeApplier::new(
        PathGuard::new(&docs).unwrap(),
        BackupStore::new(dir.path().join(".backups")),
    );
    let change = Change::builder("fix_typos", docs.join("escape.md"))
        .line(1)
        .replace("teh", "the")
        .confidence(0.99)
        .build()
        .unwrap();

    assert!(applier.apply(&change).is_err());
    assert_eq!(fs::read_to_string(dir.path().join("outside.md")).unwrap(), "teh outside\n");
}

#[cfg(unix)]
#[test]
fn test_symlinked_documents_are_not_scanned() {
    let dir = TempDir::new().unwrap();
    let docs = dir.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("real.md"), "teh real\n").unwrap();
    fs::write(dir.path().join("outside.md"), "teh outside\n").unwrap();
    symlink(dir.path().join("outside.md"), docs.join("linked.md")).unwrap();

    let ctx = RunContext::from_config(&Config::default(), dir.path(), ShutdownFlag::new()).unwrap();
    let files = ctx.documents(&["md"]);

    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with("real.md"));
}
