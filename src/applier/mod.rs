//! Safe application of proposed changes.
//!
//! Every write re-reads the target, checks that the content the change was
//! computed from is still there, snapshots the file on its first mutation,
//! and replaces it atomically.

mod backup;

pub use backup::{BackupEntry, BackupStore, target_of};

use crate::error::{GuardianError, IoOperation, Result};
use crate::git::GitAdapter;
use crate::report::{Change, ChangeKind};
use crate::security::{PathGuard, PersistHook, SafeFileReader, ValidatedPath, write_atomic};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// A change that has been written.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedChange {
    pub path: PathBuf,
    pub backup: PathBuf,
    pub before_hash: String,
    pub after_hash: String,
}

/// Where a rollback restored content from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RollbackSource {
    Git,
    Backup,
}

/// A validated edit, ready to write.
struct PreparedEdit {
    path: ValidatedPath,
    original: String,
    updated: String,
}

pub struct ChangeApplier {
    guard: PathGuard,
    max_file_size: u64,
    backups: BackupStore,
    git: Option<GitAdapter>,
    persist_hook: Option<Arc<PersistHook>>,
}

impl ChangeApplier {
    pub fn new(guard: PathGuard, backups: BackupStore) -> Self {
        Self {
            guard,
            max_file_size: crate::config::Limits::default().max_file_size,
            backups,
            git: None,
            persist_hook: None,
        }
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Prefer git for rolling back tracked files.
    pub fn with_git(mut self, git: Option<GitAdapter>) -> Self {
        self.git = git;
        self
    }

    /// Run `hook` between the temp-file sync and the rename of every write.
    pub fn with_persist_hook(mut self, hook: Arc<PersistHook>) -> Self {
        self.persist_hook = Some(hook);
        self
    }

    pub fn guard(&self) -> &PathGuard {
        &self.guard
    }

    pub fn backups(&self) -> &BackupStore {
        &self.backups
    }

    /// Check that `change` can still be applied to the file as it is now.
    ///
    /// Stale content yields `GuardianError::ContentStale`.
    pub fn validate(&self, change: &Change) -> Result<()> {
        self.prepare(change).map(|_| ())
    }

    pub fn is_valid(&self, change: &Change) -> bool {
        match self.validate(change) {
            Ok(()) => true,
            Err(e) => {
                debug!(file = %change.file().display(), error = %e, "change rejected");
                false
            }
        }
    }

    pub fn apply(&self, change: &Change) -> Result<AppliedChange> {
        let edit = self.prepare(change)?;
        let backup = self.backups.ensure(&edit.path, &edit.original)?;

        write_atomic(
            edit.path.as_path(),
            edit.updated.as_bytes(),
            self.persist_hook.as_deref(),
        )
        .map_err(|e| GuardianError::io(edit.path.as_path(), IoOperation::Write, e))?;

        debug!(
            file = %edit.path.as_path().display(),
            line = change.line(),
            detector = change.detector(),
            "change applied"
        );

        Ok(AppliedChange {
            path: edit.path.into_path_buf(),
            backup,
            before_hash: content_hash(edit.original.as_bytes()),
            after_hash: content_hash(edit.updated.as_bytes()),
        })
    }

    /// Undo every change this run made to the change's file.
    ///
    /// The file goes back to the snapshot taken before its first write. A
    /// tracked file is checked out from HEAD only when HEAD holds exactly
    /// that snapshot and the checkout reproduces it; otherwise the backup is
    /// written back.
    pub fn rollback(&self, change: &Change) -> Result<RollbackSource> {
        let path = self.guard.contain(change.file(), true)?;
        let Some(snapshot) = self.backups.snapshot(&path, self.max_file_size)? else {
            return Err(GuardianError::NothingToRestore(path.into_path_buf()));
        };
        let expected = content_hash(snapshot.as_bytes());

        if let Some(git) = &self.git
            && self.restore_from_git(git, &path, &expected)
        {
            return Ok(RollbackSource::Git);
        }

        if self.backups.restore(&path, self.max_file_size)? {
            Ok(RollbackSource::Backup)
        } else {
            Err(GuardianError::NothingToRestore(path.into_path_buf()))
        }
    }

    fn restore_from_git(&self, git: &GitAdapter, path: &ValidatedPath, expected: &str) -> bool {
        let file = path.as_path();
        match git.head_content(file) {
            Ok(Some(head)) if content_hash(&head) == expected => {}
            Ok(_) => {
                debug!(file = %file.display(), "HEAD differs from pre-apply content");
                return false;
            }
            Err(e) => {
                debug!(error = %e, "git unavailable for rollback");
                return false;
            }
        }

        if let Err(e) = git.rollback_file(file) {
            warn!(file = %file.display(), error = %e, "git rollback failed, using backup");
            return false;
        }
        match SafeFileReader::read_to_string(file, self.max_file_size) {
            Ok(restored) if content_hash(restored.as_bytes()) == expected => true,
            _ => {
                warn!(file = %file.display(), "checkout did not reproduce pre-apply content, using backup");
                false
            }
        }
    }

    fn prepare(&self, change: &Change) -> Result<PreparedEdit> {
        let path = self.guard.contain(change.file(), false)?;
        let original = SafeFileReader::read_to_string(path.as_path(), self.max_file_size)?;

        let updated = splice(&original, change).ok_or_else(|| GuardianError::ContentStale {
            path: change.file().to_path_buf(),
            line: change.line(),
        })?;

        Ok(PreparedEdit {
            path,
            original,
            updated,
        })
    }
}

/// Apply `change` to `content`, or `None` if its old content is gone.
fn splice(content: &str, change: &Change) -> Option<String> {
    let old = change.old_content();
    let new = change.new_content();

    if change.kind() == ChangeKind::FullFile {
        return (old.is_empty() || old == content).then(|| new.to_string());
    }

    let pos = if change.line() == 0 {
        content.find(old)?
    } else {
        let (line_start, line_end) = line_bounds(content, change.line())?;
        let found = line_start + content[line_start..].find(old)?;
        if found > line_end {
            return None;
        }
        found
    };

    let mut updated = String::with_capacity(content.len() - old.len() + new.len());
    updated.push_str(&content[..pos]);
    updated.push_str(new);
    updated.push_str(&content[pos + old.len()..]);
    Some(updated)
}

/// Byte range of the 1-based `line`, excluding the newline.
fn line_bounds(content: &str, line: usize) -> Option<(usize, usize)> {
    let mut start = 0;
    for _ in 1..line {
        start += content[start..].find('\n')? + 1;
    }
    if start > content.len() || (start == content.len() && line > 1) {
        return None;
    }
    let end = content[start..]
        .find('\n')
        .map_or(content.len(), |i| start + i);
    Some((start, end))
}

/// Hex SHA-256 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::doc_tree;
    use crate::test_utils::fixtures::replace_change;
    use std::fs;
    use std::io;
    use std::path::Path;
    use tempfile::TempDir;

    fn applier(dir: &TempDir) -> ChangeApplier {
        let guard = PathGuard::new(dir.path().join("docs")).unwrap();
        ChangeApplier::new(guard, BackupStore::new(dir.path().join(".doc-guardian/backups")))
    }

    #[test]
    fn test_apply_replaces_single_occurrence_on_line() {
        let dir = doc_tree(&[("docs/a.md", "teh start\nsee teh end\nteh tail\n")]);
        let applier = applier(&dir);
        let file = dir.path().join("docs/a.md");

        let applied = applier
            .apply(&replace_change(&file, 2, "teh", "the", 0.95))
            .unwrap();

        assert_eq!(
            fs::read_to_string(&file).unwrap(),
            "teh start\nsee the end\nteh tail\n"
        );
        assert_ne!(applied.before_hash, applied.after_hash);
        assert!(applied.backup.exists());
    }

    #[test]
    fn test_line_zero_matches_anywhere() {
        let dir = doc_tree(&[("docs/a.md", "one\ntwo\n")]);
        let applier = applier(&dir);
        let file = dir.path().join("docs/a.md");

        applier
            .apply(&replace_change(&file, 0, "two", "2", 0.95))
            .unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "one\n2\n");
    }

    #[test]
    fn test_stale_content_is_typed() {
        let dir = doc_tree(&[("docs/a.md", "alpha\nbeta\n")]);
        let applier = applier(&dir);
        let file = dir.path().join("docs/a.md");

        let err = applier
            .apply(&replace_change(&file, 1, "beta", "gamma", 0.95))
            .unwrap_err();
        assert!(err.is_stale());
        assert!(!applier.is_valid(&replace_change(&file, 1, "missing", "x", 0.95)));
        assert_eq!(fs::read_to_string(&file).unwrap(), "alpha\nbeta\n");
    }

    #[test]
    fn test_line_past_end_is_stale() {
        let dir = doc_tree(&[("docs/a.md", "only\n")]);
        let applier = applier(&dir);
        let file = dir.path().join("docs/a.md");
        let err = applier
            .validate(&replace_change(&file, 9, "only", "x", 0.95))
            .unwrap_err();
        assert!(err.is_stale());
    }

    #[test]
    fn test_rejects_missing_file_and_escape() {
        let dir = doc_tree(&[("docs/a.md", "a\n"), ("secret.md", "a\n")]);
        let applier = applier(&dir);

        let missing = replace_change(&dir.path().join("docs/none.md"), 1, "a", "b", 0.95);
        assert!(matches!(
            applier.validate(&missing),
            Err(GuardianError::PathSecurity(_))
        ));

        let outside = replace_change(&dir.path().join("secret.md"), 1, "a", "b", 0.95);
        assert!(matches!(
            applier.apply(&outside),
            Err(GuardianError::PathSecurity(_))
        ));
        assert_eq!(fs::read_to_string(dir.path().join("secret.md")).unwrap(), "a\n");
    }

    #[test]
    fn test_rejects_oversized_file() {
        let dir = doc_tree(&[("docs/a.md", "x".repeat(64).as_str())]);
        let applier = applier(&dir).with_max_file_size(32);
        let change = replace_change(&dir.path().join("docs/a.md"), 1, "x", "y", 0.95);
        assert!(matches!(
            applier.validate(&change),
            Err(GuardianError::FileTooLarge { size: 64, limit: 32, .. })
        ));
    }

    #[test]
    fn test_failed_persist_leaves_original() {
        let dir = doc_tree(&[("docs/a.md", "keep me\n")]);
        let crash: Arc<PersistHook> = Arc::new(|_: &Path| -> io::Result<()> {
            Err(io::Error::other("power loss"))
        });
        let applier = applier(&dir).with_persist_hook(crash);
        let file = dir.path().join("docs/a.md");

        let err = applier
            .apply(&replace_change(&file, 1, "keep", "lose", 0.95))
            .unwrap_err();

        assert!(matches!(err, GuardianError::Io { operation: IoOperation::Write, .. }));
        assert_eq!(fs::read_to_string(&file).unwrap(), "keep me\n");
        let stray: Vec<_> = fs::read_dir(dir.path().join("docs"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(stray.is_empty());
    }

    #[test]
    fn test_rollback_from_backup_restores_hash() {
        let dir = doc_tree(&[("docs/a.md", "first line\nsecond line\n")]);
        let applier = applier(&dir);
        let file = dir.path().join("docs/a.md");
        let before = content_hash(&fs::read(&file).unwrap());

        let first = replace_change(&file, 1, "first", "1st", 0.95);
        let second = replace_change(&file, 2, "second", "2nd", 0.95);
        applier.apply(&first).unwrap();
        applier.apply(&second).unwrap();
        assert_ne!(content_hash(&fs::read(&file).unwrap()), before);

        assert_eq!(applier.rollback(&second).unwrap(), RollbackSource::Backup);
        assert_eq!(content_hash(&fs::read(&file).unwrap()), before);
    }

    #[test]
    fn test_rollback_without_backup_fails() {
        let dir = doc_tree(&[("docs/a.md", "a\n")]);
        let applier = applier(&dir);
        let change = replace_change(&dir.path().join("docs/a.md"), 1, "a", "b", 0.95);
        assert!(matches!(
            applier.rollback(&change),
            Err(GuardianError::NothingToRestore(_))
        ));
    }

    #[test]
    fn test_rollback_prefers_git_for_tracked_files() {
        let Some(repo) = crate::test_utils::git_repo(&[("docs/a.md", "committed\n")]) else {
            return;
        };
        let root = repo.path().canonicalize().unwrap();
        let applier = git_applier(&root);
        let file = root.join("docs/a.md");

        let change = replace_change(&file, 1, "committed", "edited", 0.95);
        applier.apply(&change).unwrap();
        assert_eq!(applier.rollback(&change).unwrap(), RollbackSource::Git);
        assert_eq!(fs::read_to_string(&file).unwrap(), "committed\n");
    }

    fn git_applier(root: &Path) -> ChangeApplier {
        let guard = PathGuard::new(root.join("docs")).unwrap();
        ChangeApplier::new(guard, BackupStore::new(root.join(".doc-guardian")))
            .with_git(Some(GitAdapter::new(root)))
    }

    #[test]
    fn test_rollback_keeps_uncommitted_edits() {
        let Some(repo) = crate::test_utils::git_repo(&[("docs/a.md", "committed\n")]) else {
            return;
        };
        let root = repo.path().canonicalize().unwrap();
        let applier = git_applier(&root);
        let file = root.join("docs/a.md");
        fs::write(&file, "committed\nuser wip line\n").unwrap();
        let before = content_hash(&fs::read(&file).unwrap());

        let change = replace_change(&file, 1, "committed", "edited", 0.95);
        let applied = applier.apply(&change).unwrap();
        assert_eq!(applied.before_hash, before);

        assert_eq!(applier.rollback(&change).unwrap(), RollbackSource::Backup);
        assert_eq!(fs::read_to_string(&file).unwrap(), "committed\nuser wip line\n");
        assert_eq!(content_hash(&fs::read(&file).unwrap()), before);
    }

    #[test]
    fn test_rollback_after_commit_restores_pre_apply_content() {
        let Some(repo) = crate::test_utils::git_repo(&[("docs/a.md", "committed\n")]) else {
            return;
        };
        let root = repo.path().canonicalize().unwrap();
        let applier = git_applier(&root);
        let git = GitAdapter::new(&root);
        let file = root.join("docs/a.md");

        let change = replace_change(&file, 1, "committed", "edited", 0.95);
        let applied = applier.apply(&change).unwrap();
        git.stage(&[&file]).unwrap();
        git.commit("docs(guardian): fix 1 documentation issue").unwrap();

        assert_eq!(applier.rollback(&change).unwrap(), RollbackSource::Backup);
        assert_eq!(fs::read_to_string(&file).unwrap(), "committed\n");
        assert_eq!(content_hash(&fs::read(&file).unwrap()), applied.before_hash);
    }

    #[test]
    fn test_full_file_change() {
        let dir = doc_tree(&[("docs/a.md", "old body\n")]);
        let applier = applier(&dir);
        let file = dir.path().join("docs/a.md");

        let stale = Change::builder("sync", &file)
            .full_file("something else\n", "new body\n")
            .confidence(0.9)
            .build()
            .unwrap();
        assert!(applier.validate(&stale).unwrap_err().is_stale());

        let change = Change::builder("sync", &file)
            .full_file("old body\n", "new body\n")
            .confidence(0.9)
            .build()
            .unwrap();
        applier.apply(&change).unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "new body\n");
    }

    #[test]
    fn test_line_bounds() {
        let text = "a\nbb\n\nccc";
        assert_eq!(line_bounds(text, 1), Some((0, 1)));
        assert_eq!(line_bounds(text, 2), Some((2, 4)));
        assert_eq!(line_bounds(text, 3), Some((5, 5)));
        assert_eq!(line_bounds(text, 4), Some((6, 9)));
        assert_eq!(line_bounds(text, 5), None);
        assert_eq!(line_bounds("a\n", 2), None);
    }

    #[test]
    fn test_content_hash_is_sha256_hex() {
        assert_eq!(
            content_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
