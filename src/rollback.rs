//! Undoing earlier heal runs.
//!
//! Backups left by any run can be written back by name, and commits made by
//! auto-commit can be reverted newest first. Both work without the run that
//! produced them.

use crate::applier::{BackupEntry, BackupStore, content_hash, target_of};
use crate::config::Config;
use crate::context::RunContext;
use crate::error::{GuardianError, IoOperation, Result};
use crate::git::{CommitSummary, GitAdapter, RevertTarget};
use crate::security::{PathGuard, SafeFileReader, write_atomic};
use crate::shutdown::ShutdownFlag;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A backup that was written back.
#[derive(Debug, Clone, Serialize)]
pub struct RestoredBackup {
    /// Restored document, relative to the doc root.
    pub target: PathBuf,
    /// Snapshot of the content the restore replaced.
    pub previous: Option<PathBuf>,
    pub hash: String,
}

/// Outcome of reverting several commits. Reverting stops at the first
/// failure.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RevertOutcome {
    pub requested: usize,
    pub reverted: Vec<CommitSummary>,
    pub failed: Option<String>,
}

impl RevertOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_none() && !self.reverted.is_empty()
    }
}

/// What `--rollback --show` lists.
#[derive(Debug, Clone, Serialize)]
pub struct RollbackInventory {
    pub backups: Vec<BackupEntry>,
    pub commits: Vec<CommitSummary>,
}

pub struct Rollback {
    ctx: RunContext,
    backups: BackupStore,
    git: Option<GitAdapter>,
    commit_prefix: String,
}

impl Rollback {
    pub fn new(config: &Config, base_dir: &Path) -> Result<Self> {
        let ctx = RunContext::from_config(config, base_dir, ShutdownFlag::new())?;
        let backups = BackupStore::new(ctx.backup_dir());
        let git = config
            .git
            .enabled
            .then(|| GitAdapter::new(ctx.project_root()))
            .filter(GitAdapter::is_available);
        Ok(Self {
            ctx,
            backups,
            git,
            commit_prefix: config.git.commit_prefix.clone(),
        })
    }

    /// Backups on disk and the newest `limit` guardian commits.
    pub fn inventory(&self, limit: usize) -> Result<RollbackInventory> {
        let commits = match &self.git {
            Some(git) => git.commits_with_prefix(&self.commit_prefix, limit)?,
            None => Vec::new(),
        };
        Ok(RollbackInventory {
            backups: self.backups.entries(),
            commits,
        })
    }

    /// Write `backup` over its document.
    ///
    /// A relative `backup` is looked up in the backup directory and a
    /// relative `target` under the doc root. Without `target` the document
    /// is derived from the backup's name. The content being replaced is
    /// snapshotted first, so a restore can itself be undone.
    pub fn restore_backup(&self, backup: &Path, target: Option<&Path>) -> Result<RestoredBackup> {
        let store = PathGuard::new(self.backups.dir())?;
        let backup = store.contain(backup, false)?;
        let target = match target {
            Some(target) => target.to_path_buf(),
            None => target_of(backup.relative())
                .ok_or_else(|| GuardianError::UnrecognizedBackup(backup.relative().to_path_buf()))?,
        };

        let guard = self.ctx.path_guard()?;
        let target = guard.contain(&target, true)?;
        let max_size = self.ctx.limits().max_file_size;
        let content = SafeFileReader::read_to_string(backup.as_path(), max_size)?;

        let previous = if target.as_path().exists() {
            let current = SafeFileReader::read_to_string(target.as_path(), max_size)?;
            Some(self.backups.ensure(&target, &current)?)
        } else {
            if let Some(parent) = target.as_path().parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| GuardianError::io(parent, IoOperation::CreateDirectory, e))?;
            }
            None
        };

        write_atomic(target.as_path(), content.as_bytes(), None)
            .map_err(|e| GuardianError::io(target.as_path(), IoOperation::Restore, e))?;
        info!(
            file = %target.relative().display(),
            backup = %backup.relative().display(),
            "restored backup"
        );

        Ok(RestoredBackup {
            target: target.relative().to_path_buf(),
            previous,
            hash: content_hash(content.as_bytes()),
        })
    }

    /// Revert the newest `count` guardian commits, newest first.
    pub fn revert_last(&self, count: usize) -> Result<RevertOutcome> {
        let git = self.git()?;
        let commits = git.commits_with_prefix(&self.commit_prefix, count)?;
        if commits.len() < count {
            warn!(found = commits.len(), requested = count, "fewer guardian commits than requested");
        }

        let mut outcome = RevertOutcome {
            requested: count,
            ..RevertOutcome::default()
        };
        for commit in commits {
            match git.revert(&RevertTarget::Commit(commit.hash.clone())) {
                Ok(()) => {
                    info!(commit = commit.short_hash(), subject = %commit.subject, "reverted");
                    outcome.reverted.push(commit);
                }
                Err(e) => {
                    warn!(commit = commit.short_hash(), error = %e, "revert failed, stopping");
                    outcome.failed = Some(self.ctx.sanitize(&format!("{}: {e}", commit.short_hash())));
                    break;
                }
            }
        }
        Ok(outcome)
    }

    /// Revert one commit by hash.
    pub fn revert_commit(&self, hash: &str) -> Result<()> {
        self.git()?.revert(&RevertTarget::Commit(hash.to_string()))?;
        info!(commit = hash, "reverted");
        Ok(())
    }

    fn git(&self) -> Result<&GitAdapter> {
        self.git.as_ref().ok_or(GuardianError::VersionControlUnavailable)
    }
}
