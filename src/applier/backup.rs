//! Pre-mutation snapshots.
//!
//! The first time a file is touched in a run its content is written to
//! `<backup_dir>/<relative path>.<run stamp>.bak`. Backups are never
//! removed automatically.

use crate::error::{GuardianError, IoOperation, Result};
use crate::security::{SafeFileReader, ValidatedPath, write_atomic};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use walkdir::WalkDir;

const STAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.3fZ";

/// A backup file found on disk, from this run or an earlier one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupEntry {
    /// The `.bak` file, relative to the backup directory.
    pub backup: PathBuf,
    /// The document it snapshots, relative to the doc root.
    pub target: PathBuf,
    pub stamp: String,
}

#[derive(Debug)]
pub struct BackupStore {
    dir: PathBuf,
    stamp: String,
    taken: Mutex<HashMap<PathBuf, PathBuf>>,
}

impl BackupStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            stamp: chrono::Utc::now().format(STAMP_FORMAT).to_string(),
            taken: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot `content` for `path` unless this run already did.
    pub fn ensure(&self, path: &ValidatedPath, content: &str) -> Result<PathBuf> {
        let mut taken = self.lock();
        if let Some(existing) = taken.get(path.as_path()) {
            return Ok(existing.clone());
        }

        let backup = self.backup_path(path);
        if let Some(parent) = backup.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| GuardianError::io(parent, IoOperation::CreateDirectory, e))?;
        }
        write_atomic(&backup, content.as_bytes(), None)
            .map_err(|e| GuardianError::io(&backup, IoOperation::Backup, e))?;

        debug!(file = %path.as_path().display(), backup = %backup.display(), "backup created");
        taken.insert(path.as_path().to_path_buf(), backup.clone());
        Ok(backup)
    }

    pub fn backup_for(&self, path: &Path) -> Option<PathBuf> {
        self.lock().get(path).cloned()
    }

    /// Content this run snapshotted for `path`, if any.
    pub fn snapshot(&self, path: &ValidatedPath, max_size: u64) -> Result<Option<String>> {
        match self.backup_for(path.as_path()) {
            Some(backup) => Ok(Some(SafeFileReader::read_to_string(&backup, max_size)?)),
            None => Ok(None),
        }
    }

    /// Write the run's snapshot back over `path`. Returns false when this
    /// run never backed the file up.
    pub fn restore(&self, path: &ValidatedPath, max_size: u64) -> Result<bool> {
        let Some(backup) = self.backup_for(path.as_path()) else {
            return Ok(false);
        };
        let content = SafeFileReader::read_to_string(&backup, max_size)?;
        write_atomic(path.as_path(), content.as_bytes(), None)
            .map_err(|e| GuardianError::io(path.as_path(), IoOperation::Restore, e))?;
        debug!(file = %path.as_path().display(), "restored from backup");
        Ok(true)
    }

    /// Every backup under the directory, newest first.
    pub fn entries(&self) -> Vec<BackupEntry> {
        if !self.dir.is_dir() {
            return Vec::new();
        }
        let mut entries: Vec<BackupEntry> = WalkDir::new(&self.dir)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let backup = e.path().strip_prefix(&self.dir).ok()?.to_path_buf();
                let target = target_of(&backup)?;
                let (_, stamp) = split_backup_name(&backup.file_name()?.to_string_lossy())?;
                Some(BackupEntry {
                    backup,
                    target,
                    stamp,
                })
            })
            .collect();
        entries.sort_by(|a, b| b.stamp.cmp(&a.stamp).then_with(|| a.target.cmp(&b.target)));
        entries
    }

    fn backup_path(&self, path: &ValidatedPath) -> PathBuf {
        let relative = path.relative();
        let name = relative
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let target = self.dir.join(relative);
        target.with_file_name(format!("{name}.{}.bak", self.stamp))
    }

    // A panic while holding the lock cannot leave the map half-updated.
    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, PathBuf>> {
        self.taken.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// The document a backup at `relative` (inside the backup directory) was
/// taken from, relative to the doc root.
pub fn target_of(relative: &Path) -> Option<PathBuf> {
    let (name, _) = split_backup_name(&relative.file_name()?.to_string_lossy())?;
    Some(relative.with_file_name(name))
}

/// Split `<name>.<stamp>.bak` into its name and stamp.
fn split_backup_name(file_name: &str) -> Option<(String, String)> {
    let stem = file_name.strip_suffix(".bak")?;
    let mut parts = stem.rsplitn(3, '.');
    let fraction = parts.next()?;
    let seconds = parts.next()?;
    let name = parts.next().filter(|n| !n.is_empty())?;
    let stamp = format!("{seconds}.{fraction}");
    chrono::NaiveDateTime::parse_from_str(stamp.trim_end_matches('Z'), "%Y%m%dT%H%M%S%.3f").ok()?;
    Some((name.to_string(), stamp))
}
