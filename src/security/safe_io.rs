//! Safe file I/O operations
//!
//! Reads refuse symlinks and oversized files; writes go through a temp file
//! in the target's directory and an atomic rename, so a crash leaves either
//! the old content or the new content, never a mix.

use std::fs::{self, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during safe file I/O operations
#[derive(Debug, Error)]
pub enum SafeIoError {
    #[error("Failed to get metadata for {path}: {source}")]
    MetadataFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Symlink rejected: {0}")]
    SymlinkRejected(PathBuf),

    #[error("Not a regular file: {0}")]
    NotAFile(PathBuf),

    #[error("File too large: {path} ({size} bytes, limit {limit})")]
    TooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("Failed to open file {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Inode mismatch detected (file replaced while opening): {path}")]
    InodeMismatch { path: PathBuf },

    #[error("Failed to read file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Hook run after the temp file is durable and before it is renamed over
/// the target. Returning an error aborts the write.
pub type PersistHook = dyn Fn(&Path) -> io::Result<()> + Send + Sync;

/// Safe file reader that prevents symlink attacks and unbounded reads
pub struct SafeFileReader;

impl SafeFileReader {
    /// Read a UTF-8 file of at most `limit` bytes without following symlinks.
    pub fn read_to_string(path: &Path, limit: u64) -> Result<String, SafeIoError> {
        let metadata = fs::symlink_metadata(path).map_err(|e| SafeIoError::MetadataFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        if metadata.file_type().is_symlink() {
            return Err(SafeIoError::SymlinkRejected(path.to_path_buf()));
        }
        if !metadata.is_file() {
            return Err(SafeIoError::NotAFile(path.to_path_buf()));
        }
        if metadata.len() > limit {
            return Err(SafeIoError::TooLarge {
                path: path.to_path_buf(),
                size: metadata.len(),
                limit,
            });
        }

        let mut opts = OpenOptions::new();
        opts.read(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.custom_flags(libc::O_NOFOLLOW);
        }

        let file = opts.open(path).map_err(|e| SafeIoError::OpenFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            let opened = file.metadata().map_err(|e| SafeIoError::MetadataFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
            if opened.ino() != metadata.ino() || opened.dev() != metadata.dev() {
                return Err(SafeIoError::InodeMismatch {
                    path: path.to_path_buf(),
                });
            }
        }

        // The file may have grown since the metadata check.
        let mut content = String::new();
        let read = file
            .take(limit + 1)
            .read_to_string(&mut content)
            .map_err(|e| SafeIoError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
        if read as u64 > limit {
            return Err(SafeIoError::TooLarge {
                path: path.to_path_buf(),
                size: read as u64,
                limit,
            });
        }

        Ok(content)
    }
}

/// Replace `path` with `contents` atomically.
///
/// The temp file lives in the same directory so the rename never crosses a
/// filesystem. Existing permissions are carried over. On any error the temp
/// file is removed and `path` is untouched.
pub fn write_atomic(path: &Path, contents: &[u8], hook: Option<&PersistHook>) -> io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent directory"))?;

    let permissions = fs::metadata(path).ok().map(|m| m.permissions());

    let mut tmp = tempfile::Builder::new()
        .prefix(".doc-guardian-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    if let Some(permissions) = permissions {
        tmp.as_file().set_permissions(permissions)?;
    }
    tmp.as_file().sync_all()?;

    if let Some(hook) = hook {
        hook(tmp.path())?;
    }

    tmp.persist(path).map_err(|e| e.error)?;
    sync_dir(dir)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

/// Strip absolute locations from an error message before it is reported.
///
/// The project root becomes `<project>` and the home directory `<home>`.
pub fn sanitize_error_message(message: &str, project_root: &Path) -> String {
    let mut sanitized = message.to_string();
    let root = project_root.display().to_string();
    if root.len() > 1 {
        sanitized = sanitized.replace(&root, "<project>");
    }
    if let Some(home) = dirs::home_dir() {
        let home = home.display().to_string();
        if home.len() > 1 {
            sanitized = sanitized.replace(&home, "<home>");
        }
    }
    sanitized
}
