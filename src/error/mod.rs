//! Error types for doc-guardian.
//!
//! `GuardianError` is the unified error returned by every pipeline stage.
//! Layer-specific enums (`ConfigError`, `PathSecurityError`, `GitError`)
//! convert into it with `?`.

mod context;

pub use context::IoOperation;

use crate::config::ConfigError;
use crate::git::GitError;
use crate::security::{PathSecurityError, SafeIoError};
use std::path::PathBuf;
use thiserror::Error;

/// Unified error type.
#[derive(Error, Debug)]
pub enum GuardianError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Path rejected: {0}")]
    PathSecurity(#[from] PathSecurityError),

    #[error("Unsafe regex pattern rejected ({reason}): {pattern}")]
    RegexSecurity { pattern: String, reason: String },

    #[error("Invalid regex pattern {pattern}: {message}")]
    RegexConfig { pattern: String, message: String },

    #[error("Content changed since scan: {path}:{line}")]
    ContentStale { path: PathBuf, line: usize },

    #[error("File too large: {path} ({size} bytes, limit {limit})")]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("{field} must be within [0.0, 1.0], got {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("Invalid change: {0}")]
    InvalidChange(String),

    #[error("git is not available")]
    VersionControlUnavailable,

    #[error("git error: {0}")]
    Git(GitError),

    #[error("No backup or tracked revision to restore {0}")]
    NothingToRestore(PathBuf),

    #[error("Not a doc-guardian backup name, target must be given: {0}")]
    UnrecognizedBackup(PathBuf),

    #[error("Unsafe read: {0}")]
    SafeIo(SafeIoError),

    #[error("Failed to {operation} {path}: {source}")]
    Io {
        path: PathBuf,
        operation: IoOperation,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Detector {name} failed: {message}")]
    Detector { name: String, message: String },
}

impl GuardianError {
    pub fn io(path: impl Into<PathBuf>, operation: IoOperation, source: std::io::Error) -> Self {
        GuardianError::Io {
            path: path.into(),
            operation,
            source,
        }
    }

    /// The file no longer contains the content a change was computed from.
    pub fn is_stale(&self) -> bool {
        matches!(self, GuardianError::ContentStale { .. })
    }

    /// Configuration and security failures stop a run; everything else is
    /// recorded against the change that caused it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GuardianError::Config(_)
                | GuardianError::RegexSecurity { .. }
                | GuardianError::RegexConfig { .. }
        )
    }
}

impl From<GitError> for GuardianError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::NotFound => GuardianError::VersionControlUnavailable,
            other => GuardianError::Git(other),
        }
    }
}

impl From<SafeIoError> for GuardianError {
    fn from(err: SafeIoError) -> Self {
        match err {
            SafeIoError::TooLarge { path, size, limit } => {
                GuardianError::FileTooLarge { path, size, limit }
            }
            SafeIoError::ReadFailed { path, source } | SafeIoError::OpenFailed { path, source } => {
                GuardianError::io(path, IoOperation::Read, source)
            }
            SafeIoError::MetadataFailed { path, source } => {
                GuardianError::io(path, IoOperation::Metadata, source)
            }
            other => GuardianError::SafeIo(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, GuardianError>;
