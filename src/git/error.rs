use thiserror::Error;

/// Errors from git subprocess calls
#[derive(Debug, Error)]
pub enum GitError {
    /// The git executable could not be started
    #[error("git command not found")]
    NotFound,

    /// git ran and exited non-zero
    #[error("git {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// A pre-commit or commit-msg hook refused the commit
    #[error("commit rejected by hook: {0}")]
    HookRejected(String),

    /// The index has unresolved merge conflicts
    #[error("unresolved merge conflicts in: {}", .0.join(", "))]
    MergeConflict(Vec<String>),

    /// A path that cannot be passed to git safely
    #[error("invalid path for git: {0}")]
    InvalidPath(String),

    /// Spawning or waiting on the process failed
    #[error("failed to run git: {0}")]
    Io(#[source] std::io::Error),
}

impl GitError {
    /// Whether the failure means git itself is unusable, as opposed to one
    /// command failing.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, GitError::NotFound)
    }
}

impl From<std::io::Error> for GitError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            GitError::NotFound
        } else {
            GitError::Io(err)
        }
    }
}
