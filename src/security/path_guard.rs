//! Path containment.
//!
//! Every path the engine writes to passes through [`PathGuard::contain`],
//! which rejects traversal syntax up front and then checks the
//! symlink-resolved location against the canonical root.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_MAX_PATH_LENGTH: usize = 4096;

/// Errors that can occur during path security validation
#[derive(Debug, Error)]
pub enum PathSecurityError {
    #[error("Path traversal attempt detected: {0}")]
    TraversalAttempt(PathBuf),

    #[error("Encoded path traversal detected: {0}")]
    EncodedTraversal(PathBuf),

    #[error("Path contains null byte")]
    NullByteInPath(PathBuf),

    #[error("Path contains control characters: {0}")]
    ControlCharacter(PathBuf),

    #[error("Path too long ({length} > {limit})")]
    TooLong { length: usize, limit: usize },

    #[error("Path {path} escapes root {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("Path does not exist: {0}")]
    NotFound(PathBuf),

    #[error("Failed to canonicalize path: {path}")]
    CanonicalizeFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid root {path}: {reason}")]
    InvalidRoot { path: PathBuf, reason: String },
}

/// A path proven to lie inside its root after symlink resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidatedPath {
    resolved: PathBuf,
    root: PathBuf,
}

impl ValidatedPath {
    pub fn as_path(&self) -> &Path {
        &self.resolved
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The path relative to its root.
    pub fn relative(&self) -> &Path {
        self.resolved
            .strip_prefix(&self.root)
            .unwrap_or(&self.resolved)
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.resolved
    }
}

impl AsRef<Path> for ValidatedPath {
    fn as_ref(&self) -> &Path {
        &self.resolved
    }
}

/// Containment checker bound to one canonical root.
#[derive(Debug, Clone)]
pub struct PathGuard {
    root: PathBuf,
    max_path_length: usize,
}

impl PathGuard {
    /// Canonicalize `root`; it must be an existing directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, PathSecurityError> {
        let root = root.as_ref();
        let canonical = root
            .canonicalize()
            .map_err(|e| PathSecurityError::CanonicalizeFailed {
                path: root.to_path_buf(),
                source: e,
            })?;
        if !canonical.is_dir() {
            return Err(PathSecurityError::InvalidRoot {
                path: root.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }
        Ok(Self {
            root: canonical,
            max_path_length: DEFAULT_MAX_PATH_LENGTH,
        })
    }

    pub fn with_max_path_length(mut self, limit: usize) -> Self {
        self.max_path_length = limit;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` (absolute, or relative to the root) and prove it is a
    /// descendant of the root.
    ///
    /// With `allow_nonexistent`, the deepest existing ancestor is resolved
    /// and the remaining components appended, so a file about to be created
    /// is still checked against symlinked parents.
    pub fn contain(
        &self,
        path: impl AsRef<Path>,
        allow_nonexistent: bool,
    ) -> Result<ValidatedPath, PathSecurityError> {
        let path = path.as_ref();
        check_lexical(path, self.max_path_length)?;

        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };

        let resolved = if joined.symlink_metadata().is_ok() {
            canonicalize(&joined)?
        } else if allow_nonexistent {
            resolve_nonexistent(&joined)?
        } else {
            return Err(PathSecurityError::NotFound(path.to_path_buf()));
        };

        if !resolved.starts_with(&self.root) {
            return Err(PathSecurityError::OutsideRoot {
                path: path.to_path_buf(),
                root: self.root.clone(),
            });
        }

        Ok(ValidatedPath {
            resolved,
            root: self.root.clone(),
        })
    }
}

/// One-shot containment check against `root`.
pub fn contain(
    path: impl AsRef<Path>,
    root: impl AsRef<Path>,
    allow_nonexistent: bool,
) -> Result<ValidatedPath, PathSecurityError> {
    check_lexical(path.as_ref(), DEFAULT_MAX_PATH_LENGTH)?;
    PathGuard::new(root)?.contain(path, allow_nonexistent)
}

/// Canonicalize a project root, which must be an existing directory.
pub fn validate_project_root(path: &Path) -> Result<PathBuf, PathSecurityError> {
    check_lexical(path, DEFAULT_MAX_PATH_LENGTH).or_else(|e| match e {
        // `..` is acceptable in a root the operator chose explicitly.
        PathSecurityError::TraversalAttempt(_) => Ok(()),
        other => Err(other),
    })?;
    Ok(PathGuard::new(path)?.root)
}

/// Canonicalize a documentation root and require it inside `project_root`.
pub fn validate_doc_root(doc_root: &Path, project_root: &Path) -> Result<PathBuf, PathSecurityError> {
    let project = PathGuard::new(project_root)?;
    let resolved = project.contain(doc_root, false)?.into_path_buf();
    if !resolved.is_dir() {
        return Err(PathSecurityError::InvalidRoot {
            path: doc_root.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }
    Ok(resolved)
}

fn check_lexical(path: &Path, max_length: usize) -> Result<(), PathSecurityError> {
    let text = path.to_string_lossy();

    if text.contains('\0') {
        return Err(PathSecurityError::NullByteInPath(path.to_path_buf()));
    }

    if text.chars().any(|c| c == '\n' || c == '\r') {
        return Err(PathSecurityError::ControlCharacter(path.to_path_buf()));
    }

    if text.len() > max_length {
        return Err(PathSecurityError::TooLong {
            length: text.len(),
            limit: max_length,
        });
    }

    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(PathSecurityError::TraversalAttempt(path.to_path_buf()));
    }

    let lower = text.to_lowercase();
    if ["%2e%2e", "%252e", "..%2f", "%2f.."]
        .iter()
        .any(|p| lower.contains(p))
    {
        return Err(PathSecurityError::EncodedTraversal(path.to_path_buf()));
    }

    Ok(())
}

fn canonicalize(path: &Path) -> Result<PathBuf, PathSecurityError> {
    path.canonicalize()
        .map_err(|e| PathSecurityError::CanonicalizeFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

fn resolve_nonexistent(path: &Path) -> Result<PathBuf, PathSecurityError> {
    let mut missing = Vec::new();
    let mut current = path;
    loop {
        if current.symlink_metadata().is_ok() {
            let mut resolved = canonicalize(current)?;
            resolved.extend(missing.iter().rev());
            return Ok(resolved);
        }
        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                current = parent;
            }
            _ => return Err(PathSecurityError::NotFound(path.to_path_buf())),
        }
    }
}
