use super::error::GitError;
use crate::security::DEFAULT_MAX_PATH_LENGTH;
use serde::Serialize;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::{debug, warn};

/// What to revert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevertTarget {
    /// Create a revert commit for the given commit hash.
    Commit(String),
    /// Restore a file to its content at HEAD.
    Path(PathBuf),
}

/// One line of `git log`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
    pub hash: String,
    /// Author date, ISO 8601.
    pub date: String,
    pub subject: String,
}

impl CommitSummary {
    pub fn short_hash(&self) -> &str {
        self.hash.get(..8).unwrap_or(&self.hash)
    }
}

/// Thin wrapper over the `git` executable, rooted at the project directory.
///
/// Every path argument is placed after `--` and prefixed with `./` when it
/// starts with `-`, so no file name can be read as an option. Hooks are
/// left enabled.
#[derive(Debug, Clone)]
pub struct GitAdapter {
    repo_root: PathBuf,
    program: PathBuf,
}

impl GitAdapter {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            program: PathBuf::from("git"),
        }
    }

    /// Use a different executable, e.g. a pinned git build.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// The git binary runs and the root is inside a work tree.
    pub fn is_available(&self) -> bool {
        match self.run(&["rev-parse", "--is-inside-work-tree"]) {
            Ok(output) => {
                output.status.success() && String::from_utf8_lossy(&output.stdout).trim() == "true"
            }
            Err(_) => false,
        }
    }

    pub fn is_tracked(&self, path: &Path) -> Result<bool, GitError> {
        let arg = self.safe_path(path)?;
        let output = self.run(&["ls-files", "--error-unmatch", "--", arg.as_str()])?;
        Ok(output.status.success())
    }

    pub fn stage<P: AsRef<Path>>(&self, paths: &[P]) -> Result<(), GitError> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args = vec!["add".to_string(), "--".to_string()];
        for path in paths {
            args.push(self.safe_path(path.as_ref())?);
        }
        let output = self.run(args.as_slice())?;
        check_status("add", &output)?;
        debug!(count = paths.len(), "staged files");
        Ok(())
    }

    /// Commit the index. Returns the new commit hash.
    pub fn commit(&self, message: &str) -> Result<String, GitError> {
        let conflicts = self.conflicted_paths()?;
        if !conflicts.is_empty() {
            return Err(GitError::MergeConflict(conflicts));
        }

        let output = self.run(&["commit", "-m", message])?;
        if !output.status.success() {
            let stderr = stderr_of(&output);
            if stderr.to_lowercase().contains("hook") {
                warn!(stderr = %stderr, "commit rejected by hook");
                return Err(GitError::HookRejected(stderr));
            }
            return Err(GitError::CommandFailed {
                command: "commit".to_string(),
                stderr,
            });
        }

        let head = self.run(&["rev-parse", "HEAD"])?;
        check_status("rev-parse", &head)?;
        Ok(String::from_utf8_lossy(&head.stdout).trim().to_string())
    }

    pub fn revert(&self, target: &RevertTarget) -> Result<(), GitError> {
        match target {
            RevertTarget::Commit(hash) => {
                if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(GitError::InvalidPath(hash.clone()));
                }
                let output = self.run(&["revert", hash.as_str(), "--no-edit"])?;
                check_status("revert", &output)
            }
            RevertTarget::Path(path) => self.rollback_file(path),
        }
    }

    /// The newest `limit` commits whose subject starts with `prefix`.
    pub fn commits_with_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<CommitSummary>, GitError> {
        let grep = format!("--grep={prefix}");
        let output = self.run(&["log", "--fixed-strings", grep.as_str(), "--format=%H%x1f%aI%x1f%s"])?;
        check_status("log", &output)?;

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(|line| {
                let mut fields = line.splitn(3, '\x1f');
                Some(CommitSummary {
                    hash: fields.next()?.to_string(),
                    date: fields.next()?.to_string(),
                    subject: fields.next()?.to_string(),
                })
            })
            .filter(|commit| commit.subject.starts_with(prefix))
            .take(limit)
            .collect())
    }

    /// The file's bytes as committed at HEAD, or `None` when HEAD has no
    /// such file.
    pub fn head_content(&self, path: &Path) -> Result<Option<Vec<u8>>, GitError> {
        let arg = self.safe_path(path)?;
        let spec = format!("HEAD:{}", arg.trim_start_matches("./"));
        let output = self.run(&["cat-file", "blob", spec.as_str()])?;
        Ok(output.status.success().then_some(output.stdout))
    }

    /// Restore one file to its HEAD content.
    pub fn rollback_file(&self, path: &Path) -> Result<(), GitError> {
        let arg = self.safe_path(path)?;
        let output = self.run(&["checkout", "HEAD", "--", arg.as_str()])?;
        check_status("checkout", &output)
    }

    /// Render `path` as a git argument relative to the repository root.
    pub fn safe_path(&self, path: &Path) -> Result<String, GitError> {
        let relative = path.strip_prefix(&self.repo_root).unwrap_or(path);
        let text = relative.to_string_lossy();

        if text.contains('\0') {
            return Err(GitError::InvalidPath("path contains null byte".to_string()));
        }
        if text.len() > DEFAULT_MAX_PATH_LENGTH {
            return Err(GitError::InvalidPath(format!(
                "path length {} exceeds {}",
                text.len(),
                DEFAULT_MAX_PATH_LENGTH
            )));
        }

        if text.starts_with('-') {
            Ok(format!("./{text}"))
        } else {
            Ok(text.into_owned())
        }
    }

    fn conflicted_paths(&self) -> Result<Vec<String>, GitError> {
        let output = self.run(&["status", "--porcelain"])?;
        check_status("status", &output)?;
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|line| {
                ["UU", "AA", "DD", "AU", "UA", "DU", "UD"]
                    .iter()
                    .any(|code| line.starts_with(code))
            })
            .map(|line| line.get(3..).unwrap_or_default().to_string())
            .collect())
    }

    fn run<S: AsRef<OsStr>>(&self, args: &[S]) -> Result<Output, GitError> {
        let output = Command::new(&self.program)
            .args(args)
            .current_dir(&self.repo_root)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()?;
        Ok(output)
    }
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

fn check_status(command: &str, output: &Output) -> Result<(), GitError> {
    if output.status.success() {
        Ok(())
    } else {
        Err(GitError::CommandFailed {
            command: command.to_string(),
            stderr: stderr_of(output),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::git_repo;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_safe_path_prefixes_dash() {
        let adapter = GitAdapter::new("/repo");
        assert_eq!(
            adapter.safe_path(Path::new("/repo/-rf.md")).unwrap(),
            "./-rf.md"
        );
        assert_eq!(
            adapter.safe_path(Path::new("/repo/docs/a.md")).unwrap(),
            "docs/a.md"
        );
        assert_eq!(adapter.safe_path(Path::new("--force")).unwrap(), "./--force");
    }

    #[test]
    fn test_safe_path_rejects_overlong() {
        let adapter = GitAdapter::new("/repo");
        let long = "a".repeat(DEFAULT_MAX_PATH_LENGTH + 1);
        assert!(matches!(
            adapter.safe_path(Path::new(&long)),
            Err(GitError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let adapter = GitAdapter::new(dir.path()).with_program("git-binary-that-does-not-exist");
        assert!(!adapter.is_available());
        assert!(matches!(
            adapter.is_tracked(Path::new("a.md")),
            Err(GitError::NotFound)
        ));
    }

    #[test]
    fn test_revert_rejects_non_hex_commit() {
        let adapter = GitAdapter::new("/repo");
        assert!(matches!(
            adapter.revert(&RevertTarget::Commit("HEAD; rm".to_string())),
            Err(GitError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_tracked_stage_commit_and_rollback() {
        let Some(repo) = git_repo(&[("docs/a.md", "original\n")]) else {
            return;
        };
        let adapter = GitAdapter::new(repo.path());
        let file = repo.path().join("docs/a.md");

        assert!(adapter.is_available());
        assert!(adapter.is_tracked(&file).unwrap());
        assert!(!adapter.is_tracked(&repo.path().join("docs/new.md")).unwrap());

        fs::write(&file, "edited\n").unwrap();
        adapter.rollback_file(&file).unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "original\n");

        fs::write(&file, "committed edit\n").unwrap();
        adapter.stage(&[&file]).unwrap();
        let hash = adapter.commit("docs: edit").unwrap();
        assert_eq!(hash.len(), 40);

        adapter.revert(&RevertTarget::Commit(hash)).unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "original\n");
    }

    #[test]
    fn test_head_content() {
        let Some(repo) = git_repo(&[("docs/a.md", "committed\n")]) else {
            return;
        };
        let adapter = GitAdapter::new(repo.path());
        let file = repo.path().join("docs/a.md");
        fs::write(&file, "working copy\n").unwrap();

        assert_eq!(
            adapter.head_content(&file).unwrap().as_deref(),
            Some(b"committed\n".as_slice())
        );
        assert_eq!(adapter.head_content(&repo.path().join("docs/new.md")).unwrap(), None);
    }

    #[test]
    fn test_commits_with_prefix_newest_first() {
        let Some(repo) = git_repo(&[("docs/a.md", "v0\n")]) else {
            return;
        };
        let adapter = GitAdapter::new(repo.path());
        let file = repo.path().join("docs/a.md");
        for (content, message) in [
            ("v1\n", "docs(guardian): fix 1 documentation issue"),
            ("v2\n", "chore: mention docs(guardian): in body"),
            ("v3\n", "docs(guardian): fix 2 documentation issues"),
        ] {
            fs::write(&file, content).unwrap();
            adapter.stage(&[&file]).unwrap();
            adapter.commit(message).unwrap();
        }

        let commits = adapter.commits_with_prefix("docs(guardian):", 10).unwrap();
        let subjects: Vec<_> = commits.iter().map(|c| c.subject.as_str()).collect();
        assert_eq!(
            subjects,
            [
                "docs(guardian): fix 2 documentation issues",
                "docs(guardian): fix 1 documentation issue"
            ]
        );
        assert_eq!(commits[0].hash.len(), 40);
        assert_eq!(commits[0].short_hash().len(), 8);

        assert_eq!(adapter.commits_with_prefix("docs(guardian):", 1).unwrap().len(), 1);
    }

    #[test]
    fn test_stage_dash_prefixed_file() {
        let Some(repo) = git_repo(&[("docs/a.md", "a\n")]) else {
            return;
        };
        let adapter = GitAdapter::new(repo.path());
        let file = repo.path().join("-n.md");
        fs::write(&file, "dash\n").unwrap();

        adapter.stage(&[&file]).unwrap();
        assert!(adapter.is_tracked(&file).unwrap());
    }
}
