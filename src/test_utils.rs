//! Shared fixtures for unit tests.

use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Create a temp directory populated with `files` (relative path, content).
pub fn doc_tree(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    write_files(dir.path(), files);
    dir
}

pub fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (relative, content) in files {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }
}

/// A committed git repository containing `files`, or `None` when git is
/// not installed.
pub fn git_repo(files: &[(&str, &str)]) -> Option<TempDir> {
    let dir = doc_tree(files);
    let git = |args: &[&str]| {
        Command::new("git")
            .args(args)
            .current_dir(dir.path())
            .output()
            .ok()
            .filter(|o| o.status.success())
    };

    git(&["init", "-q"])?;
    git(&["config", "user.email", "guardian@example.com"])?;
    git(&["config", "user.name", "Guardian Tests"])?;
    git(&["config", "commit.gpgsign", "false"])?;
    git(&["add", "-A"])?;
    git(&["commit", "-q", "-m", "initial"])?;
    Some(dir)
}

pub mod fixtures {
    use crate::confidence::ChangeType;
    use crate::report::Change;
    use std::path::Path;

    /// A line-specific replacement with fixed confidence.
    pub fn replace_change(file: &Path, line: usize, old: &str, new: &str, confidence: f64) -> Change {
        Change::builder("test_detector", file)
            .line(line)
            .replace(old, new)
            .confidence(confidence)
            .change_type(ChangeType::TypoFix)
            .reason("test change")
            .build()
            .unwrap()
    }
}
