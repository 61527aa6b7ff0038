//! CLI command handlers.
//!
//! Kept out of main.rs so they can be unit tested.

mod list;
mod rollback;
mod run;

pub use list::handle_list;
pub use rollback::handle_rollback;
pub use run::{handle_check, handle_heal};

use crate::Cli;
use crate::config::{Config, ConfigError};
use std::fs;
use std::path::{Path, PathBuf};

/// Load the configuration named by `--config`, or discover one under
/// `--root`. Returns the config and the directory its roots resolve against.
pub(crate) fn load_config(cli: &Cli) -> Result<(Config, PathBuf), ConfigError> {
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load(&cli.root)?,
    };
    let base_dir = config.base_dir(&cli.root);
    Ok((config, base_dir))
}

/// Print `content`, or write it to `output`. Returns false when the write
/// failed.
pub(crate) fn emit(output: Option<&Path>, content: &str) -> bool {
    let Some(path) = output else {
        println!("{content}");
        return true;
    };
    match fs::write(path, content) {
        Ok(()) => {
            println!("Output written to {}", path.display());
            true
        }
        Err(e) => {
            eprintln!("Failed to write output to {}: {}", path.display(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::ShutdownFlag;
    use crate::test_utils::doc_tree;
    use clap::Parser;
    use std::process::ExitCode;

    fn cli(root: &Path, args: &[&str]) -> Cli {
        let mut full = vec!["doc-guardian", "--root", root.to_str().unwrap()];
        full.extend(args);
        Cli::parse_from(full)
    }

    #[test]
    fn test_load_config_discovers_file() {
        let dir = doc_tree(&[(".doc-guardian.yaml", "project:\n  doc_root: manual\n")]);
        let (config, base) = load_config(&cli(dir.path(), &["--check"])).unwrap();
        assert_eq!(config.project.doc_root, PathBuf::from("manual"));
        assert_eq!(base, dir.path());
    }

    #[test]
    fn test_load_config_explicit_path_sets_base() {
        let dir = doc_tree(&[("conf/guardian.json", r#"{"git": {"enabled": false}}"#)]);
        let path = dir.path().join("conf/guardian.json");
        let (config, base) =
            load_config(&cli(dir.path(), &["--check", "--config", path.to_str().unwrap()])).unwrap();
        assert!(!config.git.enabled);
        assert_eq!(base, dir.path().join("conf"));
    }

    #[test]
    fn test_check_clean_tree_succeeds() {
        let dir = doc_tree(&[("docs/index.md", "# Index\n\nSee [guide](guide.md).\n"), ("docs/guide.md", "ok\n")]);
        let code = handle_check(&cli(dir.path(), &["--check", "--strict"]), &ShutdownFlag::new());
        assert_eq!(code, ExitCode::SUCCESS);
    }

    #[test]
    fn test_strict_check_fails_on_issues() {
        let dir = doc_tree(&[("docs/index.md", "teh index\n")]);
        let flags = ShutdownFlag::new();
        assert_eq!(handle_check(&cli(dir.path(), &["--check"]), &flags), ExitCode::SUCCESS);
        assert_eq!(
            handle_check(&cli(dir.path(), &["--check", "--strict"]), &flags),
            ExitCode::from(1)
        );
    }

    #[test]
    fn test_heal_writes_report_file() {
        let dir = doc_tree(&[("docs/index.md", "teh index\n")]);
        let out = dir.path().join("report.json");
        let code = handle_heal(
            &cli(
                dir.path(),
                &["--heal", "--strict", "--format", "json", "--output", out.to_str().unwrap()],
            ),
            &ShutdownFlag::new(),
        );

        assert_eq!(code, ExitCode::SUCCESS);
        assert_eq!(fs::read_to_string(dir.path().join("docs/index.md")).unwrap(), "the index\n");
        let parsed: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out).unwrap()).unwrap();
        assert_eq!(parsed["issues_fixed"], 1);
    }

    #[test]
    fn test_invalid_config_exits_with_error() {
        let dir = doc_tree(&[
            (".doc-guardian.yaml", "confidence:\n  weights: {pattern: 0.5, magnitude: 0.5, risk: 0.5, history: 0.5}\n"),
            ("docs/index.md", "teh\n"),
        ]);
        let code = handle_heal(&cli(dir.path(), &["--heal"]), &ShutdownFlag::new());
        assert_eq!(code, ExitCode::from(1));
        assert_eq!(fs::read_to_string(dir.path().join("docs/index.md")).unwrap(), "teh\n");
    }

    #[test]
    fn test_list() {
        let dir = doc_tree(&[("docs/index.md", "")]);
        assert_eq!(handle_list(&cli(dir.path(), &["--list"])), ExitCode::SUCCESS);
        assert_eq!(
            handle_list(&cli(dir.path(), &["--list", "--only", "ghost"])),
            ExitCode::from(1)
        );
    }
}
