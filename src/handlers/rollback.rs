//! Rollback handler.

use super::{emit, load_config};
use crate::cli::{Cli, OutputFormat};
use crate::rollback::{Rollback, RollbackInventory};
use std::fmt::Write;
use std::process::ExitCode;

/// Guardian commits shown by --show.
const SHOW_LIMIT: usize = 20;

/// Handle --rollback.
pub fn handle_rollback(cli: &Cli) -> ExitCode {
    let (config, base_dir) = match load_config(cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(1);
        }
    };
    let tool = match Rollback::new(&config, &base_dir) {
        Ok(tool) => tool,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(1);
        }
    };

    if cli.show {
        return match tool.inventory(SHOW_LIMIT) {
            Ok(inventory) => exit(emit(cli.output.as_deref(), &render_inventory(cli.format, &inventory))),
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::from(1)
            }
        };
    }

    if let Some(backup) = &cli.backup {
        return match tool.restore_backup(backup, cli.target.as_deref()) {
            Ok(restored) => {
                println!("Restored {} from {}", restored.target.display(), backup.display());
                if let Some(previous) = &restored.previous {
                    println!("Previous content saved to {}", previous.display());
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::from(1)
            }
        };
    }

    if let Some(hash) = &cli.commit {
        return match tool.revert_commit(hash) {
            Ok(()) => {
                println!("Reverted {hash}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::from(1)
            }
        };
    }

    let count = cli.last.map_or(1, usize::from);
    match tool.revert_last(count) {
        Ok(outcome) => {
            for commit in &outcome.reverted {
                println!("Reverted {} {}", commit.short_hash(), commit.subject);
            }
            if let Some(failure) = &outcome.failed {
                eprintln!("Error: revert stopped at {failure}");
            }
            if outcome.reverted.is_empty() && outcome.failed.is_none() {
                eprintln!("No guardian commits found");
            }
            println!("Reverted {}/{} commits", outcome.reverted.len(), outcome.requested);
            exit(outcome.is_complete())
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

fn exit(ok: bool) -> ExitCode {
    if ok { ExitCode::SUCCESS } else { ExitCode::from(1) }
}

fn render_inventory(format: OutputFormat, inventory: &RollbackInventory) -> String {
    if format == OutputFormat::Json {
        return serde_json::to_string_pretty(inventory)
            .unwrap_or_else(|e| format!(r#"{{"error": "Failed to serialize inventory: {}"}}"#, e));
    }

    let mut out = String::new();
    let _ = writeln!(out, "Backups ({}):", inventory.backups.len());
    for entry in &inventory.backups {
        let _ = writeln!(out, "  {}  {} -> {}", entry.stamp, entry.backup.display(), entry.target.display());
    }
    let _ = writeln!(out, "Guardian commits ({}):", inventory.commits.len());
    for commit in &inventory.commits {
        let date = commit.date.get(..10).unwrap_or(&commit.date);
        let _ = writeln!(out, "  {} {} {}", commit.short_hash(), date, commit.subject);
    }
    out
}
