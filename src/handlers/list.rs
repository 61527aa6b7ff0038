//! Detector listing handler.

use super::{emit, load_config};
use crate::cli::{Cli, OutputFormat};
use crate::detector::DetectorRegistry;
use crate::orchestrator::Orchestrator;
use crate::reporter::TerminalReporter;
use crate::shutdown::ShutdownFlag;
use std::fmt::Write;
use std::process::ExitCode;

/// Handle --list.
pub fn handle_list(cli: &Cli) -> ExitCode {
    let (config, base_dir) = match load_config(cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(1);
        }
    };

    let orchestrator = Orchestrator::new(
        config,
        base_dir,
        DetectorRegistry::with_builtin(),
        cli.options(),
        ShutdownFlag::new(),
    );
    let listing = match orchestrator.list_detectors() {
        Ok(listing) => listing,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(1);
        }
    };

    let output = match cli.format {
        OutputFormat::Json => serde_json::to_string_pretty(&listing)
            .unwrap_or_else(|e| format!(r#"{{"error": "Failed to serialize listing: {}"}}"#, e)),
        OutputFormat::Markdown => {
            let mut out = String::from("| Detector | Enabled | Stage |\n|---|---|---|\n");
            for entry in &listing {
                let stage = entry.stage.map_or_else(|| "-".to_string(), |s| (s + 1).to_string());
                let _ = writeln!(out, "| {} | {} | {} |", entry.name, entry.enabled, stage);
            }
            out
        }
        OutputFormat::Terminal => TerminalReporter::new(false, false).format_listing(&listing),
    };

    if emit(cli.output.as_deref(), &output) {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}
