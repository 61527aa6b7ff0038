//! Check and heal handlers.

use super::{emit, load_config};
use crate::cli::{Cli, OutputFormat};
use crate::config::Config;
use crate::detector::DetectorRegistry;
use crate::orchestrator::Orchestrator;
use crate::report::AggregateReport;
use crate::reporter::{JsonReporter, MarkdownReporter, Reporter, TerminalReporter};
use crate::shutdown::ShutdownFlag;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;

/// Handle --check.
pub fn handle_check(cli: &Cli, shutdown: &ShutdownFlag) -> ExitCode {
    run(cli, shutdown, false)
}

/// Handle --heal (and --heal --dry-run).
pub fn handle_heal(cli: &Cli, shutdown: &ShutdownFlag) -> ExitCode {
    run(cli, shutdown, true)
}

fn run(cli: &Cli, shutdown: &ShutdownFlag, heal: bool) -> ExitCode {
    let (config, base_dir) = match load_config(cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(1);
        }
    };
    let doc_root = doc_root(&config, &base_dir);

    let mut orchestrator = Orchestrator::new(
        config,
        base_dir,
        DetectorRegistry::with_builtin(),
        cli.options(),
        shutdown.clone(),
    );
    let result = if heal {
        orchestrator.heal(cli.min_confidence)
    } else {
        orchestrator.check()
    };
    let report = match result {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(1);
        }
    };

    let output = render(cli, &report, doc_root);
    if !emit(cli.output.as_deref(), &output) {
        return ExitCode::from(1);
    }

    debug!(
        found = report.issues_found(),
        fixed = report.issues_fixed(),
        errors = report.has_errors(),
        "run finished"
    );
    exit_code(&report, cli.strict)
}

/// Canonical documentation root, for shortening paths in terminal output.
fn doc_root(config: &Config, base_dir: &Path) -> Option<PathBuf> {
    base_dir
        .join(&config.project.root)
        .join(&config.project.doc_root)
        .canonicalize()
        .ok()
}

fn render(cli: &Cli, report: &AggregateReport, doc_root: Option<PathBuf>) -> String {
    match cli.format {
        OutputFormat::Json => JsonReporter::new().report(report),
        OutputFormat::Markdown => MarkdownReporter::new().report(report),
        OutputFormat::Terminal => {
            let mut reporter = TerminalReporter::new(cli.strict, cli.verbose);
            if let Some(root) = doc_root {
                reporter = reporter.with_root(root);
            }
            reporter.report(report)
        }
    }
}

/// 1 on errors, cancellation, or (in strict mode) anything left unresolved.
fn exit_code(report: &AggregateReport, strict: bool) -> ExitCode {
    let failed = report.has_errors()
        || report.is_cancelled()
        || (strict && report.unresolved() > 0);
    if failed {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
