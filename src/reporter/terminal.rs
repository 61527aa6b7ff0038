use crate::orchestrator::DetectorListing;
use crate::report::{AggregateReport, Change, Mode, Report};
use crate::reporter::Reporter;
use colored::Colorize;
use std::path::{Path, PathBuf};

pub struct TerminalReporter {
    strict: bool,
    verbose: bool,
    /// Paths under this directory are shown relative to it.
    root: Option<PathBuf>,
}

impl TerminalReporter {
    pub fn new(strict: bool, verbose: bool) -> Self {
        Self {
            strict,
            verbose,
            root: None,
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    fn display<'a>(&self, path: &'a Path) -> std::path::Display<'a> {
        self.root
            .as_deref()
            .and_then(|root| path.strip_prefix(root).ok())
            .unwrap_or(path)
            .display()
    }

    fn confidence_label(confidence: f64) -> colored::ColoredString {
        let label = format!("{:.0}%", confidence * 100.0);
        if confidence >= 0.9 {
            label.green()
        } else if confidence >= 0.8 {
            label.cyan()
        } else {
            label.yellow()
        }
    }

    fn status_label(report: &Report) -> colored::ColoredString {
        if report.has_errors() {
            "[FAILED]".red().bold()
        } else if report.issues_found() == 0 {
            "[OK]".green().bold()
        } else if report.issues_fixed() == report.issues_found() {
            "[HEALED]".green()
        } else {
            "[ISSUES]".yellow().bold()
        }
    }

    fn format_change(&self, change: &Change, marker: colored::ColoredString) -> String {
        let mut output = format!(
            "  {} {}:{} {} ({})\n",
            marker,
            self.display(change.file()),
            change.line(),
            change.reason(),
            Self::confidence_label(change.confidence())
        );
        if self.verbose {
            output.push_str(&format!("      {} {}\n", "-".red(), change.old_content().dimmed()));
            output.push_str(&format!("      {} {}\n", "+".green(), change.new_content()));
        }
        output
    }

    fn format_detector(&self, report: &Report) -> String {
        let mut output = format!(
            "{} {}: {} found, {} fixed ({:.2}s)\n",
            Self::status_label(report),
            report.detector().bold(),
            report.issues_found(),
            report.issues_fixed(),
            report.duration().as_secs_f64()
        );

        let applied = match report.mode() {
            Mode::Check => "~".cyan(),
            Mode::Heal => "✓".green(),
        };
        for change in report.changes() {
            output.push_str(&self.format_change(change, applied.clone()));
        }
        for change in report.deferred() {
            output.push_str(&self.format_change(change, "?".yellow()));
        }
        for error in report.errors() {
            output.push_str(&format!("  {} {}\n", "error:".red().bold(), error));
        }
        output
    }

    /// `--list` output: one line per detector.
    pub fn format_listing(&self, listing: &[DetectorListing]) -> String {
        let mut output = format!("{}\n", "Detectors (execution order):".bold());
        for entry in listing {
            let line = match entry.stage {
                Some(stage) => format!(
                    "  {} {:<24} stage {}\n",
                    "✓".green(),
                    entry.name,
                    stage + 1
                ),
                None => format!("  {} {:<24} {}\n", "-".dimmed(), entry.name, "disabled".dimmed()),
            };
            output.push_str(&line);
        }
        output
    }

    /// A strict run passes only when nothing is left unresolved.
    pub fn passed(&self, result: &AggregateReport) -> bool {
        !result.has_errors() && !(self.strict && result.unresolved() > 0)
    }
}

impl Reporter for TerminalReporter {
    fn report(&self, result: &AggregateReport) -> String {
        let mut output = format!(
            "{}\n\n",
            format!("doc-guardian v{} ({})", env!("CARGO_PKG_VERSION"), result.mode()).bold()
        );

        for report in result.reports() {
            output.push_str(&self.format_detector(report));
        }
        for skipped in result.skipped() {
            output.push_str(&format!("{} {}\n", "[SKIPPED]".dimmed(), skipped));
        }
        if !result.errors().is_empty() {
            output.push('\n');
            for error in result.errors() {
                output.push_str(&format!("{} {}\n", "error:".red().bold(), error));
            }
        }
        if result.is_cancelled() {
            output.push_str(&format!("\n{}\n", "Run cancelled before all stages finished.".yellow()));
        }

        output.push_str(&format!("{}\n", "━".repeat(50)));
        if result.issues_found() == 0 && !result.has_errors() {
            output.push_str(&"All documentation is healthy.\n".green().to_string());
        }
        output.push_str(&format!(
            "Summary: {} found, {} fixed, {} unresolved ({:.1}% success, {:.2}s)\n",
            result.issues_found().to_string().bold(),
            result.issues_fixed().to_string().green(),
            result.unresolved().to_string().yellow(),
            result.success_rate() * 100.0,
            result.duration().as_secs_f64()
        ));

        let passed = self.passed(result);
        let label = if passed { "PASS".green().bold() } else { "FAIL".red().bold() };
        output.push_str(&format!(
            "Result: {} (exit code {})\n",
            label,
            if passed { 0 } else { 1 }
        ));
        output
    }
}
