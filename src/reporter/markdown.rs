use crate::report::{AggregateReport, Mode, Report};
use crate::reporter::Reporter;
use std::fmt::Write;

/// Markdown summary suitable for a pull request comment or a CI artifact.
#[derive(Debug, Default)]
pub struct MarkdownReporter;

impl MarkdownReporter {
    pub fn new() -> Self {
        Self
    }

    fn title(detector: &str) -> String {
        detector
            .split('_')
            .filter(|word| !word.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                chars.next().map_or_else(String::new, |first| {
                    first.to_uppercase().chain(chars).collect()
                })
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn detector_section(out: &mut String, report: &Report) {
        let (icon, status) = if report.has_errors() {
            ("❌", "❌ Failed")
        } else if report.issues_found() == 0 {
            ("✅", "✅ Healthy")
        } else {
            ("⚠️", "⚠️ Issues detected")
        };
        let _ = writeln!(out, "### {icon} {}\n", Self::title(report.detector()));
        let _ = writeln!(out, "- **Status**: {status}");
        for error in report.errors() {
            let _ = writeln!(out, "- **Error**: {error}");
        }
        if report.issues_found() > 0 {
            let _ = writeln!(out, "- **Issues Found**: {}", report.issues_found());
            let _ = writeln!(out, "- **Issues Fixed**: {}", report.issues_fixed());
            let _ = writeln!(
                out,
                "- **Success Rate**: {:.1}%",
                report.success_rate() * 100.0
            );
        }
        let _ = writeln!(
            out,
            "- **Execution Time**: {:.2}s\n",
            report.duration().as_secs_f64()
        );
    }
}

impl Reporter for MarkdownReporter {
    fn report(&self, result: &AggregateReport) -> String {
        let mut out = String::from("# Documentation Healing Report\n\n");

        let config = result
            .config_path()
            .map_or_else(|| "defaults".to_string(), |p| p.display().to_string());
        let _ = writeln!(out, "**Mode**: {}", result.mode());
        let _ = writeln!(out, "**Timestamp**: {}", result.timestamp().to_rfc3339());
        let _ = writeln!(out, "**Config**: {config}");
        let _ = writeln!(
            out,
            "**Execution Time**: {:.2}s\n",
            result.duration().as_secs_f64()
        );

        out.push_str("## Summary\n\n");
        let _ = writeln!(out, "- **Detectors Run**: {}", result.reports().len());
        let _ = writeln!(out, "- **Total Issues Found**: {}", result.issues_found());
        let _ = writeln!(out, "- **Total Issues Fixed**: {}", result.issues_fixed());
        let _ = writeln!(
            out,
            "- **Success Rate**: {:.1}%\n",
            result.success_rate() * 100.0
        );
        if result.issues_found() == 0 {
            out.push_str("✅ **All documentation is healthy!**\n\n");
        }
        if result.is_cancelled() {
            out.push_str("> Run cancelled before all stages finished.\n\n");
        }
        for error in result.errors() {
            let _ = writeln!(out, "> **Error**: {error}\n");
        }

        out.push_str("## Detector Results\n\n");
        for report in result.reports() {
            Self::detector_section(&mut out, report);
        }

        if result.mode() == Mode::Check && result.issues_found() > 0 {
            out.push_str("## Recommendations\n\n");
            out.push_str("Run with `--heal` to auto-fix high-confidence issues:\n\n");
            let command = match result.config_path() {
                Some(path) => format!("doc-guardian --config {} --heal", path.display()),
                None => "doc-guardian --heal".to_string(),
            };
            let _ = writeln!(out, "```bash\n{command}\n```\n");
        }

        if result.mode() == Mode::Heal && result.unresolved() > 0 {
            out.push_str("## Manual Review Required\n\n");
            let _ = writeln!(
                out,
                "Some issues ({}) require manual attention.\n",
                result.unresolved()
            );
            for report in result.reports() {
                for change in report.deferred() {
                    let _ = writeln!(
                        out,
                        "- `{}:{}` {} ({:.0}%)",
                        change.file().display(),
                        change.line(),
                        change.reason(),
                        change.confidence() * 100.0
                    );
                }
            }
            out.push('\n');
        }

        out
    }
}
