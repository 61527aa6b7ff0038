use crate::orchestrator::OrchestratorOptions;
use clap::{ArgGroup, Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Terminal,
    Json,
    Markdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Check,
    Heal,
    List,
    Rollback,
}

#[derive(Parser, Debug)]
#[command(
    name = "doc-guardian",
    version,
    about = "Detect and heal documentation defects",
    long_about = "doc-guardian scans a documentation tree for broken links and common typos, \
                  scores every proposed fix, and applies the confident ones atomically with backups."
)]
#[command(group(
    ArgGroup::new("action")
        .required(true)
        .args(["check", "heal", "list", "rollback"])
))]
#[command(group(
    ArgGroup::new("rollback_source")
        .args(["backup", "last", "commit", "show"])
        .requires("rollback")
))]
pub struct Cli {
    /// Configuration file (.yaml, .yml, .json or .toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory searched for .doc-guardian.* when --config is not given
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Report issues without changing any file
    #[arg(long)]
    pub check: bool,

    /// Apply fixes that clear the confidence threshold
    #[arg(long)]
    pub heal: bool,

    /// List detectors in execution order
    #[arg(long)]
    pub list: bool,

    /// Undo an earlier heal (with --backup, --last, --commit or --show)
    #[arg(long, requires = "rollback_source")]
    pub rollback: bool,

    /// With --rollback: backup file to restore, relative to the backup directory
    #[arg(long, value_name = "FILE")]
    pub backup: Option<PathBuf>,

    /// With --backup: document to overwrite, relative to the doc root
    #[arg(long, value_name = "FILE", requires = "backup")]
    pub target: Option<PathBuf>,

    /// With --rollback: revert the last N guardian commits
    #[arg(
        long,
        value_name = "N",
        num_args = 0..=1,
        default_missing_value = "1",
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub last: Option<u16>,

    /// With --rollback: revert one commit
    #[arg(long, value_name = "HASH")]
    pub commit: Option<String>,

    /// With --rollback: list backups and recent guardian commits
    #[arg(long)]
    pub show: bool,

    /// Minimum confidence for a fix to be applied (0.0 to 1.0)
    #[arg(long, value_parser = parse_confidence)]
    pub min_confidence: Option<f64>,

    /// Detectors to skip (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub skip: Vec<String>,

    /// Run only this detector
    #[arg(long)]
    pub only: Option<String>,

    /// Worker threads for concurrent scans
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    pub max_workers: Option<u16>,

    /// With --heal: show what would change without writing
    #[arg(long)]
    pub dry_run: bool,

    /// Strict mode: unresolved issues fail the run
    #[arg(short, long)]
    pub strict: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Terminal)]
    pub format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Stop after the first stage with detector errors
    #[arg(long)]
    pub stop_on_error: bool,

    /// Verbose output (debug logging, diffs in the terminal report)
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    pub fn action(&self) -> Action {
        if self.heal {
            Action::Heal
        } else if self.list {
            Action::List
        } else if self.rollback {
            Action::Rollback
        } else {
            Action::Check
        }
    }

    /// Run overrides taken from the command line.
    pub fn options(&self) -> OrchestratorOptions {
        let mut options = OrchestratorOptions::new()
            .with_skip(self.skip.iter().filter(|s| !s.is_empty()).cloned())
            .with_dry_run(self.dry_run);
        if let Some(only) = &self.only {
            options = options.with_only(only.clone());
        }
        if let Some(workers) = self.max_workers {
            options = options.with_max_workers(usize::from(workers));
        }
        if self.stop_on_error {
            options = options.with_continue_on_error(false);
        }
        options
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "doc_guardian=debug"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        }
    }
}

fn parse_confidence(value: &str) -> Result<f64, String> {
    let parsed: f64 = value
        .parse()
        .map_err(|_| format!("`{value}` is not a number"))?;
    if (0.0..=1.0).contains(&parsed) {
        Ok(parsed)
    } else {
        Err(format!("{parsed} is outside 0.0..=1.0"))
    }
}
