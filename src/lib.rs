//! Self-healing documentation engine.
//!
//! Detectors scan a documentation tree and propose [`Change`]s with a
//! confidence score. The [`Orchestrator`] runs them in dependency stages and
//! applies confident changes through the [`ChangeApplier`], which validates
//! paths, writes atomically and keeps backups; [`Rollback`] undoes earlier
//! runs from those backups or by reverting their commits.

pub mod applier;
pub mod cli;
pub mod confidence;
pub mod config;
pub mod context;
pub mod detector;
pub mod discovery;
pub mod error;
pub mod git;
pub mod handlers;
pub mod orchestrator;
pub mod report;
pub mod reporter;
pub mod rollback;
pub mod security;
pub mod shutdown;

#[cfg(test)]
pub mod test_utils;

pub use applier::{AppliedChange, BackupStore, ChangeApplier};
pub use cli::{Action, Cli, OutputFormat};
pub use confidence::{ActionTier, ChangeType, ConfidenceFactors, ThresholdPolicy, Weights};
pub use config::{Config, ConfigError};
pub use context::RunContext;
pub use detector::{Detector, DetectorRegistry};
pub use error::{GuardianError, Result};
pub use git::{GitAdapter, GitError};
pub use orchestrator::{DetectorListing, ExecutionPlan, Orchestrator, OrchestratorOptions, RunState};
pub use report::{AggregateReport, Change, Mode, Report, ReportAggregator};
pub use reporter::{JsonReporter, MarkdownReporter, Reporter, TerminalReporter};
pub use rollback::Rollback;
pub use security::{PathGuard, PatternGuard};
pub use shutdown::ShutdownFlag;
