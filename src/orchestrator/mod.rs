//! Run orchestration: plan, scan, heal, aggregate.
//!
//! A run builds its [`RunContext`] and [`ExecutionPlan`] from configuration,
//! then walks the plan stage by stage. Detectors inside a stage scan
//! concurrently on a bounded pool; all writes happen afterwards on the
//! calling thread, in declaration order, before the next stage scans.

mod plan;

pub use plan::ExecutionPlan;

use crate::applier::{BackupStore, ChangeApplier};
use crate::confidence::{ActionTier, unit_interval};
use crate::config::{Config, ConfigError};
use crate::context::RunContext;
use crate::detector::{AppliedFix, Detector, DetectorRegistry, apply_report};
use crate::error::Result;
use crate::git::GitAdapter;
use crate::report::{AggregateReport, Mode, Report, ReportAggregator};
use crate::security::PersistHook;
use crate::shutdown::ShutdownFlag;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Checking,
    Healing,
    Done,
    /// Configuration was rejected before any detector ran.
    Failed,
}

/// Per-run overrides layered over the configuration file.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorOptions {
    pub skip: Vec<String>,
    pub only: Option<String>,
    pub min_confidence: Option<f64>,
    pub max_workers: Option<usize>,
    pub continue_on_error: Option<bool>,
    pub dry_run: bool,
}

impl OrchestratorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_skip<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.skip.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_only(mut self, name: impl Into<String>) -> Self {
        self.only = Some(name.into());
        self
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = Some(min_confidence);
        self
    }

    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = Some(workers);
        self
    }

    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = Some(continue_on_error);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// One row of `list_detectors`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectorListing {
    pub name: String,
    pub enabled: bool,
    /// Zero-based stage, or `None` when the detector will not run.
    pub stage: Option<usize>,
}

/// Everything a run needs, built from configuration.
struct Prepared {
    ctx: RunContext,
    plan: ExecutionPlan,
    detectors: HashMap<String, Box<dyn Detector>>,
    applier: ChangeApplier,
    git: Option<GitAdapter>,
    pool: rayon::ThreadPool,
    continue_on_error: bool,
}

pub struct Orchestrator {
    config: Config,
    base_dir: PathBuf,
    registry: DetectorRegistry,
    options: OrchestratorOptions,
    shutdown: ShutdownFlag,
    persist_hook: Option<Arc<PersistHook>>,
    state: RunState,
}

impl Orchestrator {
    /// Relative roots in `config` resolve against `base_dir`.
    pub fn new(
        config: Config,
        base_dir: impl Into<PathBuf>,
        registry: DetectorRegistry,
        options: OrchestratorOptions,
        shutdown: ShutdownFlag,
    ) -> Self {
        Self {
            config,
            base_dir: base_dir.into(),
            registry,
            options,
            shutdown,
            persist_hook: None,
            state: RunState::Idle,
        }
    }

    /// Run `hook` before every rename the applier performs.
    pub fn with_persist_hook(mut self, hook: Arc<PersistHook>) -> Self {
        self.persist_hook = Some(hook);
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Scan every planned detector without writing anything.
    pub fn check(&mut self) -> Result<AggregateReport> {
        let prepared = self.start()?;
        self.state = RunState::Checking;
        info!(stages = prepared.plan.stages().len(), "starting check");

        let mut aggregator = self.aggregator(&prepared, Mode::Check);
        for stage in prepared.plan.stages() {
            if self.shutdown.is_requested() {
                aggregator.mark_cancelled();
                break;
            }
            let reports = scan_stage(&prepared, stage, Mode::Check);
            let failed = first_failure(&reports);
            aggregator.add_all(reports);
            if let Some(name) = failed
                && !prepared.continue_on_error
            {
                aggregator.add_error(format!("stopped after {name} reported errors"));
                break;
            }
        }

        self.state = RunState::Done;
        Ok(finish(aggregator))
    }

    /// Scan and apply, stage by stage.
    ///
    /// `min_confidence` falls back to the options value, then to the
    /// auto-stage threshold. With `dry_run` set this is a check.
    pub fn heal(&mut self, min_confidence: Option<f64>) -> Result<AggregateReport> {
        if self.options.dry_run {
            info!("dry run, checking only");
            return self.check();
        }

        let prepared = self.start()?;
        let requested = min_confidence.or(self.options.min_confidence);
        let min_confidence = match requested {
            Some(value) => match unit_interval("min_confidence", value) {
                Ok(value) => value,
                Err(e) => {
                    self.state = RunState::Failed;
                    return Err(e);
                }
            },
            None => prepared.ctx.policy().auto_stage(),
        };

        self.state = RunState::Checking;
        info!(
            stages = prepared.plan.stages().len(),
            min_confidence, "starting heal"
        );

        let mut aggregator = self.aggregator(&prepared, Mode::Heal);
        let mut applied: Vec<AppliedFix> = Vec::new();

        for stage in prepared.plan.stages() {
            if self.shutdown.is_requested() {
                aggregator.mark_cancelled();
                break;
            }

            self.state = RunState::Checking;
            let started = Instant::now();
            let scanned = scan_stage(&prepared, stage, Mode::Heal);

            self.state = RunState::Healing;
            let mut stage_applied = Vec::new();
            let mut reports = Vec::with_capacity(scanned.len());
            for mut report in scanned {
                stage_applied.extend(apply_report(
                    &mut report,
                    &prepared.ctx,
                    &prepared.applier,
                    min_confidence,
                ));
                debug!(
                    detector = report.detector(),
                    found = report.issues_found(),
                    fixed = report.issues_fixed(),
                    "detector healed"
                );
                reports.push(report.finish(started));
            }

            if self.config.git.auto_stage
                && let Some(git) = &prepared.git
            {
                stage_files(git, &stage_applied, &prepared.ctx, &mut aggregator);
            }
            applied.extend(stage_applied);

            let failed = first_failure(&reports);
            aggregator.add_all(reports);
            if self.shutdown.is_requested() {
                aggregator.mark_cancelled();
                break;
            }
            if let Some(name) = failed
                && !prepared.continue_on_error
            {
                aggregator.add_error(format!("stopped after {name} reported errors"));
                break;
            }
        }

        if self.config.git.auto_commit
            && let Some(git) = &prepared.git
        {
            self.commit(git, &applied, &prepared.ctx, &mut aggregator);
        }

        self.state = RunState::Done;
        Ok(finish(aggregator))
    }

    /// Every known detector in plan order, with its stage.
    pub fn list_detectors(&self) -> Result<Vec<DetectorListing>> {
        self.config.validate()?;
        let order = self.order()?;
        let plan = self.plan(&order)?;
        Ok(order
            .into_iter()
            .map(|name| {
                let stage = plan.stage_of(&name);
                DetectorListing {
                    enabled: stage.is_some(),
                    stage,
                    name,
                }
            })
            .collect())
    }

    fn start(&mut self) -> Result<Prepared> {
        match self.prepare() {
            Ok(prepared) => Ok(prepared),
            Err(e) => {
                warn!(error = %e, "run rejected");
                self.state = RunState::Failed;
                Err(e)
            }
        }
    }

    fn prepare(&self) -> Result<Prepared> {
        let ctx = RunContext::from_config(&self.config, &self.base_dir, self.shutdown.clone())?;
        let order = self.order()?;
        let plan = self.plan(&order)?;

        let mut detectors = HashMap::new();
        for name in plan.detectors() {
            let detector = self
                .registry
                .create(name, &ctx)
                .ok_or_else(|| ConfigError::UnknownDetector(name.to_string()))??;
            detectors.insert(name.to_string(), detector);
        }

        let git = self.config.git.enabled.then(|| GitAdapter::new(ctx.project_root()));
        let git = git.filter(|g| {
            let available = g.is_available();
            if !available {
                debug!("git unavailable, rollback will use backups");
            }
            available
        });

        let mut applier = ChangeApplier::new(ctx.path_guard()?, BackupStore::new(ctx.backup_dir()))
            .with_max_file_size(ctx.limits().max_file_size)
            .with_git(git.clone());
        if let Some(hook) = &self.persist_hook {
            applier = applier.with_persist_hook(Arc::clone(hook));
        }

        let workers = self
            .options
            .max_workers
            .unwrap_or_else(|| self.config.execution.effective_workers());
        if workers == 0 {
            return Err(ConfigError::InvalidLimit {
                name: "max_workers",
                message: "must be greater than zero".to_string(),
            }
            .into());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("doc-guardian-{i}"))
            .build()
            .map_err(|e| ConfigError::InvalidLimit {
                name: "max_workers",
                message: e.to_string(),
            })?;

        Ok(Prepared {
            continue_on_error: self
                .options
                .continue_on_error
                .unwrap_or(self.config.execution.continue_on_error),
            ctx,
            plan,
            detectors,
            applier,
            git,
            pool,
        })
    }

    /// Declared order, or registry order when none is configured. Every
    /// name, including skip and only filters, must be registered.
    fn order(&self) -> Result<Vec<String>> {
        let order = if self.config.execution.order.is_empty() {
            self.registry.names()
        } else {
            self.config.execution.order.clone()
        };

        let filters = self.options.skip.iter().chain(self.options.only.iter());
        for name in order.iter().chain(filters) {
            if !self.registry.contains(name) {
                return Err(ConfigError::UnknownDetector(name.clone()).into());
            }
        }
        Ok(order)
    }

    fn plan(&self, order: &[String]) -> Result<ExecutionPlan> {
        let plan = ExecutionPlan::build(order, &self.config.execution.dependencies, |name| {
            self.is_selected(name)
        })?;
        Ok(plan)
    }

    fn is_selected(&self, name: &str) -> bool {
        self.config.is_detector_enabled(name)
            && !self.options.skip.iter().any(|s| s == name)
            && self.options.only.as_deref().is_none_or(|only| only == name)
    }

    fn aggregator(&self, prepared: &Prepared, mode: Mode) -> ReportAggregator {
        let mut aggregator =
            ReportAggregator::new(mode).with_config_path(prepared.ctx.config_path().map(Path::to_path_buf));
        if let Ok(order) = self.order() {
            for name in order.iter().filter(|n| !self.is_selected(n)) {
                aggregator.skip(name.clone());
            }
        }
        aggregator
    }

    fn commit(
        &self,
        git: &GitAdapter,
        applied: &[AppliedFix],
        ctx: &RunContext,
        aggregator: &mut ReportAggregator,
    ) {
        if applied.is_empty() {
            return;
        }
        if let Some(below) = applied.iter().find(|fix| fix.tier < ActionTier::AutoCommit) {
            info!(
                file = %ctx.display_path(&below.file).display(),
                "not committing, a change is below the auto-commit threshold"
            );
            return;
        }

        let files: BTreeSet<&Path> = applied.iter().map(|fix| fix.file.as_path()).collect();
        let files: Vec<&Path> = files.into_iter().collect();
        let message = format!(
            "{} fix {} documentation issue{}",
            self.config.git.commit_prefix,
            applied.len(),
            if applied.len() == 1 { "" } else { "s" }
        );

        match git.stage(&files).and_then(|()| git.commit(&message)) {
            Ok(hash) => info!(commit = %hash, files = files.len(), "committed fixes"),
            Err(e) => {
                warn!(error = %e, "commit failed");
                aggregator.add_error(ctx.sanitize(&format!("git commit failed: {e}")));
            }
        }
    }
}

/// Scan one stage on the pool. Reports come back in stage order.
fn scan_stage(prepared: &Prepared, stage: &[String], mode: Mode) -> Vec<Report> {
    let ctx = &prepared.ctx;
    let detectors = &prepared.detectors;
    prepared.pool.install(|| {
        stage
            .par_iter()
            .map(|name| {
                let Some(detector) = detectors.get(name) else {
                    let mut report = Report::new(name, mode);
                    report.push_error("detector was not constructed");
                    return report;
                };
                debug!(detector = %name, "scanning");
                match catch_unwind(AssertUnwindSafe(|| detector.scan(ctx))) {
                    Ok(report) => report,
                    Err(payload) => {
                        let message = payload
                            .downcast_ref::<&str>()
                            .map(|s| s.to_string())
                            .or_else(|| payload.downcast_ref::<String>().cloned())
                            .unwrap_or_else(|| "unknown panic".to_string());
                        warn!(detector = %name, panic = %message, "detector panicked");
                        let mut report = Report::new(name, mode);
                        report.push_error(format!("detector panicked: {message}"));
                        report
                    }
                }
            })
            .collect()
    })
}

fn first_failure(reports: &[Report]) -> Option<String> {
    reports
        .iter()
        .find(|r| r.has_errors())
        .map(|r| r.detector().to_string())
}

fn stage_files(
    git: &GitAdapter,
    applied: &[AppliedFix],
    ctx: &RunContext,
    aggregator: &mut ReportAggregator,
) {
    let files: BTreeSet<&Path> = applied
        .iter()
        .filter(|fix| fix.tier >= ActionTier::AutoStage)
        .map(|fix| fix.file.as_path())
        .collect();
    if files.is_empty() {
        return;
    }
    let files: Vec<&Path> = files.into_iter().collect();
    if let Err(e) = git.stage(&files) {
        warn!(error = %e, "staging failed");
        aggregator.add_error(ctx.sanitize(&format!("git add failed: {e}")));
    }
}

fn finish(aggregator: ReportAggregator) -> AggregateReport {
    let report = aggregator.finish();
    info!(
        mode = %report.mode(),
        found = report.issues_found(),
        fixed = report.issues_fixed(),
        errors = report.errors().len(),
        cancelled = report.is_cancelled(),
        "run complete"
    );
    report
}
