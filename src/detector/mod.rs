//! The detector contract and the static registry of implementations.
//!
//! A detector scans the documentation tree for one category of defect and
//! proposes [`Change`]s. Scanning never mutates; every write goes through
//! the [`ChangeApplier`].

mod links;
mod typos;

pub use links::{BrokenLinkDetector, LinkSettings, similarity};
pub use typos::{TypoDetector, TypoSettings};

use crate::applier::ChangeApplier;
use crate::confidence::ActionTier;
use crate::context::RunContext;
use crate::error::Result;
use crate::report::{Change, Report};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

pub trait Detector: Send + Sync {
    /// Registry name, also the key of the detector's configuration section.
    fn name(&self) -> &str;

    /// Read-only pass over the document tree.
    fn scan(&self, ctx: &RunContext) -> Report;

    /// Scan, then apply every proposal that clears `min_confidence`.
    fn heal(&self, ctx: &RunContext, applier: &ChangeApplier, min_confidence: f64) -> Report {
        let started = Instant::now();
        let mut report = self.scan(ctx);
        apply_report(&mut report, ctx, applier, min_confidence);
        report.finish(started)
    }
}

/// A file written during heal, with the tier of the change that wrote it.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedFix {
    pub file: PathBuf,
    pub tier: ActionTier,
}

/// Push `change` onto `report` unless its tier is `Discard`.
pub fn propose(report: &mut Report, ctx: &RunContext, change: Change) {
    if ctx.policy().action_for(change.confidence()) == ActionTier::Discard {
        debug!(
            detector = change.detector(),
            file = %ctx.display_path(change.file()).display(),
            confidence = change.confidence(),
            "proposal below report threshold"
        );
        return;
    }
    report.add_change(change);
}

/// Turn a scan report into a heal report by applying its proposals.
///
/// Changes below the auto-stage tier or `min_confidence` are deferred.
/// A change that cannot be written, stale ones included, is deferred with
/// an entry in the report's errors; the remaining changes are still
/// attempted. The shutdown flag
/// is checked before each write.
pub fn apply_report(
    report: &mut Report,
    ctx: &RunContext,
    applier: &ChangeApplier,
    min_confidence: f64,
) -> Vec<AppliedFix> {
    let mut applied = Vec::new();
    let mut proposals = report.begin_heal().into_iter();

    while let Some(change) = proposals.next() {
        if ctx.shutdown().is_requested() {
            debug!(detector = report.detector(), "shutdown requested, deferring remaining changes");
            report.defer(change);
            proposals.by_ref().for_each(|c| report.defer(c));
            break;
        }

        let tier = ctx.policy().action_for(change.confidence());
        if tier == ActionTier::Discard {
            continue;
        }
        if tier == ActionTier::ReportOnly || change.confidence() < min_confidence {
            report.defer(change);
            continue;
        }

        match applier.apply(&change) {
            Ok(written) => {
                applied.push(AppliedFix {
                    file: written.path,
                    tier,
                });
                report.record_fixed(change);
            }
            Err(e) if e.is_stale() => {
                debug!(
                    file = %ctx.display_path(change.file()).display(),
                    line = change.line(),
                    "content changed since scan, deferring"
                );
                report.push_error(ctx.sanitize(&format!(
                    "{}:{}: content changed since scan, re-run scan",
                    ctx.display_path(change.file()).display(),
                    change.line()
                )));
                report.defer(change);
            }
            Err(e) => {
                warn!(
                    detector = report.detector(),
                    file = %ctx.display_path(change.file()).display(),
                    error = %e,
                    "failed to apply change"
                );
                report.push_error(ctx.sanitize(&format!(
                    "{}:{}: {}",
                    ctx.display_path(change.file()).display(),
                    change.line(),
                    e
                )));
                report.defer(change);
            }
        }
    }

    applied
}

/// Builds a detector from the run context.
pub type DetectorFactory = Arc<dyn Fn(&RunContext) -> Result<Box<dyn Detector>> + Send + Sync>;

/// Name-to-factory table, in registration order.
#[derive(Clone, Default)]
pub struct DetectorRegistry {
    entries: Vec<(String, DetectorFactory)>,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in detectors, links first.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(links::NAME, links::factory);
        registry.register(typos::NAME, typos::factory);
        registry
    }

    /// Add or replace a detector factory.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&RunContext) -> Result<Box<dyn Detector>> + Send + Sync + 'static,
    {
        let name = name.into();
        let factory: DetectorFactory = Arc::new(factory);
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = factory;
        } else {
            self.entries.push((name, factory));
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn create(&self, name: &str, ctx: &RunContext) -> Option<Result<Box<dyn Detector>>> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, factory)| factory(ctx))
    }
}

impl std::fmt::Debug for DetectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorRegistry")
            .field("detectors", &self.names())
            .finish()
    }
}
