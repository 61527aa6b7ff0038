//! Per-detector and aggregate run results.

mod aggregator;
mod change;

pub use aggregator::{AggregateReport, ReportAggregator};
pub use change::{Change, ChangeBuilder, ChangeKind};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Check,
    Heal,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Check => write!(f, "check"),
            Mode::Heal => write!(f, "heal"),
        }
    }
}

/// Outcome of one detector invocation.
///
/// In check mode `changes` holds every reportable proposal. In heal mode it
/// holds the changes that were written, and `deferred` those that were
/// reported but left for review.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    detector: String,
    mode: Mode,
    timestamp: DateTime<Utc>,
    issues_found: usize,
    issues_fixed: usize,
    changes: Vec<Change>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    deferred: Vec<Change>,
    errors: Vec<String>,
    #[serde(rename = "duration_secs", serialize_with = "serialize_secs")]
    duration: Duration,
}

impl Report {
    pub fn new(detector: impl Into<String>, mode: Mode) -> Self {
        Self {
            detector: detector.into(),
            mode,
            timestamp: Utc::now(),
            issues_found: 0,
            issues_fixed: 0,
            changes: Vec::new(),
            deferred: Vec::new(),
            errors: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn detector(&self) -> &str {
        &self.detector
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn issues_found(&self) -> usize {
        self.issues_found
    }

    pub fn issues_fixed(&self) -> usize {
        self.issues_fixed
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn deferred(&self) -> &[Change] {
        &self.deferred
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// `issues_fixed / issues_found`, or 0 when nothing was found.
    pub fn success_rate(&self) -> f64 {
        success_rate(self.issues_fixed, self.issues_found)
    }

    pub fn set_issues_found(&mut self, count: usize) {
        self.issues_found = count;
        self.issues_fixed = self.issues_fixed.min(count);
    }

    pub fn add_change(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub fn push_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Switch a scan result to heal mode, handing back its proposals.
    ///
    /// Every proposal is at least one issue, whatever the detector counted.
    pub fn begin_heal(&mut self) -> Vec<Change> {
        self.issues_found = self.issues_found.max(self.changes.len());
        self.mode = Mode::Heal;
        self.timestamp = Utc::now();
        std::mem::take(&mut self.changes)
    }

    /// Record a change that was written to disk.
    pub fn record_fixed(&mut self, change: Change) {
        self.issues_fixed += 1;
        self.issues_found = self.issues_found.max(self.issues_fixed);
        self.changes.push(change);
    }

    /// Record a change that was reported but not applied.
    pub fn defer(&mut self, change: Change) {
        self.deferred.push(change);
    }

    pub fn finish(mut self, started: Instant) -> Self {
        self.duration = started.elapsed();
        self
    }
}

pub(crate) fn success_rate(fixed: usize, found: usize) -> f64 {
    if found == 0 {
        0.0
    } else {
        fixed as f64 / found as f64
    }
}

fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}
