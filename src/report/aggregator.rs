//! Run-level aggregation of detector reports.

use super::{Change, Mode, Report, serialize_secs, success_rate};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Collects detector reports in plan order.
#[derive(Debug)]
pub struct ReportAggregator {
    mode: Mode,
    timestamp: DateTime<Utc>,
    started: Instant,
    reports: Vec<Report>,
    skipped: Vec<String>,
    errors: Vec<String>,
    config_path: Option<PathBuf>,
    cancelled: bool,
}

impl ReportAggregator {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            timestamp: Utc::now(),
            started: Instant::now(),
            reports: Vec::new(),
            skipped: Vec::new(),
            errors: Vec::new(),
            config_path: None,
            cancelled: false,
        }
    }

    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn add(&mut self, report: Report) {
        self.reports.push(report);
    }

    pub fn add_all(&mut self, reports: impl IntoIterator<Item = Report>) {
        for report in reports {
            self.add(report);
        }
    }

    pub fn skip(&mut self, detector: impl Into<String>) {
        self.skipped.push(detector.into());
    }

    /// Record a failure that belongs to the run rather than one detector.
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    pub fn total_found(&self) -> usize {
        self.reports.iter().map(Report::issues_found).sum()
    }

    pub fn total_fixed(&self) -> usize {
        self.reports.iter().map(Report::issues_fixed).sum()
    }

    pub fn finish(self) -> AggregateReport {
        let issues_found = self.total_found();
        let issues_fixed = self.total_fixed();
        AggregateReport {
            mode: self.mode,
            timestamp: self.timestamp,
            issues_found,
            issues_fixed,
            success_rate: success_rate(issues_fixed, issues_found),
            detectors_run: self.reports.len(),
            reports: self.reports,
            skipped: self.skipped,
            errors: self.errors,
            duration: self.started.elapsed(),
            config_path: self.config_path,
            cancelled: self.cancelled,
        }
    }
}

/// The final result of a check or heal run.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateReport {
    mode: Mode,
    timestamp: DateTime<Utc>,
    issues_found: usize,
    issues_fixed: usize,
    success_rate: f64,
    detectors_run: usize,
    reports: Vec<Report>,
    skipped: Vec<String>,
    errors: Vec<String>,
    #[serde(rename = "duration_secs", serialize_with = "serialize_secs")]
    duration: Duration,
    config_path: Option<PathBuf>,
    cancelled: bool,
}

impl AggregateReport {
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

    pub fn success_rate(&self) -> f64 {
        self.success_rate
    }

    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    pub fn report(&self, detector: &str) -> Option<&Report> {
        self.reports.iter().find(|r| r.detector() == detector)
    }

    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Run-level errors or errors in any detector report.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty() || self.reports.iter().any(Report::has_errors)
    }

    pub fn unresolved(&self) -> usize {
        self.issues_found - self.issues_fixed
    }

    /// Every change in every report, in plan order.
    pub fn changes(&self) -> impl Iterator<Item = &Change> {
        self.reports.iter().flat_map(|r| r.changes().iter())
    }

    /// Changes grouped by target file.
    pub fn changes_by_file(&self) -> BTreeMap<&Path, Vec<&Change>> {
        let mut grouped: BTreeMap<&Path, Vec<&Change>> = BTreeMap::new();
        for change in self.changes() {
            grouped.entry(change.file()).or_default().push(change);
        }
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures::replace_change;

    fn report_with(detector: &str, found: usize, fixed: usize) -> Report {
        let mut report = Report::new(detector, Mode::Heal);
        report.set_issues_found(found);
        for line in 0..fixed {
            report.record_fixed(replace_change(
                Path::new("docs/a.md"),
                line + 1,
                "old",
                "new",
                0.95,
            ));
        }
        report
    }

    #[test]
    fn test_totals_and_rate() {
        let mut aggregator = ReportAggregator::new(Mode::Heal);
        aggregator.add(report_with("fix_broken_links", 3, 2));
        aggregator.add(report_with("fix_typos", 1, 1));

        let aggregate = aggregator.finish();
        assert_eq!(aggregate.issues_found(), 4);
        assert_eq!(aggregate.issues_fixed(), 3);
        assert_eq!(aggregate.success_rate(), 0.75);
        assert_eq!(aggregate.unresolved(), 1);
        assert_eq!(aggregate.reports().len(), 2);
    }

    #[test]
    fn test_empty_run_has_zero_rate() {
        let aggregate = ReportAggregator::new(Mode::Check).finish();
        assert_eq!(aggregate.issues_found(), 0);
        assert_eq!(aggregate.success_rate(), 0.0);
        assert!(!aggregate.has_errors());
    }

    #[test]
    fn test_errors_and_cancellation() {
        let mut aggregator = ReportAggregator::new(Mode::Heal);
        let mut failing = Report::new("fix_typos", Mode::Heal);
        failing.push_error("unreadable");
        aggregator.add(failing);
        aggregator.skip("fix_broken_links");
        aggregator.mark_cancelled();

        let aggregate = aggregator.finish();
        assert!(aggregate.has_errors());
        assert!(aggregate.is_cancelled());
        assert_eq!(aggregate.skipped(), ["fix_broken_links".to_string()]);
    }

    #[test]
    fn test_changes_by_file() {
        let mut aggregator = ReportAggregator::new(Mode::Heal);
        aggregator.add(report_with("fix_typos", 2, 2));
        let aggregate = aggregator.finish();

        let grouped = aggregate.changes_by_file();
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[Path::new("docs/a.md")].len(), 2);
    }

    #[test]
    fn test_report_lookup() {
        let mut aggregator = ReportAggregator::new(Mode::Check);
        aggregator.add(report_with("fix_typos", 0, 0));
        let aggregate = aggregator.finish();
        assert!(aggregate.report("fix_typos").is_some());
        assert!(aggregate.report("missing").is_none());
    }
}
