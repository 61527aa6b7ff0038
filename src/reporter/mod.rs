//! Renderers for run results.

pub mod json;
pub mod markdown;
pub mod terminal;

use crate::report::AggregateReport;

pub use json::JsonReporter;
pub use markdown::MarkdownReporter;
pub use terminal::TerminalReporter;

pub trait Reporter {
    fn report(&self, result: &AggregateReport) -> String;
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::report::{AggregateReport, Mode, Report, ReportAggregator};
    use crate::test_utils::fixtures::replace_change;
    use std::path::Path;

    /// A heal run where `fix_typos` fixed one of two issues and
    /// `fix_broken_links` failed.
    pub fn mixed_heal() -> AggregateReport {
        let mut typos = Report::new("fix_typos", Mode::Heal);
        typos.set_issues_found(2);
        typos.record_fixed(replace_change(
            Path::new("/project/docs/guide.md"),
            3,
            "teh prose",
            "the prose",
            0.995,
        ));
        typos.defer(replace_change(
            Path::new("/project/docs/api.md"),
            7,
            "wierd",
            "weird",
            0.6,
        ));

        let mut links = Report::new("fix_broken_links", Mode::Heal);
        links.push_error("<project>/docs/a.md: Permission denied");

        let mut aggregator = ReportAggregator::new(Mode::Heal)
            .with_config_path(Some(".doc-guardian.yaml".into()));
        aggregator.add_all([typos, links]);
        aggregator.skip("sync_canonical");
        aggregator.finish()
    }

    pub fn clean_check() -> AggregateReport {
        let mut aggregator = ReportAggregator::new(Mode::Check);
        aggregator.add(Report::new("fix_typos", Mode::Check));
        aggregator.finish()
    }

    pub fn pending_check() -> AggregateReport {
        let mut typos = Report::new("fix_typos", Mode::Check);
        typos.set_issues_found(1);
        typos.add_change(replace_change(
            Path::new("/project/docs/guide.md"),
            3,
            "teh prose",
            "the prose",
            0.995,
        ));
        let mut aggregator = ReportAggregator::new(Mode::Check);
        aggregator.add(typos);
        aggregator.finish()
    }
}
