//! Scenario outcome reporting.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Terminal state of one scenario run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
    Abort,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Pass => "pass",
            Outcome::Fail => "fail",
            Outcome::Abort => "abort",
        }
    }
}

/// Receives the result of one scenario run.
///
/// Exactly one of `report_pass`, `report_fail` and `report_abort` is called
/// per run.
pub trait Reporter {
    fn report_pass(&mut self);
    fn report_fail(&mut self, reason: &str);
    fn report_abort(&mut self, reason: &str);
    fn debug(&mut self, line: &str);
    fn debug_enabled(&self) -> bool;

    fn report(&mut self, outcome: Outcome, reason: &str) {
        match outcome {
            Outcome::Pass => self.report_pass(),
            Outcome::Fail => self.report_fail(reason),
            Outcome::Abort => self.report_abort(reason),
        }
    }
}

/// Records what a scenario reported and forwards debug lines to `tracing`.
#[derive(Debug, Clone, Default)]
pub struct RecordingReporter {
    debug: bool,
    outcome: Option<Outcome>,
    reason: Option<String>,
    reports: usize,
    debug_lines: Vec<String>,
}

impl RecordingReporter {
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            ..Self::default()
        }
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Number of pass/fail/abort calls received.
    pub fn report_count(&self) -> usize {
        self.reports
    }

    pub fn debug_lines(&self) -> &[String] {
        &self.debug_lines
    }

    fn record(&mut self, outcome: Outcome, reason: Option<&str>) {
        self.reports = self.reports.saturating_add(1);
        if self.outcome.is_some() {
            warn!(outcome = outcome.as_str(), "scenario reported more than once");
            return;
        }
        self.outcome = Some(outcome);
        self.reason = reason.map(str::to_owned);
    }
}

impl Reporter for RecordingReporter {
    fn report_pass(&mut self) {
        self.record(Outcome::Pass, None);
    }

    fn report_fail(&mut self, reason: &str) {
        self.record(Outcome::Fail, Some(reason));
    }

    fn report_abort(&mut self, reason: &str) {
        self.record(Outcome::Abort, Some(reason));
    }

    fn debug(&mut self, line: &str) {
        if !self.debug {
            return;
        }
        debug!("{line}");
        self.debug_lines.push(line.to_owned());
    }

    fn debug_enabled(&self) -> bool {
        self.debug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_report_wins() {
        let mut reporter = RecordingReporter::new(false);
        reporter.report_fail("mismatch");
        reporter.report_pass();
        assert_eq!(reporter.outcome(), Some(Outcome::Fail));
        assert_eq!(reporter.reason(), Some("mismatch"));
        assert_eq!(reporter.report_count(), 2);
    }

    #[test]
    fn test_debug_lines_only_when_enabled() {
        let mut quiet = RecordingReporter::new(false);
        quiet.debug("uHID: < 00");
        assert!(quiet.debug_lines().is_empty());

        let mut verbose = RecordingReporter::new(true);
        verbose.debug("uHID: < 00");
        assert_eq!(verbose.debug_lines(), &["uHID: < 00".to_owned()]);
    }

    #[test]
    fn test_report_dispatches_by_outcome() {
        let mut reporter = RecordingReporter::default();
        reporter.report(Outcome::Abort, "no channel");
        assert_eq!(reporter.outcome(), Some(Outcome::Abort));
        assert_eq!(reporter.reason(), Some("no channel"));
    }
}
