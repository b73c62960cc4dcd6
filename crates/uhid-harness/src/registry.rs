//! Scenario registry and runner.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uhid_session::SessionBackend;

use crate::config::{DEFAULT_TIMEOUT_MS, HarnessConfig};
use crate::engine::run_scenario;
use crate::error::{HarnessError, HarnessResult};
use crate::report::{Outcome, RecordingReporter, Reporter};
use crate::scenario::Scenario;
use crate::session::Privilege;

/// Scenarios in registration order.
#[derive(Debug, Default)]
pub struct Registry {
    scenarios: Vec<Scenario>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns [`HarnessError::DuplicateScenario`] if the name is taken.
    pub fn register(&mut self, scenario: Scenario) -> HarnessResult<()> {
        if self.get(scenario.name()).is_some() {
            return Err(HarnessError::DuplicateScenario(scenario.name().to_owned()));
        }
        self.scenarios.push(scenario);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.name() == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Scenario> {
        self.scenarios.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.scenarios.iter().map(Scenario::name)
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    /// Runs every selected scenario in registration order.
    ///
    /// Must be awaited inside a `LocalSet`.
    ///
    /// # Errors
    ///
    /// Stops at the first harness defect.
    pub async fn run_all(&self, runner: &Runner<'_>) -> HarnessResult<RunSummary> {
        let mut results = Vec::with_capacity(self.scenarios.len());
        for scenario in &self.scenarios {
            if !runner.filter.matches(scenario.name()) {
                results.push(ScenarioResult::not_run(scenario.name()));
                continue;
            }
            results.push(runner.run_one(scenario).await?);
        }
        let summary = RunSummary::from_results(results);
        info!(
            passed = summary.passed,
            failed = summary.failed,
            aborted = summary.aborted,
            not_run = summary.not_run,
            "run complete"
        );
        Ok(summary)
    }
}

impl<'a> IntoIterator for &'a Registry {
    type Item = &'a Scenario;
    type IntoIter = std::slice::Iter<'a, Scenario>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Scenario name selection. Both criteria must hold when set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub prefix: Option<String>,
    pub substring: Option<String>,
}

impl Filter {
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_substring(mut self, substring: impl Into<String>) -> Self {
        self.substring = Some(substring.into());
        self
    }

    pub fn matches(&self, name: &str) -> bool {
        self.prefix.as_deref().is_none_or(|p| name.starts_with(p))
            && self.substring.as_deref().is_none_or(|s| name.contains(s))
    }
}

/// Execution settings shared by every scenario of a run.
pub struct Runner<'b> {
    backend: &'b dyn SessionBackend,
    privilege: Privilege,
    timeout: Duration,
    debug: bool,
    filter: Filter,
}

impl<'b> Runner<'b> {
    pub fn new(backend: &'b dyn SessionBackend) -> Self {
        Self {
            backend,
            privilege: Privilege::Unprivileged,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            debug: false,
            filter: Filter::default(),
        }
    }

    pub fn from_config(backend: &'b dyn SessionBackend, config: &HarnessConfig) -> Self {
        Self::new(backend)
            .with_privilege(config.privilege.resolve())
            .with_timeout(config.timeout())
            .with_debug(config.debug)
            .with_filter(config.filter())
    }

    pub fn with_privilege(mut self, privilege: Privilege) -> Self {
        self.privilege = privilege;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn privilege(&self) -> Privilege {
        self.privilege
    }

    /// Runs one scenario under the timeout.
    ///
    /// # Errors
    ///
    /// Propagates harness defects.
    pub async fn run_one(&self, scenario: &Scenario) -> HarnessResult<ScenarioResult> {
        let mut reporter = RecordingReporter::new(self.debug);
        let started = Instant::now();
        let run = tokio::time::timeout(
            self.timeout,
            run_scenario(scenario, self.backend, self.privilege, &mut reporter),
        )
        .await;

        if let Ok(result) = run {
            result?;
        } else {
            let reason = format!("timed out after {} ms", self.timeout.as_millis());
            warn!(scenario = scenario.name(), "{reason}");
            reporter.report_fail(&reason);
        }

        let outcome = reporter.outcome().unwrap_or(Outcome::Fail);
        Ok(ScenarioResult {
            name: scenario.name().to_owned(),
            status: outcome.into(),
            reason: reporter.reason().map(str::to_owned),
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Passed,
    Failed,
    Aborted,
    NotRun,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Passed => "passed",
            Status::Failed => "failed",
            Status::Aborted => "aborted",
            Status::NotRun => "not run",
        }
    }
}

impl From<Outcome> for Status {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Pass => Status::Passed,
            Outcome::Fail => Status::Failed,
            Outcome::Abort => Status::Aborted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub duration_ms: u64,
}

impl ScenarioResult {
    fn not_run(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            status: Status::NotRun,
            reason: None,
            duration_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub aborted: usize,
    pub not_run: usize,
    pub results: Vec<ScenarioResult>,
}

impl RunSummary {
    pub fn from_results(results: Vec<ScenarioResult>) -> Self {
        let count = |status| results.iter().filter(|r| r.status == status).count();
        Self {
            passed: count(Status::Passed),
            failed: count(Status::Failed),
            aborted: count(Status::Aborted),
            not_run: count(Status::NotRun),
            results,
        }
    }

    /// Scenarios that were selected and run.
    pub fn selected(&self) -> usize {
        self.results.len().saturating_sub(self.not_run)
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.aborted == 0
    }

    /// Process exit status: zero iff every selected scenario passed.
    pub fn exit_code(&self) -> u8 {
        if self.all_passed() { 0 } else { 1 }
    }

    pub fn result(&self, name: &str) -> Option<&ScenarioResult> {
        self.results.iter().find(|r| r.name == name)
    }

    /// # Errors
    ///
    /// Fails only if serialization fails.
    pub fn to_json(&self) -> HarnessResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
