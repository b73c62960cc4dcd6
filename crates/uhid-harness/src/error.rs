//! Harness error types and their mapping onto scenario outcomes.

use thiserror::Error;
use uhid_session::SessionError;

use crate::report::Outcome;

#[derive(Error, Debug)]
pub enum HarnessError {
    /// The scenario could not be set up: channel allocation failed or the
    /// privileged backend is unavailable.
    #[error("Environment failure: {0}")]
    Environment(String),

    /// A device-session command returned an error.
    #[error("Command {command} failed: {source}")]
    Command {
        command: &'static str,
        #[source]
        source: SessionError,
    },

    /// Observed traffic diverged from the script.
    #[error("Protocol mismatch: {0}")]
    Protocol(String),

    /// The harness itself misused a script. Never a scenario outcome.
    #[error("Script error: {0}")]
    Script(String),

    #[error("Duplicate scenario: {0}")]
    DuplicateScenario(String),

    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type HarnessResult<T> = Result<T, HarnessError>;

impl HarnessError {
    pub fn command(command: &'static str, source: SessionError) -> Self {
        if source.is_environment() {
            return Self::Environment(format!("{command}: {source}"));
        }
        Self::Command { command, source }
    }

    pub fn protocol(reason: impl Into<String>) -> Self {
        Self::Protocol(reason.into())
    }

    /// Outcome a scenario ends with when this error stops it, or `None` if
    /// the error is a harness defect that must not be reported as one.
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            Self::Environment(_) | Self::Io(_) => Some(Outcome::Abort),
            Self::Command { .. } | Self::Protocol(_) => Some(Outcome::Fail),
            Self::Script(_)
            | Self::DuplicateScenario(_)
            | Self::InvalidDescriptor(_)
            | Self::Config(_)
            | Self::Serialization(_) => None,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.outcome().is_none()
    }
}
