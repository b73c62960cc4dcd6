//! Harness configuration.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uhid_session::DEFAULT_UHID_PATH;

use crate::error::{HarnessError, HarnessResult};
use crate::registry::Filter;
use crate::session::Privilege;

/// Default per-scenario timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// How the run decides whether it is privileged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivilegeMode {
    /// Probe the effective user.
    #[default]
    Auto,
    Unprivileged,
    Elevated,
}

impl PrivilegeMode {
    pub fn resolve(self) -> Privilege {
        match self {
            PrivilegeMode::Auto => Privilege::detect(),
            PrivilegeMode::Unprivileged => Privilege::Unprivileged,
            PrivilegeMode::Elevated => Privilege::Elevated,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PrivilegeMode::Auto => "auto",
            PrivilegeMode::Unprivileged => "unprivileged",
            PrivilegeMode::Elevated => "elevated",
        }
    }
}

impl fmt::Display for PrivilegeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrivilegeMode {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(PrivilegeMode::Auto),
            "unprivileged" | "user" => Ok(PrivilegeMode::Unprivileged),
            "elevated" | "root" => Ok(PrivilegeMode::Elevated),
            other => Err(HarnessError::Config(format!(
                "unknown privilege mode '{other}', expected auto, unprivileged or elevated"
            ))),
        }
    }
}

/// Settings for one harness run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Emit per-frame hex dumps
    pub debug: bool,
    /// Suppress per-scenario output
    pub quiet: bool,
    pub privilege: PrivilegeMode,
    /// Per-scenario timeout in milliseconds
    pub timeout_ms: u64,
    /// Run only scenarios whose name starts with this
    pub prefix: Option<String>,
    /// Run only scenarios whose name contains this
    pub substring: Option<String>,
    /// Device node of the privileged backend
    pub uhid_path: PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            debug: false,
            quiet: false,
            privilege: PrivilegeMode::Auto,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            prefix: None,
            substring: None,
            uhid_path: PathBuf::from(DEFAULT_UHID_PATH),
        }
    }
}

impl HarnessConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a JSON configuration file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or parsed, or holds invalid values.
    pub fn from_json_file(path: impl AsRef<Path>) -> HarnessResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    /// # Errors
    ///
    /// Fails on malformed JSON or invalid values.
    pub fn from_json_str(text: &str) -> HarnessResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] for a zero timeout.
    pub fn validate(&self) -> HarnessResult<()> {
        if self.timeout_ms == 0 {
            return Err(HarnessError::Config("timeout_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn with_privilege(mut self, privilege: PrivilegeMode) -> Self {
        self.privilege = privilege;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_substring(mut self, substring: impl Into<String>) -> Self {
        self.substring = Some(substring.into());
        self
    }

    pub fn with_uhid_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.uhid_path = path.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn filter(&self) -> Filter {
        Filter {
            prefix: self.prefix.clone(),
            substring: self.substring.clone(),
        }
    }
}
