//! test-uhid - UHID device-session conformance runner
//!
//! Runs the built-in UHID scenarios against the session implementation,
//! over a simulated channel or, when privileged, the real `/dev/uhid`.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tokio::task::LocalSet;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uhid_harness::{HarnessConfig, PrivilegeMode, Runner, builtin_registry};
use uhid_session::UhidBackend;

#[derive(Parser, Debug)]
#[command(name = "test-uhid")]
#[command(about = "UHID device-session conformance tests")]
#[command(version)]
struct Cli {
    /// List scenario names and exit
    #[arg(short, long)]
    list: bool,

    /// Run only scenarios whose name starts with PREFIX
    #[arg(short, long, value_name = "PREFIX")]
    prefix: Option<String>,

    /// Run only scenarios whose name contains STRING
    #[arg(short = 's', long = "string", value_name = "STRING")]
    substring: Option<String>,

    /// Print a hex dump of every frame
    #[arg(short, long)]
    debug: bool,

    /// Print only the summary
    #[arg(short, long)]
    quiet: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,

    /// Per-scenario timeout in milliseconds
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// auto, unprivileged or elevated
    #[arg(long, env = "TEST_UHID_PRIVILEGE")]
    privilege: Option<PrivilegeMode>,

    /// JSON configuration file
    #[arg(short, long, env = "TEST_UHID_CONFIG")]
    config: Option<PathBuf>,

    /// UHID device node used when elevated
    #[arg(long, value_name = "PATH")]
    uhid_path: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // Hex dumps are logged at debug level by the harness.
    let harness_level = if cli.debug && cli.verbose < 2 {
        "debug"
    } else {
        log_level
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "test_uhid={log_level},uhid_session={log_level},uhid_harness={harness_level}"
                )
                .into()
            }),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match execute(&cli) {
        Ok(code) => code,
        Err(e) => {
            if cli.json {
                output::print_error_json(&e);
            } else {
                output::print_error_human(&e);
            }
            ExitCode::from(2)
        }
    }
}

fn execute(cli: &Cli) -> Result<ExitCode> {
    let config = load_config(cli)?;
    let registry = builtin_registry().context("building the scenario registry")?;

    if cli.list {
        output::print_list(&registry, &config.filter(), cli.json);
        return Ok(ExitCode::SUCCESS);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting the runtime")?;
    let backend = UhidBackend::with_device_path(&config.uhid_path);
    let runner = Runner::from_config(&backend, &config);
    info!(privilege = ?runner.privilege(), scenarios = registry.len(), "starting run");

    let summary = LocalSet::new()
        .block_on(&runtime, registry.run_all(&runner))
        .context("running scenarios")?;

    output::print_summary(&summary, cli.json, config.quiet);
    Ok(ExitCode::from(summary.exit_code()))
}

/// Configuration file first, then command-line overrides.
fn load_config(cli: &Cli) -> Result<HarnessConfig> {
    let base = match &cli.config {
        Some(path) => HarnessConfig::from_json_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => HarnessConfig::default(),
    };
    let config = apply_overrides(cli, base);
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn apply_overrides(cli: &Cli, mut config: HarnessConfig) -> HarnessConfig {
    config.debug |= cli.debug;
    config.quiet |= cli.quiet;
    if let Some(prefix) = &cli.prefix {
        config.prefix = Some(prefix.clone());
    }
    if let Some(substring) = &cli.substring {
        config.substring = Some(substring.clone());
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    if let Some(privilege) = cli.privilege {
        config.privilege = privilege;
    }
    if let Some(path) = &cli.uhid_path {
        config.uhid_path = path.clone();
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn parse_defaults() -> TestResult {
        let cli = Cli::try_parse_from(["test-uhid"])?;
        assert!(!cli.list);
        assert!(!cli.debug);
        assert_eq!(cli.verbose, 0);
        assert!(cli.prefix.is_none());
        Ok(())
    }

    #[test]
    fn parse_filters_and_flags() -> TestResult {
        let cli = Cli::try_parse_from([
            "test-uhid",
            "-p",
            "/uhid/command",
            "--string",
            "destroy",
            "-d",
            "-q",
            "-vv",
        ])?;
        assert_eq!(cli.prefix.as_deref(), Some("/uhid/command"));
        assert_eq!(cli.substring.as_deref(), Some("destroy"));
        assert!(cli.debug);
        assert!(cli.quiet);
        assert_eq!(cli.verbose, 2);
        Ok(())
    }

    #[test]
    fn parse_privilege() -> TestResult {
        let cli = Cli::try_parse_from(["test-uhid", "--privilege", "elevated"])?;
        assert_eq!(cli.privilege, Some(PrivilegeMode::Elevated));
        assert!(Cli::try_parse_from(["test-uhid", "--privilege", "sometimes"]).is_err());
        Ok(())
    }

    #[test]
    fn overrides_win_over_file() -> TestResult {
        let cli = Cli::try_parse_from([
            "test-uhid",
            "--timeout-ms",
            "250",
            "--privilege",
            "unprivileged",
            "--uhid-path",
            "/tmp/uhid",
        ])?;
        let file = HarnessConfig::from_json_str(
            r#"{"timeout_ms": 9000, "privilege": "elevated", "prefix": "/uhid/event"}"#,
        )?;

        let config = apply_overrides(&cli, file);

        assert_eq!(config.timeout_ms, 250);
        assert_eq!(config.privilege, PrivilegeMode::Unprivileged);
        assert_eq!(config.prefix.as_deref(), Some("/uhid/event"));
        assert_eq!(config.uhid_path, PathBuf::from("/tmp/uhid"));
        Ok(())
    }

    #[test]
    fn zero_timeout_is_rejected() -> TestResult {
        let cli = Cli::try_parse_from(["test-uhid", "--timeout-ms", "0"])?;
        assert!(load_config(&cli).is_err());
        Ok(())
    }
}
