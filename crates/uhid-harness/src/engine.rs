//! Exchange engine.
//!
//! Active scenarios invoke a command and verify every frame the session
//! writes, in order, against the script. Passive scenarios inject the script
//! into the session one deferred write at a time and wait for handler
//! dispatch.

use std::time::Duration;

use tracing::{debug, info, warn};
use uhid_protocol::{EventType, UhidEvent};
use uhid_session::{CreateParams, DeviceSession, SessionBackend};

use crate::error::{HarnessError, HarnessResult};
use crate::hexdump::hexdump_prefixed;
use crate::report::{Outcome, Reporter};
use crate::scenario::{Command, PassiveSpec, Role, Scenario};
use crate::session::{Privilege, Session, SessionEvent};

/// How long the channel must stay quiet after the last expected frame.
pub const SETTLE_WINDOW: Duration = Duration::from_millis(10);

const DUMP_PREFIX: &str = "uHID: ";
/// Dump mark for frames written into the session.
const INJECTED: char = '<';
/// Dump mark for frames the session wrote.
const OBSERVED: char = '>';

/// Runs one scenario to a terminal state and reports it exactly once.
///
/// Must be awaited inside a `LocalSet`.
///
/// # Errors
///
/// Only harness defects ([`HarnessError::Script`]) are returned; every
/// other failure becomes the reported outcome.
pub async fn run_scenario(
    scenario: &Scenario,
    backend: &dyn SessionBackend,
    privilege: Privilege,
    reporter: &mut dyn Reporter,
) -> HarnessResult<Outcome> {
    info!(scenario = scenario.name(), "scenario started");
    let session = match Session::create(scenario, backend, privilege) {
        Ok(session) => session,
        Err(err) => {
            let Some(outcome) = err.outcome() else {
                return Err(err);
            };
            warn!(scenario = scenario.name(), error = %err, "scenario setup failed");
            reporter.report(outcome, &err.to_string());
            return Ok(outcome);
        }
    };
    drive(session, reporter).await
}

/// Runs the role of an already created session and reports its outcome.
async fn drive(mut session: Session<'_>, reporter: &mut dyn Reporter) -> HarnessResult<Outcome> {
    let scenario = session.scenario();
    let result = match scenario.role() {
        Role::Active(command) => run_active(&mut session, *command, reporter).await,
        Role::Passive(spec) => run_passive(&mut session, spec, reporter).await,
    };

    match result {
        Ok(()) => {
            session.finish(Outcome::Pass, "", reporter);
            info!(scenario = scenario.name(), "scenario passed");
            Ok(Outcome::Pass)
        }
        Err(err) => {
            let Some(outcome) = err.outcome() else {
                session.teardown();
                return Err(err);
            };
            warn!(
                scenario = scenario.name(),
                outcome = outcome.as_str(),
                error = %err,
                "scenario did not pass"
            );
            session.finish(outcome, &err.to_string(), reporter);
            Ok(outcome)
        }
    }
}

/// Drives the Active role.
///
/// # Errors
///
/// Command errors and any divergence from the script.
pub async fn run_active(
    session: &mut Session<'_>,
    command: Command,
    reporter: &mut dyn Reporter,
) -> HarnessResult<()> {
    let params = session.create_params();
    invoke(session.handle_mut()?, command, &params).await?;

    if !session.has_channel() {
        debug!(%command, "privileged backend, command results decide");
        return Ok(());
    }

    while !session.is_exhausted() {
        match session.next_event().await {
            Some(SessionEvent::Frame(bytes)) => {
                dump(reporter, OBSERVED, &bytes);
                session.verify_observed(&bytes)?;
            }
            Some(other) => return Err(unexpected(other)),
            None => return Err(HarnessError::protocol("event queue closed")),
        }
    }
    ensure_quiet(session, reporter).await
}

async fn invoke(
    handle: &mut dyn DeviceSession,
    command: Command,
    params: &CreateParams,
) -> HarnessResult<()> {
    handle
        .create(params)
        .await
        .map_err(|e| HarnessError::command("create", e))?;

    let result = match command {
        Command::Create => return Ok(()),
        Command::Destroy => handle.destroy(true).await,
        Command::FeatureAnswer => {
            handle
                .send(&UhidEvent::zeroed(EventType::FEATURE_ANSWER))
                .await
        }
        Command::Input => handle.input(0, &[]).await,
    };
    result.map_err(|e| HarnessError::command(command.name(), e))
}

async fn ensure_quiet(session: &mut Session<'_>, reporter: &mut dyn Reporter) -> HarnessResult<()> {
    let Ok(event) = tokio::time::timeout(SETTLE_WINDOW, session.next_event()).await else {
        return Ok(());
    };
    match event {
        Some(SessionEvent::Frame(bytes)) => {
            dump(reporter, OBSERVED, &bytes);
            Err(HarnessError::protocol(format!(
                "extra frame of {} bytes after the script ended",
                bytes.len()
            )))
        }
        Some(other) => Err(unexpected(other)),
        None => Ok(()),
    }
}

/// Drives the Passive role.
///
/// # Errors
///
/// A missing channel is an environment failure; short writes and
/// unexpected dispatch are protocol failures.
pub async fn run_passive(
    session: &mut Session<'_>,
    spec: &PassiveSpec,
    reporter: &mut dyn Reporter,
) -> HarnessResult<()> {
    if !session.has_channel() {
        return Err(HarnessError::Environment(
            "passive scenarios need a simulated channel".into(),
        ));
    }
    session.register_handlers(spec.handlers())?;

    if session.is_exhausted() {
        if spec.expected().is_none() {
            return Ok(());
        }
    } else {
        inject_next(session, reporter)?;
    }

    loop {
        match session.next_event().await {
            Some(SessionEvent::Injected { written, expected }) => {
                session.injection_done();
                if written < expected {
                    return Err(HarnessError::protocol(format!(
                        "short write: {written} of {expected} bytes"
                    )));
                }
                session.advance()?;
                if !session.is_exhausted() {
                    inject_next(session, reporter)?;
                } else if spec.expected().is_none() {
                    return Ok(());
                }
            }
            Some(SessionEvent::Dispatched { handler, event }) => {
                return check_dispatch(spec, handler, &event);
            }
            Some(SessionEvent::Frame(bytes)) => {
                dump(reporter, OBSERVED, &bytes);
                return Err(HarnessError::protocol(format!(
                    "session wrote an unexpected frame of {} bytes",
                    bytes.len()
                )));
            }
            Some(other) => return Err(unexpected(other)),
            None => return Err(HarnessError::protocol("event queue closed")),
        }
    }
}

fn inject_next(session: &mut Session<'_>, reporter: &mut dyn Reporter) -> HarnessResult<()> {
    let frame = session.current_frame()?;
    dump(reporter, INJECTED, frame.payload());
    session.schedule_injection()
}

fn check_dispatch(spec: &PassiveSpec, handler: EventType, event: &UhidEvent) -> HarnessResult<()> {
    match spec.expected() {
        Some(kind) if kind == handler && event.event_type() == kind => {
            debug!(%handler, "expected dispatch");
            Ok(())
        }
        Some(kind) => Err(HarnessError::protocol(format!(
            "expected {kind} dispatch, {handler} handler received {}",
            event.event_type()
        ))),
        None => Err(HarnessError::protocol(format!(
            "unexpected dispatch of {} to the {handler} handler",
            event.event_type()
        ))),
    }
}

fn unexpected(event: SessionEvent) -> HarnessError {
    match event {
        SessionEvent::ChannelError(e) => HarnessError::protocol(format!("channel error: {e}")),
        SessionEvent::Frame(bytes) => {
            HarnessError::protocol(format!("unexpected frame of {} bytes", bytes.len()))
        }
        SessionEvent::Injected { .. } => HarnessError::protocol("unexpected injection result"),
        SessionEvent::Dispatched { handler, .. } => {
            HarnessError::protocol(format!("unexpected dispatch to the {handler} handler"))
        }
    }
}

fn dump(reporter: &mut dyn Reporter, dir: char, bytes: &[u8]) {
    if !reporter.debug_enabled() {
        return;
    }
    for line in hexdump_prefixed(DUMP_PREFIX, dir, bytes) {
        reporter.debug(&line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::RecordingReporter;
    use tokio::task::LocalSet;
    use uhid_test_helpers::prelude::*;

    #[tokio::test]
    async fn test_short_injection_write_fails_once() -> TestResult {
        LocalSet::new()
            .run_until(async {
                let scenario = Scenario::passive("/uhid/test/short-write", PassiveSpec::default())
                    .frame(&[1, 2, 3, 4, 5, 6, 7, 8])
                    .build();
                let backend = MockBackend::new();
                let session = Session::create(&scenario, &backend, Privilege::Unprivileged)?;
                session.post(SessionEvent::Injected {
                    written: 3,
                    expected: 8,
                });

                let mut reporter = RecordingReporter::default();
                let outcome = drive(session, &mut reporter).await?;

                assert_eq!(outcome, Outcome::Fail);
                assert_eq!(reporter.report_count(), 1);
                assert!(must_some(reporter.reason(), "reason").contains("short write: 3 of 8"));
                assert!(backend.log().contains(&MockCall::Release));
                Ok(())
            })
            .await
    }

    #[test]
    fn test_expected_dispatch_passes() {
        let spec = PassiveSpec::expecting(EventType::Output);
        let event = UhidEvent::zeroed(EventType::Output);
        assert!(matches!(
            check_dispatch(&spec, EventType::Output, &event),
            Ok(())
        ));
    }

    #[test]
    fn test_wrong_handler_fails() {
        let spec = PassiveSpec::expecting(EventType::Output);
        let event = UhidEvent::zeroed(EventType::FEATURE);
        assert!(matches!(
            check_dispatch(&spec, EventType::FEATURE, &event),
            Err(HarnessError::Protocol(_))
        ));
    }

    #[test]
    fn test_dispatch_without_expectation_fails() {
        let spec = PassiveSpec::default();
        let event = UhidEvent::zeroed(EventType::Output);
        assert!(matches!(
            check_dispatch(&spec, EventType::Output, &event),
            Err(HarnessError::Protocol(_))
        ));
    }

    #[test]
    fn test_dump_only_in_debug_mode() {
        let mut quiet = RecordingReporter::new(false);
        dump(&mut quiet, OBSERVED, &[0u8; 20]);
        assert!(quiet.debug_lines().is_empty());

        let mut verbose = RecordingReporter::new(true);
        dump(&mut verbose, OBSERVED, &[0u8; 20]);
        assert_eq!(verbose.debug_lines().len(), 2);
        assert!(verbose.debug_lines().iter().all(|l| l.starts_with("uHID: > ")));
    }
}
