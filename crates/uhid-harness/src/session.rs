//! Per-run session context.
//!
//! A [`Session`] owns everything one scenario run allocates: the
//! device-session handle, the simulated channel, the readiness watch and the
//! deferred injection. Callbacks and tasks never reach into it; they post a
//! [`SessionEvent`] to its queue, which the engine drains in order.

use nix::unistd::{Uid, getuid};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};
use uhid_protocol::{EVENT_SIZE, EventType, UhidEvent};
use uhid_session::{CreateParams, DeviceSession, SessionBackend};

use crate::channel::SimChannel;
use crate::descriptor::DeviceDescriptor;
use crate::error::{HarnessError, HarnessResult};
use crate::frame::Frame;
use crate::report::{Outcome, Reporter};
use crate::scenario::Scenario;
use crate::task::{TaskGuard, defer};

/// Whether the process may open the privileged backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privilege {
    Unprivileged,
    Elevated,
}

impl Privilege {
    /// Elevated when the real user of the process is root.
    pub fn detect() -> Self {
        Self::for_uid(getuid())
    }

    pub fn for_uid(uid: Uid) -> Self {
        if uid.is_root() {
            Privilege::Elevated
        } else {
            Privilege::Unprivileged
        }
    }

    pub fn is_elevated(self) -> bool {
        self == Privilege::Elevated
    }
}

/// Something that happened while the session was waiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session wrote one frame to the channel.
    Frame(Vec<u8>),
    /// The channel failed or hung up.
    ChannelError(String),
    /// A deferred injection finished writing.
    Injected { written: usize, expected: usize },
    /// A handler registered for `handler` received `event`.
    Dispatched { handler: EventType, event: UhidEvent },
}

pub struct Session<'s> {
    scenario: &'s Scenario,
    handle: Option<Box<dyn DeviceSession>>,
    channel: Option<SimChannel>,
    watch: Option<TaskGuard>,
    pending: Option<TaskGuard>,
    cursor: usize,
    events_tx: UnboundedSender<SessionEvent>,
    events_rx: UnboundedReceiver<SessionEvent>,
    torn_down: bool,
    reported: bool,
}

impl<'s> Session<'s> {
    /// Sets up the run for `scenario`.
    ///
    /// With a descriptor and elevated privilege the handle is opened on the
    /// backend's default transport and no channel exists. Otherwise a
    /// simulated channel is allocated, the handle bound to one end and a
    /// readiness watch started on the other.
    ///
    /// # Errors
    ///
    /// Any failure is a [`HarnessError::Environment`].
    pub fn create(
        scenario: &'s Scenario,
        backend: &dyn SessionBackend,
        privilege: Privilege,
    ) -> HarnessResult<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut session = Self {
            scenario,
            handle: None,
            channel: None,
            watch: None,
            pending: None,
            cursor: 0,
            events_tx,
            events_rx,
            torn_down: false,
            reported: false,
        };

        if scenario.device().is_some() && privilege.is_elevated() {
            let handle = backend
                .open_default()
                .map_err(|e| HarnessError::Environment(e.to_string()))?;
            session.handle = Some(handle);
            info!(scenario = scenario.name(), "session on privileged backend");
        } else {
            let (channel, device) = SimChannel::pair()
                .map_err(|e| HarnessError::Environment(format!("channel: {e}")))?;
            let handle = backend
                .attach(device)
                .map_err(|e| HarnessError::Environment(e.to_string()))?;
            let capacity = scenario.script().longest_frame().max(EVENT_SIZE);
            session.watch = Some(channel.watch(session.events_tx.clone(), capacity));
            session.channel = Some(channel);
            session.handle = Some(handle);
            debug!(scenario = scenario.name(), "session on simulated channel");
        }
        Ok(session)
    }

    pub fn scenario(&self) -> &'s Scenario {
        self.scenario
    }

    pub fn has_channel(&self) -> bool {
        self.channel.is_some()
    }

    /// Create arguments from the scenario's descriptor, or the minimal one.
    pub fn create_params(&self) -> CreateParams {
        match self.scenario.device() {
            Some(device) => device.to_create_params(),
            None => DeviceDescriptor::minimal().to_create_params(),
        }
    }

    /// # Errors
    ///
    /// Fails with [`HarnessError::Script`] after teardown.
    pub fn handle_mut(&mut self) -> HarnessResult<&mut dyn DeviceSession> {
        match self.handle.as_mut() {
            Some(handle) => Ok(handle.as_mut()),
            None => Err(HarnessError::Script("session handle already released".into())),
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.scenario.script().terminator_index()
    }

    /// Frame at the cursor.
    ///
    /// # Errors
    ///
    /// Fails with [`HarnessError::Script`] if the cursor is already past the
    /// terminator.
    pub fn current_frame(&self) -> HarnessResult<&'s Frame> {
        self.scenario.script().frame(self.cursor)
    }

    /// Moves past the current frame.
    ///
    /// # Errors
    ///
    /// The terminator cannot be advanced over.
    pub fn advance(&mut self) -> HarnessResult<()> {
        if self.current_frame()?.is_terminator() {
            return Err(HarnessError::Script(format!(
                "{}: advancing past the terminator",
                self.scenario.name()
            )));
        }
        self.cursor = self.cursor.saturating_add(1);
        Ok(())
    }

    /// Verifies an observed frame against the cursor and advances.
    ///
    /// # Errors
    ///
    /// A mismatch is a [`HarnessError::Protocol`]; observing anything once
    /// the script is exhausted is also a protocol failure.
    pub fn verify_observed(&mut self, observed: &[u8]) -> HarnessResult<()> {
        let frame = self.current_frame()?;
        if frame.is_terminator() {
            return Err(HarnessError::protocol(format!(
                "unexpected frame of {} bytes after the script ended",
                observed.len()
            )));
        }
        if let Some(diff) = frame.mismatch(observed) {
            return Err(HarnessError::protocol(format!(
                "frame {}: {diff}",
                self.cursor
            )));
        }
        self.advance()
    }

    /// Installs one handler per kind. Each posts at most one
    /// [`SessionEvent::Dispatched`].
    ///
    /// # Errors
    ///
    /// Fails after teardown.
    pub fn register_handlers(&mut self, kinds: &[EventType]) -> HarnessResult<()> {
        let tx = self.events_tx.clone();
        let handle = self.handle_mut()?;
        for &kind in kinds {
            let tx = tx.clone();
            let mut fired = false;
            handle.register(
                kind,
                Box::new(move |event: &UhidEvent| {
                    if fired {
                        return;
                    }
                    fired = true;
                    if tx
                        .send(SessionEvent::Dispatched {
                            handler: kind,
                            event: event.clone(),
                        })
                        .is_err()
                    {
                        debug!(handler = %kind, "dispatch after session end");
                    }
                }),
            );
        }
        Ok(())
    }

    /// Schedules writing the frame at the cursor into the channel as a
    /// deferred unit. At most one injection is outstanding.
    ///
    /// # Errors
    ///
    /// Fails without a channel, while an injection is pending, or at the
    /// terminator.
    pub fn schedule_injection(&mut self) -> HarnessResult<()> {
        if self.pending.as_ref().is_some_and(TaskGuard::is_active) {
            return Err(HarnessError::Script("injection already pending".into()));
        }
        let frame = self.current_frame()?;
        if frame.is_terminator() {
            return Err(HarnessError::Script("cannot inject the terminator".into()));
        }
        let socket = self
            .channel
            .as_ref()
            .map(SimChannel::socket)
            .ok_or_else(|| HarnessError::Environment("no simulated channel".into()))?;

        let bytes = frame.payload().to_vec();
        let tx = self.events_tx.clone();
        self.pending = Some(defer(async move {
            let event = match socket.send(&bytes).await {
                Ok(written) => SessionEvent::Injected {
                    written,
                    expected: bytes.len(),
                },
                Err(e) => SessionEvent::ChannelError(e.to_string()),
            };
            if tx.send(event).is_err() {
                debug!("injection finished after session end");
            }
        }));
        Ok(())
    }

    /// Queues `event` as if a task had posted it.
    #[cfg(test)]
    pub(crate) fn post(&self, event: SessionEvent) {
        if self.events_tx.send(event).is_err() {
            debug!("post after session end");
        }
    }

    /// Forgets a completed injection.
    pub fn injection_done(&mut self) {
        self.pending = None;
    }

    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events_rx.recv().await
    }

    /// Cancels tasks, unregisters handlers and releases the handle.
    /// Safe to call any number of times.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        if let Some(mut watch) = self.watch.take() {
            watch.cancel();
        }
        if let Some(mut pending) = self.pending.take() {
            pending.cancel();
        }
        if let Some(mut handle) = self.handle.take() {
            handle.unregister_all();
            handle.release();
        }
        self.channel = None;
        self.events_rx.close();
        debug!(scenario = self.scenario.name(), "session torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Tears down and reports `outcome` unless already reported.
    pub fn finish(&mut self, outcome: Outcome, reason: &str, reporter: &mut dyn Reporter) {
        self.teardown();
        if self.reported {
            return;
        }
        self.reported = true;
        reporter.report(outcome, reason);
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::RecordingReporter;
    use crate::scenario::Command;
    use std::sync::Arc;
    use tokio::task::LocalSet;
    use uhid_session::UhidBackend;

    #[test]
    fn test_privilege_follows_real_uid() {
        assert_eq!(Privilege::for_uid(Uid::from_raw(0)), Privilege::Elevated);
        assert_eq!(Privilege::for_uid(Uid::from_raw(1000)), Privilege::Unprivileged);
        assert_eq!(Privilege::detect(), Privilege::for_uid(getuid()));
        assert_eq!(Privilege::detect().is_elevated(), getuid().is_root());
    }

    fn scenario_with_frames(n: usize) -> Scenario {
        (0..n)
            .fold(Scenario::active("/uhid/test/session", Command::Create), |b, i| {
                b.frame(&[u8::try_from(i).unwrap_or(u8::MAX)])
            })
            .build()
    }

    #[tokio::test]
    async fn test_teardown_is_idempotent_and_reports_once() -> HarnessResult<()> {
        LocalSet::new()
            .run_until(async {
                let scenario = scenario_with_frames(1);
                let backend = UhidBackend::default();
                let mut session = Session::create(&scenario, &backend, Privilege::Unprivileged)?;
                assert!(session.has_channel());

                let mut reporter = RecordingReporter::default();
                session.finish(Outcome::Pass, "", &mut reporter);
                session.finish(Outcome::Fail, "again", &mut reporter);
                session.teardown();

                assert!(session.is_torn_down());
                assert_eq!(reporter.report_count(), 1);
                assert_eq!(reporter.outcome(), Some(Outcome::Pass));
                assert!(session.handle_mut().is_err());
                Ok(())
            })
            .await
    }

    #[tokio::test]
    async fn test_cursor_never_passes_terminator() -> HarnessResult<()> {
        LocalSet::new()
            .run_until(async {
                let scenario = scenario_with_frames(2);
                let backend = UhidBackend::default();
                let mut session = Session::create(&scenario, &backend, Privilege::Unprivileged)?;

                session.verify_observed(&[0])?;
                session.verify_observed(&[1])?;
                assert!(session.is_exhausted());
                assert_eq!(session.cursor(), 2);
                assert!(matches!(session.advance(), Err(HarnessError::Script(_))));
                assert!(matches!(
                    session.verify_observed(&[2]),
                    Err(HarnessError::Protocol(_))
                ));
                assert_eq!(session.cursor(), 2);
                Ok(())
            })
            .await
    }

    #[tokio::test]
    async fn test_mismatch_does_not_advance() -> HarnessResult<()> {
        LocalSet::new()
            .run_until(async {
                let scenario = scenario_with_frames(1);
                let backend = UhidBackend::default();
                let mut session = Session::create(&scenario, &backend, Privilege::Unprivileged)?;
                assert!(matches!(
                    session.verify_observed(&[0, 0]),
                    Err(HarnessError::Protocol(_))
                ));
                assert_eq!(session.cursor(), 0);
                Ok(())
            })
            .await
    }

    #[tokio::test]
    async fn test_no_descriptor_always_uses_channel() -> HarnessResult<()> {
        LocalSet::new()
            .run_until(async {
                let scenario = scenario_with_frames(0);
                let backend = UhidBackend::with_device_path("/nonexistent/uhid");
                let session = Session::create(&scenario, &backend, Privilege::Elevated)?;
                assert!(session.has_channel());
                Ok(())
            })
            .await
    }

    #[tokio::test]
    async fn test_elevated_with_missing_backend_is_environment_error() {
        LocalSet::new()
            .run_until(async {
                let scenario = Scenario::active("/uhid/test/dev", Command::Create)
                    .device(Arc::new(DeviceDescriptor::new("dev")))
                    .build();
                let backend = UhidBackend::with_device_path("/nonexistent/uhid");
                let result = Session::create(&scenario, &backend, Privilege::Elevated);
                assert!(matches!(result, Err(HarnessError::Environment(_))));
            })
            .await;
    }
}
