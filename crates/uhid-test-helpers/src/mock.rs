//! Recording device sessions and backends.
//!
//! A [`MockSession`] records every call into a shared [`CallLog`] and can be
//! told to fail one command. It either stands alone or wraps a real session,
//! forwarding the calls it does not fail so frames still reach the wire.
//!
//! A standalone mock can also write scripted raw frames on create, and a
//! [`MockBackend`] can record every frame that arrives at the device end.

use std::cell::{Cell, RefCell};
use std::io;
use std::rc::Rc;

use async_trait::async_trait;
use tokio::net::UnixDatagram;
use uhid_protocol::{EVENT_SIZE, EventType, UhidEvent};
use uhid_session::handlers::HandlerTable;
use uhid_session::{
    CreateParams, DeviceSession, EventHandler, HandlerId, SessionBackend, SessionError,
    SessionResult, UhidBackend,
};

/// One call observed by a [`MockSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Create { name: String },
    Destroy { notify: bool },
    Send(EventType),
    Input { number: u8, len: usize },
    Register(EventType),
    Unregister(HandlerId),
    UnregisterAll,
    Release,
}

/// Commands that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockCommand {
    Create,
    Destroy,
    Send,
    Input,
}

/// Shared, cloneable view of the calls a mock received.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Rc<RefCell<Vec<MockCall>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, call: MockCall) {
        self.calls.borrow_mut().push(call);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.borrow().clone()
    }

    pub fn contains(&self, call: &MockCall) -> bool {
        self.calls.borrow().contains(call)
    }

    pub fn count(&self, pred: impl Fn(&MockCall) -> bool) -> usize {
        self.calls.borrow().iter().filter(|call| pred(call)).count()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }
}

/// Raw frames received at the device end, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct FrameLog {
    frames: Rc<RefCell<Vec<Vec<u8>>>>,
}

impl FrameLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, frame: Vec<u8>) {
        self.frames.borrow_mut().push(frame);
    }

    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.frames.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.frames.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.borrow().is_empty()
    }

    /// Waits until at least `count` frames arrived, giving up after `limit`.
    pub async fn wait_for(&self, count: usize, limit: std::time::Duration) -> bool {
        tokio::time::timeout(limit, async {
            while self.len() < count {
                tokio::task::yield_now().await;
            }
        })
        .await
        .is_ok()
    }
}

async fn record_frames(endpoint: Rc<UnixDatagram>, log: FrameLog) {
    let mut buf = vec![0u8; EVENT_SIZE * 2];
    while let Ok(len) = endpoint.recv(&mut buf).await {
        log.push(buf.get(..len).unwrap_or_default().to_vec());
    }
}

pub struct MockSession {
    log: CallLog,
    fail_on: Option<MockCommand>,
    inner: Option<Box<dyn DeviceSession>>,
    handlers: HandlerTable,
    created: bool,
    released: bool,
    endpoint: Option<Rc<UnixDatagram>>,
    outbound: Vec<Vec<u8>>,
}

impl MockSession {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            fail_on: None,
            inner: None,
            handlers: HandlerTable::new(),
            created: false,
            released: false,
            endpoint: None,
            outbound: Vec::new(),
        }
    }

    /// Forwards non-failing calls to `inner`.
    pub fn wrapping(log: CallLog, inner: Box<dyn DeviceSession>) -> Self {
        Self {
            inner: Some(inner),
            ..Self::new(log)
        }
    }

    pub fn failing_on(mut self, command: MockCommand) -> Self {
        self.fail_on = Some(command);
        self
    }

    /// Keeps `endpoint` open for the lifetime of the mock.
    pub fn holding(mut self, endpoint: Rc<UnixDatagram>) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Raw frames written to the held endpoint by a successful create.
    pub fn writing_on_create(mut self, frames: Vec<Vec<u8>>) -> Self {
        self.outbound = frames;
        self
    }

    /// Dispatches `event` to the locally registered handlers.
    pub fn inject(&mut self, event: &UhidEvent) -> usize {
        self.handlers.dispatch(event)
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    fn check(&self, command: MockCommand) -> SessionResult<()> {
        if self.released {
            return Err(SessionError::Released);
        }
        if self.fail_on == Some(command) {
            return Err(SessionError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("mock {command:?} failure"),
            )));
        }
        Ok(())
    }
}

#[async_trait(?Send)]
impl DeviceSession for MockSession {
    async fn create(&mut self, params: &CreateParams) -> SessionResult<()> {
        self.log.push(MockCall::Create {
            name: params.name.clone(),
        });
        self.check(MockCommand::Create)?;
        if let Some(inner) = self.inner.as_mut() {
            inner.create(params).await?;
        }
        if let Some(endpoint) = self.endpoint.as_ref() {
            for frame in self.outbound.drain(..) {
                endpoint.send(&frame).await?;
            }
        }
        self.created = true;
        Ok(())
    }

    async fn destroy(&mut self, notify: bool) -> SessionResult<()> {
        self.log.push(MockCall::Destroy { notify });
        self.check(MockCommand::Destroy)?;
        if let Some(inner) = self.inner.as_mut() {
            inner.destroy(notify).await?;
        }
        self.created = false;
        Ok(())
    }

    async fn send(&mut self, event: &UhidEvent) -> SessionResult<()> {
        self.log.push(MockCall::Send(event.event_type()));
        self.check(MockCommand::Send)?;
        if let Some(inner) = self.inner.as_mut() {
            inner.send(event).await?;
        }
        Ok(())
    }

    async fn input(&mut self, number: u8, data: &[u8]) -> SessionResult<()> {
        self.log.push(MockCall::Input {
            number,
            len: data.len(),
        });
        self.check(MockCommand::Input)?;
        if let Some(inner) = self.inner.as_mut() {
            inner.input(number, data).await?;
        }
        Ok(())
    }

    fn register(&mut self, kind: EventType, handler: EventHandler) -> HandlerId {
        self.log.push(MockCall::Register(kind));
        match self.inner.as_mut() {
            Some(inner) => inner.register(kind, handler),
            None => self.handlers.register(kind, handler),
        }
    }

    fn unregister(&mut self, id: HandlerId) -> bool {
        self.log.push(MockCall::Unregister(id));
        match self.inner.as_mut() {
            Some(inner) => inner.unregister(id),
            None => self.handlers.unregister(id),
        }
    }

    fn unregister_all(&mut self) {
        self.log.push(MockCall::UnregisterAll);
        self.handlers.clear();
        if let Some(inner) = self.inner.as_mut() {
            inner.unregister_all();
        }
    }

    fn release(&mut self) {
        self.log.push(MockCall::Release);
        self.released = true;
        self.created = false;
        self.endpoint = None;
        if let Some(inner) = self.inner.as_mut() {
            inner.release();
        }
    }

    fn is_created(&self) -> bool {
        self.created
    }
}

/// Backend handing out [`MockSession`]s and counting how it was used.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    log: CallLog,
    fail_on: Option<MockCommand>,
    forward: bool,
    open_default_fails: bool,
    disconnected: bool,
    outbound: Vec<Vec<u8>>,
    inbound: Option<FrameLog>,
    attached: Rc<Cell<usize>>,
    opened: Rc<Cell<usize>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions wrap a real session, so frames reach the channel.
    pub fn forwarding(mut self) -> Self {
        self.forward = true;
        self
    }

    pub fn failing_on(mut self, command: MockCommand) -> Self {
        self.fail_on = Some(command);
        self
    }

    pub fn without_device(mut self) -> Self {
        self.open_default_fails = true;
        self
    }

    /// Attached sessions drop their endpoint, so the harness side sees a
    /// dead peer.
    pub fn disconnected(mut self) -> Self {
        self.disconnected = true;
        self
    }

    /// Attached sessions write `frames` verbatim when created.
    pub fn writing_on_create(mut self, frames: Vec<Vec<u8>>) -> Self {
        self.outbound = frames;
        self
    }

    /// Records every frame the harness writes towards attached sessions.
    pub fn recording(mut self) -> Self {
        self.inbound = Some(FrameLog::new());
        self
    }

    /// Frames recorded by [`MockBackend::recording`]; empty otherwise.
    pub fn inbound(&self) -> FrameLog {
        self.inbound.clone().unwrap_or_default()
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }

    pub fn attach_count(&self) -> usize {
        self.attached.get()
    }

    pub fn open_default_count(&self) -> usize {
        self.opened.get()
    }

    fn session(&self, inner: Option<Box<dyn DeviceSession>>) -> MockSession {
        let session = match inner {
            Some(inner) => MockSession::wrapping(self.log.clone(), inner),
            None => MockSession::new(self.log.clone()),
        };
        match self.fail_on {
            Some(command) => session.failing_on(command),
            None => session,
        }
    }
}

impl SessionBackend for MockBackend {
    fn attach(&self, endpoint: UnixDatagram) -> SessionResult<Box<dyn DeviceSession>> {
        self.attached.set(self.attached.get().saturating_add(1));
        if self.forward {
            let inner = UhidBackend::default().attach(endpoint)?;
            return Ok(Box::new(self.session(Some(inner))));
        }
        if self.disconnected {
            drop(endpoint);
            return Ok(Box::new(self.session(None)));
        }
        let endpoint = Rc::new(endpoint);
        if let Some(log) = self.inbound.clone() {
            // Detached so frames still queued at teardown are drained.
            tokio::task::spawn_local(record_frames(Rc::clone(&endpoint), log));
        }
        Ok(Box::new(
            self.session(None)
                .holding(endpoint)
                .writing_on_create(self.outbound.clone()),
        ))
    }

    fn open_default(&self) -> SessionResult<Box<dyn DeviceSession>> {
        self.opened.set(self.opened.get().saturating_add(1));
        if self.open_default_fails {
            return Err(SessionError::BackendUnavailable {
                path: "/dev/uhid".into(),
                source: io::Error::from(io::ErrorKind::NotFound),
            });
        }
        Ok(Box::new(self.session(None)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_and_fails_on_command() {
        let log = CallLog::new();
        let mut session = MockSession::new(log.clone()).failing_on(MockCommand::Destroy);

        assert!(session.create(&CreateParams::default()).await.is_ok());
        assert!(session.destroy(true).await.is_err());
        assert!(session.is_created());
        assert_eq!(
            log.calls(),
            vec![
                MockCall::Create {
                    name: String::new()
                },
                MockCall::Destroy { notify: true },
            ]
        );
    }

    #[tokio::test]
    async fn test_inject_dispatches_to_local_handlers() {
        let mut session = MockSession::new(CallLog::new());
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        session.register(
            EventType::Output,
            Box::new(move |_| counter.set(counter.get() + 1)),
        );

        assert_eq!(session.inject(&UhidEvent::zeroed(EventType::Output)), 1);
        assert_eq!(session.inject(&UhidEvent::zeroed(EventType::FEATURE)), 0);
        assert_eq!(hits.get(), 1);
    }

    #[tokio::test]
    async fn test_commands_after_release_fail() {
        let mut session = MockSession::new(CallLog::new());
        session.release();
        assert!(matches!(
            session.input(0, &[]).await,
            Err(SessionError::Released)
        ));
    }

    #[test]
    fn test_backend_counts_paths() {
        let backend = MockBackend::new().without_device();
        assert!(backend.open_default().is_err());
        assert_eq!(backend.open_default_count(), 1);
        assert_eq!(backend.attach_count(), 0);
    }

    #[tokio::test]
    async fn test_backend_writes_and_records_raw_frames() -> std::io::Result<()> {
        tokio::task::LocalSet::new()
            .run_until(async {
                let backend = MockBackend::new()
                    .recording()
                    .writing_on_create(vec![vec![1, 2, 3]]);
                let (harness, device) = UnixDatagram::pair()?;
                let mut session = backend
                    .attach(device)
                    .map_err(|e| std::io::Error::other(e.to_string()))?;

                assert!(session.create(&CreateParams::default()).await.is_ok());
                let mut buf = [0u8; 8];
                assert_eq!(harness.recv(&mut buf).await?, 3);

                harness.send(&[7]).await?;
                harness.send(&[8, 9]).await?;
                let inbound = backend.inbound();
                assert!(inbound.wait_for(2, std::time::Duration::from_secs(1)).await);
                assert_eq!(inbound.frames(), vec![vec![7], vec![8, 9]]);
                Ok(())
            })
            .await
    }
}
