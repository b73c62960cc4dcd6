//! Device session trait and its UHID implementation.

use std::cell::RefCell;
use std::rc::Rc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uhid_protocol::{
    Create2Request, DATA_MAX, EVENT_SIZE, EventType, Input2Request, UhidEvent, bus,
};

use crate::endpoint::Endpoint;
use crate::error::{SessionError, SessionResult};
use crate::handlers::{EventHandler, HandlerId, HandlerTable};

/// Kind of input device a session emulates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    #[default]
    None,
    Keyboard,
    Mouse,
    Gaming,
    Tablet,
}

impl DeviceType {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceType::None => "none",
            DeviceType::Keyboard => "keyboard",
            DeviceType::Mouse => "mouse",
            DeviceType::Gaming => "gaming",
            DeviceType::Tablet => "tablet",
        }
    }
}

/// Arguments of a create command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateParams {
    pub name: String,
    /// Local adapter address, reported as `phys`.
    pub source: Option<String>,
    /// Remote device address, reported as `uniq`.
    pub destination: Option<String>,
    pub vendor: u32,
    pub product: u32,
    pub version: u32,
    pub country: u32,
    pub device_type: DeviceType,
    pub report_map: Vec<u8>,
}

impl CreateParams {
    fn to_event(&self) -> UhidEvent {
        UhidEvent::Create2(Create2Request {
            name: self.name.clone(),
            phys: self.source.clone().unwrap_or_default(),
            uniq: self.destination.clone().unwrap_or_default(),
            bus: bus::BLUETOOTH,
            vendor: self.vendor,
            product: self.product,
            version: self.version,
            country: self.country,
            rd_data: self.report_map.clone(),
        })
    }
}

/// Public API of a device session, as consumed by a test harness.
///
/// Every command returns `Err` where the C API would return a negative
/// errno; [`SessionError::errno`] recovers that value.
#[async_trait(?Send)]
pub trait DeviceSession {
    /// Announces the device with a CREATE2 event. A no-op once created.
    async fn create(&mut self, params: &CreateParams) -> SessionResult<()>;

    /// Tears the device down. With `notify` a DESTROY event is written;
    /// without it only local state is reset. A no-op when not created.
    async fn destroy(&mut self, notify: bool) -> SessionResult<()>;

    /// Writes an arbitrary event.
    async fn send(&mut self, event: &UhidEvent) -> SessionResult<()>;

    /// Sends an INPUT2 report. A non-zero `number` is prepended as report ID.
    async fn input(&mut self, number: u8, data: &[u8]) -> SessionResult<()>;

    fn register(&mut self, kind: EventType, handler: EventHandler) -> HandlerId;

    fn unregister(&mut self, id: HandlerId) -> bool;

    fn unregister_all(&mut self);

    /// Stops inbound processing and drops the transport. Idempotent.
    fn release(&mut self);

    fn is_created(&self) -> bool;
}

/// UHID session over an [`Endpoint`].
pub struct UhidSession {
    endpoint: Option<Rc<Endpoint>>,
    handlers: Rc<RefCell<HandlerTable>>,
    reader: Option<JoinHandle<()>>,
    created: bool,
    device_type: DeviceType,
}

impl UhidSession {
    /// Binds a session to `endpoint` and starts the inbound reader.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio `LocalSet`, since the reader is a
    /// local task.
    pub fn new(endpoint: Endpoint) -> Self {
        let endpoint = Rc::new(endpoint);
        let handlers = Rc::new(RefCell::new(HandlerTable::new()));
        let reader = tokio::task::spawn_local(read_loop(
            Rc::clone(&endpoint),
            Rc::clone(&handlers),
        ));
        Self {
            endpoint: Some(endpoint),
            handlers,
            reader: Some(reader),
            created: false,
            device_type: DeviceType::None,
        }
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.borrow().len()
    }

    pub fn is_released(&self) -> bool {
        self.endpoint.is_none()
    }

    async fn write_event(&self, event: &UhidEvent) -> SessionResult<()> {
        let endpoint = self.endpoint.as_ref().ok_or(SessionError::Released)?;
        let frame = event.encode()?;
        let written = endpoint.send(&frame).await?;
        debug!(event = %event.event_type(), written, "uhid send");
        if written < frame.len() {
            return Err(SessionError::ShortWrite {
                written,
                expected: frame.len(),
            });
        }
        Ok(())
    }
}

#[async_trait(?Send)]
impl DeviceSession for UhidSession {
    async fn create(&mut self, params: &CreateParams) -> SessionResult<()> {
        if self.created {
            return Ok(());
        }
        self.write_event(&params.to_event()).await?;
        self.created = true;
        self.device_type = params.device_type;
        debug!(
            name = %params.name,
            vendor = params.vendor,
            product = params.product,
            device_type = params.device_type.as_str(),
            "uhid device created"
        );
        Ok(())
    }

    async fn destroy(&mut self, notify: bool) -> SessionResult<()> {
        if !self.created {
            return Ok(());
        }
        if notify {
            self.write_event(&UhidEvent::Destroy).await?;
        }
        self.created = false;
        Ok(())
    }

    async fn send(&mut self, event: &UhidEvent) -> SessionResult<()> {
        self.write_event(event).await
    }

    async fn input(&mut self, number: u8, data: &[u8]) -> SessionResult<()> {
        if !self.created {
            return Err(SessionError::NotCreated);
        }
        let mut report = Vec::with_capacity(data.len() + 1);
        if number != 0 {
            report.push(number);
        }
        report.extend_from_slice(data);
        if report.len() > DATA_MAX {
            return Err(uhid_protocol::ProtocolError::PayloadTooLarge {
                field: "data",
                len: report.len(),
                max: DATA_MAX,
            }
            .into());
        }
        self.write_event(&UhidEvent::Input2(Input2Request { data: report }))
            .await
    }

    fn register(&mut self, kind: EventType, handler: EventHandler) -> HandlerId {
        self.handlers.borrow_mut().register(kind, handler)
    }

    fn unregister(&mut self, id: HandlerId) -> bool {
        self.handlers.borrow_mut().unregister(id)
    }

    fn unregister_all(&mut self) {
        self.handlers.borrow_mut().clear();
    }

    fn release(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.handlers.borrow_mut().clear();
        if self.endpoint.take().is_some() {
            debug!("uhid session released");
        }
        self.created = false;
    }

    fn is_created(&self) -> bool {
        self.created
    }
}

impl Drop for UhidSession {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

async fn read_loop(endpoint: Rc<Endpoint>, handlers: Rc<RefCell<HandlerTable>>) {
    // One spare byte so an oversized datagram is seen as such, not truncated.
    let mut buf = vec![0u8; EVENT_SIZE + 1];
    loop {
        let len = match endpoint.recv(&mut buf).await {
            Ok(0) => {
                debug!("uhid endpoint closed");
                return;
            }
            Ok(len) if len > EVENT_SIZE => {
                warn!(len, "dropping oversized uhid event");
                continue;
            }
            Ok(len) => len,
            Err(e) => {
                warn!(error = %e, "uhid read failed");
                return;
            }
        };

        let frame = buf.get(..len).unwrap_or_default();
        match UhidEvent::decode(frame) {
            Ok(event) => {
                let fired = handlers.borrow_mut().dispatch(&event);
                if fired == 0 {
                    debug!(event = %event.event_type(), "no handler registered");
                }
            }
            Err(e) => warn!(error = %e, len, "dropping undecodable uhid event"),
        }
    }
}
