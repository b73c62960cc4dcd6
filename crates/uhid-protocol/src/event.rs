//! Typed UHID events and their packed encodings.
//!
//! Outbound events (`CREATE2`, `DESTROY`, `INPUT2`, `GET_REPORT_REPLY`,
//! `SET_REPORT_REPLY`) flow from the device session to the kernel; inbound
//! events (`START`, `STOP`, `OPEN`, `CLOSE`, `OUTPUT`, `GET_REPORT`,
//! `SET_REPORT`) flow the other way. Both directions share one layout, so a
//! test peer can encode inbound events and decode outbound ones.

use std::fmt;

use crate::codec::{EventReader, EventWriter};
use crate::ids::{DATA_MAX, DESCRIPTOR_MAX, HEADER_SIZE, NAME_SIZE, PHYS_SIZE, UNIQ_SIZE, bus};
use crate::{ProtocolError, ProtocolResult};

/// `enum uhid_event_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum EventType {
    /// `__UHID_LEGACY_CREATE`, a.k.a. `UHID_CREATE`.
    LegacyCreate = 0,
    Destroy = 1,
    Start = 2,
    Stop = 3,
    Open = 4,
    Close = 5,
    Output = 6,
    /// `__UHID_LEGACY_OUTPUT_EV`.
    LegacyOutputEv = 7,
    /// `__UHID_LEGACY_INPUT`, a.k.a. `UHID_INPUT`.
    LegacyInput = 8,
    /// `UHID_GET_REPORT`, historically `UHID_FEATURE`.
    GetReport = 9,
    /// `UHID_GET_REPORT_REPLY`, historically `UHID_FEATURE_ANSWER`.
    GetReportReply = 10,
    Create2 = 11,
    Input2 = 12,
    SetReport = 13,
    SetReportReply = 14,
}

impl EventType {
    /// Alias kept for the older feature-request naming.
    pub const FEATURE: Self = Self::GetReport;
    /// Alias kept for the older feature-answer naming.
    pub const FEATURE_ANSWER: Self = Self::GetReportReply;

    pub const ALL: [EventType; 15] = [
        Self::LegacyCreate,
        Self::Destroy,
        Self::Start,
        Self::Stop,
        Self::Open,
        Self::Close,
        Self::Output,
        Self::LegacyOutputEv,
        Self::LegacyInput,
        Self::GetReport,
        Self::GetReportReply,
        Self::Create2,
        Self::Input2,
        Self::SetReport,
        Self::SetReportReply,
    ];

    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.raw() == raw)
    }

    pub fn raw(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::LegacyCreate => "CREATE",
            Self::Destroy => "DESTROY",
            Self::Start => "START",
            Self::Stop => "STOP",
            Self::Open => "OPEN",
            Self::Close => "CLOSE",
            Self::Output => "OUTPUT",
            Self::LegacyOutputEv => "OUTPUT_EV",
            Self::LegacyInput => "INPUT",
            Self::GetReport => "GET_REPORT",
            Self::GetReportReply => "GET_REPORT_REPLY",
            Self::Create2 => "CREATE2",
            Self::Input2 => "INPUT2",
            Self::SetReport => "SET_REPORT",
            Self::SetReportReply => "SET_REPORT_REPLY",
        }
    }

    /// Packed size of the union member this kind carries.
    pub fn payload_size(self) -> usize {
        match self {
            Self::Create2 => crate::ids::CREATE2_REQ_SIZE,
            Self::Start => 8,
            Self::Output => DATA_MAX + 2 + 1,
            Self::GetReport => 4 + 1 + 1,
            Self::GetReportReply => 4 + 2 + 2 + DATA_MAX,
            Self::Input2 => 2 + DATA_MAX,
            Self::SetReport => 4 + 1 + 1 + 2 + DATA_MAX,
            Self::SetReportReply => 4 + 2,
            Self::LegacyCreate
            | Self::Destroy
            | Self::Stop
            | Self::Open
            | Self::Close
            | Self::LegacyOutputEv
            | Self::LegacyInput => 0,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `struct uhid_create2_req`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Create2Request {
    pub name: String,
    pub phys: String,
    pub uniq: String,
    pub bus: u16,
    pub vendor: u32,
    pub product: u32,
    pub version: u32,
    pub country: u32,
    pub rd_data: Vec<u8>,
}

impl Default for Create2Request {
    fn default() -> Self {
        Self {
            name: String::new(),
            phys: String::new(),
            uniq: String::new(),
            bus: bus::BLUETOOTH,
            vendor: 0,
            product: 0,
            version: 0,
            country: 0,
            rd_data: Vec::new(),
        }
    }
}

/// `struct uhid_output_req`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputRequest {
    pub data: Vec<u8>,
    pub rtype: u8,
}

/// `struct uhid_get_report_req`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetReportRequest {
    pub id: u32,
    pub rnum: u8,
    pub rtype: u8,
}

/// `struct uhid_get_report_reply_req`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetReportReply {
    pub id: u32,
    pub err: u16,
    pub data: Vec<u8>,
}

/// `struct uhid_input2_req`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Input2Request {
    pub data: Vec<u8>,
}

/// `struct uhid_set_report_req`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetReportRequest {
    pub id: u32,
    pub rnum: u8,
    pub rtype: u8,
    pub data: Vec<u8>,
}

/// `struct uhid_set_report_reply_req`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetReportReply {
    pub id: u32,
    pub err: u16,
}

/// One decoded `struct uhid_event`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UhidEvent {
    Create2(Create2Request),
    Destroy,
    Start { dev_flags: u64 },
    Stop,
    Open,
    Close,
    Output(OutputRequest),
    GetReport(GetReportRequest),
    GetReportReply(GetReportReply),
    Input2(Input2Request),
    SetReport(SetReportRequest),
    SetReportReply(SetReportReply),
    /// A deprecated kind whose payload is not interpreted.
    Legacy(EventType),
}

impl UhidEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::Create2(_) => EventType::Create2,
            Self::Destroy => EventType::Destroy,
            Self::Start { .. } => EventType::Start,
            Self::Stop => EventType::Stop,
            Self::Open => EventType::Open,
            Self::Close => EventType::Close,
            Self::Output(_) => EventType::Output,
            Self::GetReport(_) => EventType::GetReport,
            Self::GetReportReply(_) => EventType::GetReportReply,
            Self::Input2(_) => EventType::Input2,
            Self::SetReport(_) => EventType::SetReport,
            Self::SetReportReply(_) => EventType::SetReportReply,
            Self::Legacy(kind) => *kind,
        }
    }

    /// An event of `kind` with every payload field zeroed, as a
    /// zero-initialised `struct uhid_event` with only `type` set would encode.
    pub fn zeroed(kind: EventType) -> Self {
        match kind {
            EventType::Create2 => Self::Create2(Create2Request {
                bus: 0,
                ..Create2Request::default()
            }),
            EventType::Destroy => Self::Destroy,
            EventType::Start => Self::Start { dev_flags: 0 },
            EventType::Stop => Self::Stop,
            EventType::Open => Self::Open,
            EventType::Close => Self::Close,
            EventType::Output => Self::Output(OutputRequest::default()),
            EventType::GetReport => Self::GetReport(GetReportRequest::default()),
            EventType::GetReportReply => Self::GetReportReply(GetReportReply::default()),
            EventType::Input2 => Self::Input2(Input2Request::default()),
            EventType::SetReport => Self::SetReport(SetReportRequest::default()),
            EventType::SetReportReply => Self::SetReportReply(SetReportReply::default()),
            EventType::LegacyCreate | EventType::LegacyOutputEv | EventType::LegacyInput => {
                Self::Legacy(kind)
            }
        }
    }

    /// Encodes the event at the full `struct uhid_event` size.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        let mut w = EventWriter::new();
        w.write_u32(self.event_type().raw());

        match self {
            Self::Create2(req) => {
                w.write_cstr(&req.name, NAME_SIZE)
                    .write_cstr(&req.phys, PHYS_SIZE)
                    .write_cstr(&req.uniq, UNIQ_SIZE)
                    .write_u16(size_field("rd_data", req.rd_data.len(), DESCRIPTOR_MAX)?)
                    .write_u16(req.bus)
                    .write_u32(req.vendor)
                    .write_u32(req.product)
                    .write_u32(req.version)
                    .write_u32(req.country)
                    .write_padded("rd_data", &req.rd_data, DESCRIPTOR_MAX)?;
            }
            Self::Start { dev_flags } => {
                w.write_u64(*dev_flags);
            }
            Self::Output(req) => {
                let size = size_field("data", req.data.len(), DATA_MAX)?;
                w.write_padded("data", &req.data, DATA_MAX)?
                    .write_u16(size)
                    .write_u8(req.rtype);
            }
            Self::GetReport(req) => {
                w.write_u32(req.id).write_u8(req.rnum).write_u8(req.rtype);
            }
            Self::GetReportReply(req) => {
                w.write_u32(req.id)
                    .write_u16(req.err)
                    .write_u16(size_field("data", req.data.len(), DATA_MAX)?)
                    .write_padded("data", &req.data, DATA_MAX)?;
            }
            Self::Input2(req) => {
                w.write_u16(size_field("data", req.data.len(), DATA_MAX)?)
                    .write_padded("data", &req.data, DATA_MAX)?;
            }
            Self::SetReport(req) => {
                w.write_u32(req.id)
                    .write_u8(req.rnum)
                    .write_u8(req.rtype)
                    .write_u16(size_field("data", req.data.len(), DATA_MAX)?)
                    .write_padded("data", &req.data, DATA_MAX)?;
            }
            Self::SetReportReply(req) => {
                w.write_u32(req.id).write_u16(req.err);
            }
            Self::Destroy | Self::Stop | Self::Open | Self::Close | Self::Legacy(_) => {}
        }

        Ok(w.finish())
    }

    /// Decodes one frame. Trailing bytes past the kind's payload are ignored,
    /// so both full-size and minimal frames are accepted.
    pub fn decode(frame: &[u8]) -> ProtocolResult<Self> {
        let event_type = peek_event_type(frame)?;
        let needed = HEADER_SIZE + event_type.payload_size();
        let truncated = || ProtocolError::Truncated {
            event_type,
            needed,
            actual: frame.len(),
        };
        if frame.len() < needed {
            return Err(truncated());
        }

        let mut r = EventReader::new(frame.get(HEADER_SIZE..).unwrap_or_default());

        let event = match event_type {
            EventType::Create2 => {
                let name = r.read_cstr(NAME_SIZE).ok_or_else(truncated)?;
                let phys = r.read_cstr(PHYS_SIZE).ok_or_else(truncated)?;
                let uniq = r.read_cstr(UNIQ_SIZE).ok_or_else(truncated)?;
                let rd_size = checked_size("rd_size", r.read_u16(), DESCRIPTOR_MAX)
                    .ok_or_else(truncated)??;
                let bus = r.read_u16().ok_or_else(truncated)?;
                let vendor = r.read_u32().ok_or_else(truncated)?;
                let product = r.read_u32().ok_or_else(truncated)?;
                let version = r.read_u32().ok_or_else(truncated)?;
                let country = r.read_u32().ok_or_else(truncated)?;
                let rd_data = r.read_bytes(DESCRIPTOR_MAX).ok_or_else(truncated)?;
                Self::Create2(Create2Request {
                    name,
                    phys,
                    uniq,
                    bus,
                    vendor,
                    product,
                    version,
                    country,
                    rd_data: rd_data.get(..rd_size).unwrap_or_default().to_vec(),
                })
            }
            EventType::Start => Self::Start {
                dev_flags: r.read_u64().ok_or_else(truncated)?,
            },
            EventType::Output => {
                let data = r.read_bytes(DATA_MAX).ok_or_else(truncated)?;
                let size =
                    checked_size("size", r.read_u16(), DATA_MAX).ok_or_else(truncated)??;
                let rtype = r.read_u8().ok_or_else(truncated)?;
                Self::Output(OutputRequest {
                    data: data.get(..size).unwrap_or_default().to_vec(),
                    rtype,
                })
            }
            EventType::GetReport => Self::GetReport(GetReportRequest {
                id: r.read_u32().ok_or_else(truncated)?,
                rnum: r.read_u8().ok_or_else(truncated)?,
                rtype: r.read_u8().ok_or_else(truncated)?,
            }),
            EventType::GetReportReply => {
                let id = r.read_u32().ok_or_else(truncated)?;
                let err = r.read_u16().ok_or_else(truncated)?;
                let size =
                    checked_size("size", r.read_u16(), DATA_MAX).ok_or_else(truncated)??;
                let data = r.read_bytes(DATA_MAX).ok_or_else(truncated)?;
                Self::GetReportReply(GetReportReply {
                    id,
                    err,
                    data: data.get(..size).unwrap_or_default().to_vec(),
                })
            }
            EventType::Input2 => {
                let size =
                    checked_size("size", r.read_u16(), DATA_MAX).ok_or_else(truncated)??;
                let data = r.read_bytes(DATA_MAX).ok_or_else(truncated)?;
                Self::Input2(Input2Request {
                    data: data.get(..size).unwrap_or_default().to_vec(),
                })
            }
            EventType::SetReport => {
                let id = r.read_u32().ok_or_else(truncated)?;
                let rnum = r.read_u8().ok_or_else(truncated)?;
                let rtype = r.read_u8().ok_or_else(truncated)?;
                let size =
                    checked_size("size", r.read_u16(), DATA_MAX).ok_or_else(truncated)??;
                let data = r.read_bytes(DATA_MAX).ok_or_else(truncated)?;
                Self::SetReport(SetReportRequest {
                    id,
                    rnum,
                    rtype,
                    data: data.get(..size).unwrap_or_default().to_vec(),
                })
            }
            EventType::SetReportReply => Self::SetReportReply(SetReportReply {
                id: r.read_u32().ok_or_else(truncated)?,
                err: r.read_u16().ok_or_else(truncated)?,
            }),
            EventType::Destroy => Self::Destroy,
            EventType::Stop => Self::Stop,
            EventType::Open => Self::Open,
            EventType::Close => Self::Close,
            EventType::LegacyCreate | EventType::LegacyOutputEv | EventType::LegacyInput => {
                Self::Legacy(event_type)
            }
        };

        Ok(event)
    }
}

/// Reads the event-kind tag of a frame without decoding its payload.
pub fn peek_event_type(frame: &[u8]) -> ProtocolResult<EventType> {
    let raw = EventReader::new(frame)
        .read_u32()
        .ok_or(ProtocolError::MissingHeader(frame.len()))?;
    EventType::from_raw(raw).ok_or(ProtocolError::UnknownEventType(raw))
}

fn size_field(field: &'static str, len: usize, max: usize) -> ProtocolResult<u16> {
    if len > max {
        return Err(ProtocolError::PayloadTooLarge { field, len, max });
    }
    u16::try_from(len).map_err(|_| ProtocolError::PayloadTooLarge { field, len, max })
}

fn checked_size(
    field: &'static str,
    raw: Option<u16>,
    max: usize,
) -> Option<ProtocolResult<usize>> {
    let size = usize::from(raw?);
    Some(if size > max {
        Err(ProtocolError::InvalidSize { field, size, max })
    } else {
        Ok(size)
    })
}
