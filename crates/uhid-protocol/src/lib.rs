//! Linux UHID wire format: event kinds, request layouts, encoding and decoding.
//!
//! This crate is I/O-free. It mirrors the packed `struct uhid_event` from
//! `linux/uhid.h` so callers can build byte-exact frames for a `/dev/uhid`
//! style channel and route inbound frames by their event-kind tag.
//!
//! Every encoded event occupies the full [`EVENT_SIZE`] bytes, which is also
//! the read buffer size peers should use.

#![deny(static_mut_refs)]
#![deny(clippy::unwrap_used)]

pub mod codec;
pub mod event;
pub mod ids;

pub use codec::{EventReader, EventWriter};
pub use event::{
    Create2Request, EventType, GetReportReply, GetReportRequest, Input2Request, OutputRequest,
    SetReportReply, SetReportRequest, UhidEvent, peek_event_type,
};
pub use ids::{
    CREATE2_REQ_SIZE, DATA_MAX, DESCRIPTOR_MAX, EVENT_SIZE, NAME_SIZE, PHYS_SIZE, UNIQ_SIZE,
    UNION_SIZE, bus, report_type,
};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Frame too short for event header: {0} bytes")]
    MissingHeader(usize),

    #[error("Unknown UHID event type: {0}")]
    UnknownEventType(u32),

    #[error("Truncated {event_type} event: need {needed} bytes, got {actual}")]
    Truncated {
        event_type: EventType,
        needed: usize,
        actual: usize,
    },

    #[error("{field} of {len} bytes exceeds the {max}-byte limit")]
    PayloadTooLarge {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("Declared {field} size {size} exceeds the {max}-byte limit")]
    InvalidSize {
        field: &'static str,
        size: usize,
        max: usize,
    },
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtocolError::UnknownEventType(99);
        assert_eq!(err.to_string(), "Unknown UHID event type: 99");

        let err = ProtocolError::Truncated {
            event_type: EventType::Output,
            needed: 4103,
            actual: 8,
        };
        assert_eq!(
            err.to_string(),
            "Truncated OUTPUT event: need 4103 bytes, got 8"
        );
    }
}
