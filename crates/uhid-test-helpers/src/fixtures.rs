//! Encoded frames shared by test suites.

use uhid_protocol::{Create2Request, EventType, ProtocolResult, UhidEvent, bus};

/// Encoded zero-initialised event of `kind`.
///
/// # Errors
///
/// Propagates encoder errors.
pub fn zeroed_frame(kind: EventType) -> ProtocolResult<Vec<u8>> {
    UhidEvent::zeroed(kind).encode()
}

/// Encoded CREATE2 event for a device named `name`, as a session sends it
/// with otherwise default parameters.
///
/// # Errors
///
/// Propagates encoder errors.
pub fn create_frame(name: &str, report_map: &[u8]) -> ProtocolResult<Vec<u8>> {
    UhidEvent::Create2(Create2Request {
        name: name.to_owned(),
        bus: bus::BLUETOOTH,
        rd_data: report_map.to_vec(),
        ..Create2Request::default()
    })
    .encode()
}

/// A short boot-mouse report map.
pub const BOOT_MOUSE_MAP: &[u8] = &[
    0x05, 0x01, 0x09, 0x02, 0xa1, 0x01, 0x09, 0x01, 0xa1, 0x00, 0x05, 0x09, 0x19, 0x01, 0x29, 0x03,
    0x15, 0x00, 0x25, 0x01, 0x95, 0x03, 0x75, 0x01, 0x81, 0x02, 0x95, 0x01, 0x75, 0x05, 0x81, 0x01,
    0x05, 0x01, 0x09, 0x30, 0x09, 0x31, 0x15, 0x81, 0x25, 0x7f, 0x75, 0x08, 0x95, 0x02, 0x81, 0x06,
    0xc0, 0xc0,
];
