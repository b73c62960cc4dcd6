//! UHID constants and fixed field sizes from `linux/uhid.h`.

/// Size of the `name` field of a CREATE2 request.
pub const NAME_SIZE: usize = 128;
/// Size of the `phys` field of a CREATE2 request.
pub const PHYS_SIZE: usize = 64;
/// Size of the `uniq` field of a CREATE2 request.
pub const UNIQ_SIZE: usize = 64;

/// Largest report payload carried by a single event (`UHID_DATA_MAX`).
pub const DATA_MAX: usize = 4096;
/// Largest HID report descriptor accepted by CREATE2 (`HID_MAX_DESCRIPTOR_SIZE`).
pub const DESCRIPTOR_MAX: usize = 4096;

/// Size of the event-kind tag preceding every payload.
pub const HEADER_SIZE: usize = 4;

/// Packed size of `struct uhid_create2_req`, the largest union member.
pub const CREATE2_REQ_SIZE: usize = NAME_SIZE + PHYS_SIZE + UNIQ_SIZE + 2 + 2 + 4 * 4 + DESCRIPTOR_MAX;

/// Size of the payload union. The legacy `uhid_create_req` member carries a
/// pointer, so the union is padded to 8-byte alignment.
pub const UNION_SIZE: usize = CREATE2_REQ_SIZE.next_multiple_of(8);

/// Size of `struct uhid_event`, as the kernel reads and writes it.
pub const EVENT_SIZE: usize = HEADER_SIZE + UNION_SIZE;

/// Bus types reported in CREATE2 (`linux/input.h`).
pub mod bus {
    pub const BLUETOOTH: u16 = 0x05;
}

/// `enum uhid_report_type`.
pub mod report_type {
    pub const FEATURE: u8 = 0;
    pub const OUTPUT: u8 = 1;
    pub const INPUT: u8 = 2;
}
