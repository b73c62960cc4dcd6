//! Cursor helpers for the packed, little-endian UHID layouts.
//!
//! The kernel uses host byte order; every target this crate supports is
//! little-endian.

use crate::ids::EVENT_SIZE;
use crate::{ProtocolError, ProtocolResult};

/// Bounds-checked reader over one inbound frame.
pub struct EventReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> EventReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Returns `None` once the frame is exhausted; callers check the total
    /// length up front and map this to [`ProtocolError::Truncated`].
    pub fn read_bytes(&mut self, count: usize) -> Option<&'a [u8]> {
        let end = self.position.checked_add(count)?;
        let slice = self.buffer.get(self.position..end)?;
        self.position = end;
        Some(slice)
    }

    pub fn read_u8(&mut self) -> Option<u8> {
        self.read_bytes(1).and_then(|b| b.first().copied())
    }

    pub fn read_u16(&mut self) -> Option<u16> {
        let bytes = self.read_bytes(2)?;
        Some(u16::from_le_bytes([*bytes.first()?, *bytes.get(1)?]))
    }

    pub fn read_u32(&mut self) -> Option<u32> {
        let bytes: [u8; 4] = self.read_bytes(4)?.try_into().ok()?;
        Some(u32::from_le_bytes(bytes))
    }

    pub fn read_u64(&mut self) -> Option<u64> {
        let bytes: [u8; 8] = self.read_bytes(8)?.try_into().ok()?;
        Some(u64::from_le_bytes(bytes))
    }

    /// Reads a fixed-width, NUL-padded string field.
    pub fn read_cstr(&mut self, width: usize) -> Option<String> {
        let raw = self.read_bytes(width)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Some(String::from_utf8_lossy(raw.get(..end)?).into_owned())
    }
}

/// Builder for one outbound frame, zero-padded to [`EVENT_SIZE`] on finish.
pub struct EventWriter {
    buffer: Vec<u8>,
}

impl EventWriter {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(EVENT_SIZE),
        }
    }

    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buffer.push(value);
        self
    }

    pub fn write_u16(&mut self, value: u16) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_u64(&mut self, value: u64) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Writes `data` into a field of exactly `width` bytes, zero-filling the rest.
    pub fn write_padded(
        &mut self,
        field: &'static str,
        data: &[u8],
        width: usize,
    ) -> ProtocolResult<&mut Self> {
        if data.len() > width {
            return Err(ProtocolError::PayloadTooLarge {
                field,
                len: data.len(),
                max: width,
            });
        }
        self.buffer.extend_from_slice(data);
        self.buffer.resize(self.buffer.len() + (width - data.len()), 0);
        Ok(self)
    }

    /// Writes a string the way `strncpy(dst, src, width - 1)` would, so the
    /// field always keeps a trailing NUL.
    pub fn write_cstr(&mut self, value: &str, width: usize) -> &mut Self {
        let bytes = value.as_bytes();
        let take = bytes.len().min(width.saturating_sub(1));
        self.buffer.extend_from_slice(bytes.get(..take).unwrap_or_default());
        self.buffer.resize(self.buffer.len() + (width - take), 0);
        self
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn finish(mut self) -> Vec<u8> {
        if self.buffer.len() < EVENT_SIZE {
            self.buffer.resize(EVENT_SIZE, 0);
        }
        self.buffer
    }
}

impl Default for EventWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_scalars() {
        let data = [0x01, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12];
        let mut reader = EventReader::new(&data);

        assert_eq!(reader.read_u8(), Some(0x01));
        assert_eq!(reader.read_u16(), Some(0x1234));
        assert_eq!(reader.read_u32(), Some(0x1234_5678));
        assert_eq!(reader.remaining(), 0);
        assert_eq!(reader.read_u8(), None);
    }

    #[test]
    fn test_reader_cstr_stops_at_nul() {
        let mut data = [0u8; 8];
        data[..3].copy_from_slice(b"abc");
        let mut reader = EventReader::new(&data);

        assert_eq!(reader.read_cstr(8).as_deref(), Some("abc"));
        assert_eq!(reader.position(), 8);
    }

    #[test]
    fn test_writer_pads_to_event_size() {
        let mut writer = EventWriter::new();
        writer.write_u32(11).write_u16(0xBEEF);
        assert_eq!(writer.len(), 6);

        let frame = writer.finish();
        assert_eq!(frame.len(), EVENT_SIZE);
        assert_eq!(&frame[..6], &[11, 0, 0, 0, 0xEF, 0xBE]);
        assert!(frame[6..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_writer_cstr_keeps_trailing_nul() {
        let mut writer = EventWriter::new();
        writer.write_cstr("abcdef", 4);
        let frame = writer.finish();
        assert_eq!(&frame[..4], b"abc\0");
    }

    #[test]
    fn test_writer_padded_rejects_oversize() {
        let mut writer = EventWriter::new();
        let result = writer.write_padded("data", &[0u8; 5], 4);
        assert!(matches!(
            result,
            Err(ProtocolError::PayloadTooLarge { len: 5, max: 4, .. })
        ));
    }
}
