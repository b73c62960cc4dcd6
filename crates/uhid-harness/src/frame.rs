//! Script frames.

use uhid_protocol::{ProtocolResult, UhidEvent};

/// One expected (Active) or injected (Passive) wire event.
///
/// A frame with `valid == false` is the terminator closing a script; it
/// carries no payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    valid: bool,
    payload: Vec<u8>,
    length: usize,
}

impl Frame {
    /// Frame carrying a copy of `payload`.
    pub fn event(payload: impl Into<Vec<u8>>) -> Self {
        let payload = payload.into();
        Self {
            valid: true,
            length: payload.len(),
            payload,
        }
    }

    pub fn from_event(event: &UhidEvent) -> ProtocolResult<Self> {
        Ok(Self::event(event.encode()?))
    }

    pub fn terminator() -> Self {
        Self {
            valid: false,
            payload: Vec::new(),
            length: 0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn is_terminator(&self) -> bool {
        !self.valid
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Compares observed bytes against this frame, describing the first
    /// difference.
    pub fn mismatch(&self, observed: &[u8]) -> Option<String> {
        if observed.len() != self.length {
            return Some(format!(
                "expected {} bytes, got {}",
                self.length,
                observed.len()
            ));
        }
        self.payload
            .iter()
            .zip(observed)
            .position(|(want, got)| want != got)
            .map(|offset| {
                let want = self.payload.get(offset).copied().unwrap_or_default();
                let got = observed.get(offset).copied().unwrap_or_default();
                format!("byte {offset}: expected 0x{want:02x}, got 0x{got:02x}")
            })
    }
}
