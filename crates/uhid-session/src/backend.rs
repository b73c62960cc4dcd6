//! Session construction.
//!
//! A harness never builds sessions directly: it asks a [`SessionBackend`]
//! either to attach a session to a socket it controls, or to open the
//! privileged default transport.

use std::path::{Path, PathBuf};

use tokio::net::UnixDatagram;
use tracing::info;

use crate::endpoint::Endpoint;
use crate::error::{SessionError, SessionResult};
use crate::session::{DeviceSession, UhidSession};

/// Kernel UHID character device.
pub const DEFAULT_UHID_PATH: &str = "/dev/uhid";

pub trait SessionBackend {
    /// Binds a new session to one end of a simulated channel.
    fn attach(&self, endpoint: UnixDatagram) -> SessionResult<Box<dyn DeviceSession>>;

    /// Opens a session on the privileged default transport.
    fn open_default(&self) -> SessionResult<Box<dyn DeviceSession>>;
}

/// Backend producing [`UhidSession`]s.
#[derive(Debug, Clone)]
pub struct UhidBackend {
    device_path: PathBuf,
}

impl UhidBackend {
    pub fn new() -> Self {
        Self::with_device_path(DEFAULT_UHID_PATH)
    }

    pub fn with_device_path(path: impl Into<PathBuf>) -> Self {
        Self {
            device_path: path.into(),
        }
    }

    pub fn device_path(&self) -> &Path {
        &self.device_path
    }
}

impl Default for UhidBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBackend for UhidBackend {
    fn attach(&self, endpoint: UnixDatagram) -> SessionResult<Box<dyn DeviceSession>> {
        Ok(Box::new(UhidSession::new(Endpoint::Socket(endpoint))))
    }

    fn open_default(&self) -> SessionResult<Box<dyn DeviceSession>> {
        let endpoint = Endpoint::open_device(&self.device_path).map_err(|source| {
            SessionError::BackendUnavailable {
                path: self.device_path.clone(),
                source,
            }
        })?;
        info!(path = %self.device_path.display(), "opened uhid device");
        Ok(Box::new(UhidSession::new(endpoint)))
    }
}
