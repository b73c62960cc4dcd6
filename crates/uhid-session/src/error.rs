//! Session error types

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use uhid_protocol::ProtocolError;

/// Failure of a device-session command.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Transport write or read failed
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The transport accepted fewer bytes than one full event
    #[error("Short write: {written} of {expected} bytes")]
    ShortWrite {
        /// Bytes accepted by the transport
        written: usize,
        /// Encoded event size
        expected: usize,
    },

    /// Event could not be encoded
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Command requires a created device
    #[error("Device has not been created")]
    NotCreated,

    /// Session was released and can no longer issue commands
    #[error("Session has been released")]
    Released,

    /// The privileged backend could not be opened
    #[error("UHID backend {path:?} unavailable: {source}")]
    BackendUnavailable {
        /// Device node that was tried
        path: PathBuf,
        /// Underlying open error
        #[source]
        source: io::Error,
    },
}

impl SessionError {
    /// Negative-errno view of the error, matching the C convention of
    /// returning `-errno` from a failed command.
    pub fn errno(&self) -> i32 {
        let code = match self {
            SessionError::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
            SessionError::ShortWrite { .. } => libc::EIO,
            SessionError::Protocol(_) => libc::EINVAL,
            SessionError::NotCreated => libc::ENODEV,
            SessionError::Released => libc::EBADF,
            SessionError::BackendUnavailable { source, .. } => {
                source.raw_os_error().unwrap_or(libc::ENODEV)
            }
        };
        -code
    }

    /// Whether the error comes from the environment rather than the command.
    pub fn is_environment(&self) -> bool {
        matches!(self, SessionError::BackendUnavailable { .. })
    }
}

/// Specialized Result type for session operations
pub type SessionResult<T> = std::result::Result<T, SessionError>;
