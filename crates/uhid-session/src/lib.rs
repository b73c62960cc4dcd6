//! UHID device session client.
//!
//! A [`UhidSession`] owns one end of a UHID transport (a `/dev/uhid` handle or
//! a connected datagram socket standing in for it), encodes the outbound
//! command events, and decodes inbound events into registered handlers.
//!
//! # Architecture
//!
//! - [`session`]: the [`DeviceSession`] trait and its UHID implementation
//! - [`endpoint`]: the byte transport under a session
//! - [`backend`]: how sessions are constructed (attached socket or `/dev/uhid`)
//! - [`handlers`]: per-event-kind handler registry
//! - [`error`]: session error types
//!
//! Sessions are single-threaded: handlers are plain `FnMut` closures and the
//! inbound reader runs as a local task, so everything must execute inside a
//! Tokio [`LocalSet`](tokio::task::LocalSet).

#![deny(static_mut_refs)]
#![deny(clippy::unwrap_used)]

pub mod backend;
pub mod endpoint;
pub mod error;
pub mod handlers;
pub mod session;

pub use backend::{DEFAULT_UHID_PATH, SessionBackend, UhidBackend};
pub use endpoint::Endpoint;
pub use error::{SessionError, SessionResult};
pub use handlers::{EventHandler, HandlerId};
pub use session::{CreateParams, DeviceSession, DeviceType, UhidSession};
