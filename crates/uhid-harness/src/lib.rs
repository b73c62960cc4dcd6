//! Scripted conformance harness for UHID device-session clients.
//!
//! Each [`Scenario`] pairs a frame script with a role. Active scenarios
//! invoke a device-session command and verify, byte for byte and in order,
//! the frames it writes. Passive scenarios inject frames and verify that
//! the session dispatches them to the right handler.
//!
//! Everything runs on one thread: drive [`Registry::run_all`] inside a Tokio
//! `LocalSet` on a current-thread runtime.

#![deny(static_mut_refs)]
#![deny(clippy::unwrap_used)]

pub mod channel;
pub mod config;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod frame;
pub mod hexdump;
pub mod registry;
pub mod report;
pub mod scenario;
pub mod session;
pub mod suite;
pub mod task;

pub use config::{DEFAULT_TIMEOUT_MS, HarnessConfig, PrivilegeMode};
pub use descriptor::DeviceDescriptor;
pub use engine::run_scenario;
pub use error::{HarnessError, HarnessResult};
pub use frame::Frame;
pub use registry::{Filter, Registry, RunSummary, Runner, ScenarioResult, Status};
pub use report::{Outcome, RecordingReporter, Reporter};
pub use scenario::{Command, PassiveSpec, Role, Scenario, ScenarioBuilder, Script};
pub use session::{Privilege, Session, SessionEvent};
pub use suite::{builtin_registry, mx_anywhere_3, register_builtin};
