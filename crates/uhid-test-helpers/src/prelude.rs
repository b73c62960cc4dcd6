//! Convenience re-exports for common test utilities.
//!
//! ```rust,ignore
//! use uhid_test_helpers::prelude::*;
//! ```

pub use crate::must::{must, must_err, must_some, must_with};

#[cfg(feature = "fixtures")]
pub use crate::fixtures::{BOOT_MOUSE_MAP, create_frame, zeroed_frame};

#[cfg(feature = "mock")]
pub use crate::mock::{CallLog, FrameLog, MockBackend, MockCall, MockCommand, MockSession};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;
