//! The `utils` module collects the pieces shared by every other module:
//! the crate's fatal error type and the tracing subscriber setup.

pub mod error;
pub mod logging;

pub use error::BridgeError;
