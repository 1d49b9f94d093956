//! The `ingress` module is the hot path of the bridge.
//!
//! For each inbound MQTT publish it validates the topic, derives the device
//! id, asks the admission gate whether the outbound queue can take another
//! record and hands the payload to the outbound sink. Nothing here blocks or
//! returns an error to the transport: every outcome is counted instead.

pub mod admission;
pub mod handler;
pub mod topic;

pub use admission::{Admission, AdmissionGate};
pub use handler::{IngressHandler, IngressOutcome};
pub use topic::TopicSchema;

#[cfg(test)]
mod tests;
