//! Outbound path towards the durable log.
//!
//! The bridge talks to the producer only through [`OutboundSink`], so the
//! ingress logic can be exercised against an in-memory sink in tests and
//! against Kafka in production. Delivery outcomes come back asynchronously
//! through [`DeliveryTracker`].

pub mod delivery;
pub mod kafka;
#[cfg(test)]
pub mod memory;

use std::time::Duration;

use thiserror::Error;

pub use delivery::{DeliveryOutcome, DeliveryTracker};
pub use kafka::KafkaSink;

/// Local hand-off failures. Neither is fatal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProduceError {
    /// The producer's internal buffer is full.
    #[error("outbound queue full")]
    QueueFull,
    /// Any other client-level rejection.
    #[error("outbound client rejected record: {0}")]
    Rejected(String),
}

/// A record as handed to the producer: key is the device id, value is the
/// inbound payload, untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRecord {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Buffered, asynchronous publish capability.
///
/// `produce` must not block: it only enqueues. The outcome of each accepted
/// record is reported later to the sink's `DeliveryTracker`.
pub trait OutboundSink: Send + Sync {
    /// Records accepted but not yet resolved. Cheap, non-blocking.
    fn queue_len(&self) -> usize;

    fn produce(&self, key: &[u8], value: &[u8]) -> Result<(), ProduceError>;

    /// Blocks for at most `timeout` waiting for queued records to resolve.
    fn flush(&self, timeout: Duration) -> Result<(), ProduceError>;
}
