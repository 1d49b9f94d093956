use std::future::Future;

use bytes::Bytes;
use thiserror::Error;

/// What the inbound transport reported on one poll.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Handshake succeeded.
    Connected,
    Message { topic: String, payload: Bytes },
    /// The broker closed the session.
    Disconnected,
    /// Protocol traffic the bridge does not act on (acks, pings).
    Other,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

/// A subscribe-based client driven by polling.
///
/// After `poll` returns an error the next call attempts to reconnect.
pub trait Transport: Send {
    fn poll(&mut self) -> impl Future<Output = Result<TransportEvent, TransportError>> + Send;

    /// Requests the configured subscription without waiting for it.
    fn subscribe(&mut self) -> Result<(), TransportError>;

    /// Best-effort, bounded disconnect.
    fn disconnect(&mut self) -> impl Future<Output = ()> + Send;
}

/// Callbacks the supervisor invokes on behalf of the transport.
///
/// `on_message` runs inline on the dispatch loop and must return quickly.
pub trait InboundHandler: Send + Sync {
    fn on_connect(&self) {}

    fn on_message(&self, topic: &str, payload: &[u8]);

    fn on_disconnect(&self, _reason: &str) {}
}
