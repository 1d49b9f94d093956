//! The `supervisor` module owns the inbound connection.
//!
//! It drives the transport's event loop, subscribes after every successful
//! connect, dispatches publishes to the [`InboundHandler`] and reconnects
//! with capped exponential backoff. The first connect must succeed within
//! the retry budget; once the bridge has been connected, later losses are
//! retried indefinitely in the background.

pub mod backoff;
pub mod connection;
pub mod mqtt;
#[cfg(test)]
pub mod scripted;
pub mod state;
pub mod transport;

pub use backoff::Backoff;
pub use connection::ConnectionSupervisor;
pub use mqtt::MqttTransport;
pub use state::{ConnectionPhase, ConnectionState};
pub use transport::{InboundHandler, Transport, TransportError, TransportEvent};
