use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::metrics::Metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionPhase {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    ShuttingDown = 3,
}

impl ConnectionPhase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => ConnectionPhase::Connecting,
            2 => ConnectionPhase::Connected,
            3 => ConnectionPhase::ShuttingDown,
            _ => ConnectionPhase::Disconnected,
        }
    }
}

/// Inbound connection state, written only by the supervisor.
///
/// The `connected` gauge in [`Metrics`] is kept in step with the phase.
/// `ShuttingDown` is terminal.
#[derive(Debug)]
pub struct ConnectionState {
    phase: AtomicU8,
    metrics: Arc<Metrics>,
}

impl ConnectionState {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        metrics.set_connected(false);
        Self {
            phase: AtomicU8::new(ConnectionPhase::Disconnected as u8),
            metrics,
        }
    }

    pub fn phase(&self) -> ConnectionPhase {
        ConnectionPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn is_connected(&self) -> bool {
        self.phase() == ConnectionPhase::Connected
    }

    pub fn set_connecting(&self) -> bool {
        self.transition(ConnectionPhase::Connecting)
    }

    pub fn set_connected(&self) -> bool {
        self.transition(ConnectionPhase::Connected)
    }

    pub fn set_disconnected(&self) -> bool {
        self.transition(ConnectionPhase::Disconnected)
    }

    pub fn set_shutting_down(&self) -> bool {
        self.transition(ConnectionPhase::ShuttingDown)
    }

    /// Moves to `next` unless already shutting down. Returns whether the
    /// phase changed.
    fn transition(&self, next: ConnectionPhase) -> bool {
        let result = self
            .phase
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                match ConnectionPhase::from_u8(raw) {
                    ConnectionPhase::ShuttingDown => None,
                    current if current == next => None,
                    _ => Some(next as u8),
                }
            });
        if result.is_ok() {
            self.metrics
                .set_connected(next == ConnectionPhase::Connected);
        }
        result.is_ok()
    }
}
