//! Scripted transport used by the tests in place of a live broker.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::transport::{Transport, TransportError, TransportEvent};

/// Replays a script of poll results, then waits forever.
pub struct ScriptedTransport {
    script: VecDeque<Result<TransportEvent, TransportError>>,
    pub subscribes: Arc<AtomicUsize>,
    pub disconnects: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<TransportEvent, TransportError>>) -> Self {
        Self {
            script: script.into(),
            subscribes: Arc::new(AtomicUsize::new(0)),
            disconnects: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Transport for ScriptedTransport {
    async fn poll(&mut self) -> Result<TransportEvent, TransportError> {
        match self.script.pop_front() {
            Some(next) => next,
            None => std::future::pending().await,
        }
    }

    fn subscribe(&mut self) -> Result<(), TransportError> {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}
