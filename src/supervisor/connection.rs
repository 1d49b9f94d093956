use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::backoff::{Backoff, sleep_or_cancel};
use super::state::ConnectionState;
use super::transport::{InboundHandler, Transport, TransportEvent};
use crate::utils::BridgeError;

/// Drives an inbound [`Transport`] until cancelled.
#[derive(Debug, Clone)]
pub struct ConnectionSupervisor {
    state: Arc<ConnectionState>,
    backoff: Backoff,
    /// Retries allowed after the first failure, before the first successful
    /// connect. Unlimited afterwards.
    max_retries: u32,
}

impl ConnectionSupervisor {
    pub fn new(state: Arc<ConnectionState>, backoff: Backoff, max_retries: u32) -> Self {
        Self {
            state,
            backoff,
            max_retries,
        }
    }

    pub fn state(&self) -> &Arc<ConnectionState> {
        &self.state
    }

    /// Runs the dispatch loop.
    ///
    /// Returns `Ok` after cancellation (the transport is disconnected on the
    /// way out) and `ConnectRetriesExhausted` when the initial connect never
    /// succeeded within the retry budget.
    pub async fn run<T: Transport>(
        &self,
        mut transport: T,
        handler: Arc<dyn InboundHandler>,
        token: CancellationToken,
    ) -> Result<(), BridgeError> {
        let mut attempt: u32 = 0;
        let mut ever_connected = false;

        self.state.set_connecting();
        info!(
            "Connecting to MQTT (attempt 1/{})",
            self.max_retries.saturating_add(1)
        );

        loop {
            let event = tokio::select! {
                _ = token.cancelled() => break,
                event = transport.poll() => event,
            };

            match event {
                Ok(TransportEvent::Connected) => {
                    if let Err(e) = transport.subscribe() {
                        error!("Failed to request subscription: {e}");
                    }
                    self.state.set_connected();
                    handler.on_connect();
                    info!("MQTT connected");
                    attempt = 0;
                    ever_connected = true;
                }
                Ok(TransportEvent::Message { topic, payload }) => {
                    handler.on_message(&topic, &payload);
                }
                Ok(TransportEvent::Disconnected) => {
                    if self.state.set_disconnected() {
                        warn!("MQTT broker closed the session");
                        handler.on_disconnect("broker closed the session");
                    }
                }
                Ok(TransportEvent::Other) => {}
                Err(e) => {
                    if self.state.is_connected() {
                        warn!("Unexpected MQTT disconnection: {e}");
                        handler.on_disconnect(&e.0);
                    } else {
                        error!("MQTT connection failed: {e}");
                    }
                    self.state.set_disconnected();

                    if !ever_connected && attempt >= self.max_retries {
                        error!(
                            "Failed to connect to MQTT after {} attempts",
                            attempt.saturating_add(1)
                        );
                        self.state.set_shutting_down();
                        return Err(BridgeError::ConnectRetriesExhausted {
                            attempts: attempt.saturating_add(1),
                            last_error: e.0,
                        });
                    }

                    let delay = self.backoff.delay(attempt);
                    attempt = attempt.saturating_add(1);
                    info!("Retrying in {}s...", delay.as_secs_f64());
                    if !sleep_or_cancel(delay, &token).await {
                        break;
                    }
                    self.state.set_connecting();
                    if ever_connected {
                        info!("Reconnecting to MQTT (attempt {})", attempt + 1);
                    } else {
                        info!(
                            "Connecting to MQTT (attempt {}/{})",
                            attempt + 1,
                            self.max_retries.saturating_add(1)
                        );
                    }
                }
            }
        }

        self.state.set_shutting_down();
        transport.disconnect().await;
        info!("MQTT disconnected");
        Ok(())
    }
}
