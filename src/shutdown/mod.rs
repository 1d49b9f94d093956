//! The `shutdown` module stops the bridge in order.
//!
//! Every loop observes one [`CancellationToken`]. Once it is cancelled the
//! coordinator drains the outbound client for a bounded time, logs the final
//! counters and hands back the outcome that decides the exit code.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::metrics::Metrics;
use crate::outbound::OutboundSink;
use crate::utils::BridgeError;

/// Extra time granted to the blocking flush task beyond its own timeout.
const FLUSH_GRACE: Duration = Duration::from_secs(1);

/// Completes on the first SIGINT (Ctrl+C) or, on unix, SIGTERM.
pub async fn shutdown_signal() -> io::Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            res = signal::ctrl_c() => res,
            _ = terminate.recv() => Ok(()),
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await
    }
}

/// Cancels `token` when a termination signal arrives.
///
/// The listener exits on its own once `token` is cancelled elsewhere.
pub fn listen_for_signals(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            res = shutdown_signal() => match res {
                Ok(()) => {
                    info!("Shutdown signal received");
                    token.cancel();
                }
                Err(e) => error!("Failed to install signal handlers: {e}"),
            },
        }
    })
}

/// Waits for `handle` at most `timeout`. Returns `None` if the task is still
/// running (it is aborted) or panicked.
pub async fn join_bounded<T>(
    handle: &mut JoinHandle<T>,
    timeout: Duration,
    name: &str,
) -> Option<T> {
    match tokio::time::timeout(timeout, &mut *handle).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            error!("{name} task failed: {e}");
            None
        }
        Err(_) => {
            warn!("{name} task did not stop within {timeout:?}, aborting");
            handle.abort();
            None
        }
    }
}

/// What the final flush left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    /// Records still unresolved when the flush gave up. They are abandoned
    /// and counted neither as sent nor as failed.
    pub abandoned: usize,
}

/// Exit status for a finished run: 0 on a clean stop, the error's code
/// otherwise.
pub fn exit_code(outcome: &Result<(), BridgeError>) -> u8 {
    match outcome {
        Ok(()) => 0,
        Err(e) => e.exit_code(),
    }
}

pub fn log_final_stats(metrics: &Metrics, queue_len: usize) {
    let snapshot = metrics.snapshot();
    info!(
        received = snapshot.received,
        sent = snapshot.sent,
        dropped = snapshot.dropped,
        failed = snapshot.failed,
        invalid_topic = snapshot.invalid_topic,
        outbound_errors = snapshot.outbound_errors,
        queue = queue_len,
        "Final stats: received={} sent={} failed={} success_rate={:.2}%",
        snapshot.received,
        snapshot.sent,
        snapshot.failed,
        snapshot.success_rate()
    );
}

pub struct ShutdownCoordinator {
    token: CancellationToken,
    sink: Arc<dyn OutboundSink>,
    metrics: Arc<Metrics>,
    flush_timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(
        token: CancellationToken,
        sink: Arc<dyn OutboundSink>,
        metrics: Arc<Metrics>,
        flush_timeout: Duration,
    ) -> Self {
        Self {
            token,
            sink,
            metrics,
            flush_timeout,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancels the shared token. Idempotent.
    pub fn trigger(&self, reason: &str) {
        if !self.token.is_cancelled() {
            info!("Shutting down: {reason}");
            self.token.cancel();
        }
    }

    /// Drains the outbound client for at most `flush_timeout`.
    ///
    /// The producer flush blocks, so it runs on the blocking pool.
    pub async fn flush(&self) -> FlushReport {
        info!(
            "Flushing outbound queue ({} pending, timeout {:?})",
            self.sink.queue_len(),
            self.flush_timeout
        );
        let sink = self.sink.clone();
        let timeout = self.flush_timeout;
        let task = tokio::task::spawn_blocking(move || sink.flush(timeout));

        match tokio::time::timeout(timeout + FLUSH_GRACE, task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => warn!("Outbound flush incomplete: {e}"),
            Ok(Err(e)) => error!("Outbound flush task failed: {e}"),
            Err(_) => warn!("Outbound flush exceeded {timeout:?}"),
        }

        let abandoned = self.sink.queue_len();
        if abandoned > 0 {
            warn!("{abandoned} records left unresolved at shutdown");
        }
        FlushReport { abandoned }
    }

    /// Runs the shutdown sequence after the dispatch loop has stopped and
    /// passes `outcome` through.
    pub async fn finish(&self, outcome: Result<(), BridgeError>) -> Result<(), BridgeError> {
        match &outcome {
            Ok(()) => self.trigger("stop requested"),
            Err(e) => self.trigger(&e.to_string()),
        }
        self.flush().await;
        log_final_stats(&self.metrics, self.sink.queue_len());
        info!("Bridge stopped");
        outcome
    }
}

#[cfg(test)]
mod tests;
