//! The `bridge` module wires the components together and runs them.
//!
//! Startup order: outbound producer, HTTP listener, MQTT client. Any failure
//! there is fatal. Afterwards the main loop only waits for the shutdown
//! token or a fatal dispatch error, logging aggregate stats periodically.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{HealthSettings, Settings};
use crate::health::{self, HealthState};
use crate::ingress::{AdmissionGate, IngressHandler, TopicSchema};
use crate::metrics::Metrics;
use crate::outbound::{DeliveryTracker, KafkaSink, OutboundSink};
use crate::shutdown::{ShutdownCoordinator, join_bounded};
use crate::supervisor::mqtt::client_id;
use crate::supervisor::{
    Backoff, ConnectionState, ConnectionSupervisor, InboundHandler, MqttTransport, Transport,
};
use crate::utils::BridgeError;

/// How long stopped tasks get to finish before they are aborted.
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Builds the production clients from `settings` and runs until `token` is
/// cancelled or a fatal error occurs.
pub async fn run(settings: Settings, token: CancellationToken) -> Result<(), BridgeError> {
    info!("Starting MQTT-Kafka bridge");
    let metrics = Arc::new(Metrics::new());
    let client_id = client_id(&settings.mqtt.client_id_prefix);

    let sink = Arc::new(KafkaSink::new(
        &settings.kafka,
        &client_id,
        DeliveryTracker::new(metrics.clone()),
    )?);
    let listener = bind(&settings.health).await?;
    let transport = MqttTransport::new(&settings.mqtt, &client_id)?;

    run_with(&settings, metrics, sink, transport, listener, token).await
}

/// Binds the health listener.
pub async fn bind(settings: &HealthSettings) -> Result<TcpListener, BridgeError> {
    let addr = settings.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| BridgeError::HttpBind {
            addr: addr.clone(),
            source,
        })?;
    info!("Health server listening on {addr}");
    Ok(listener)
}

/// Runs the bridge on already constructed clients.
pub async fn run_with<T>(
    settings: &Settings,
    metrics: Arc<Metrics>,
    sink: Arc<dyn OutboundSink>,
    transport: T,
    listener: TcpListener,
    token: CancellationToken,
) -> Result<(), BridgeError>
where
    T: Transport + 'static,
{
    let coordinator = ShutdownCoordinator::new(
        token.clone(),
        sink.clone(),
        metrics.clone(),
        settings.runtime.flush_timeout(),
    );

    let mut http = tokio::spawn(health::serve(
        listener,
        HealthState {
            metrics: metrics.clone(),
            sink: sink.clone(),
            stale_after: settings.health.stale_after(),
        },
        token.clone(),
    ));

    let handler: Arc<dyn InboundHandler> = Arc::new(IngressHandler::new(
        TopicSchema::new(&settings.ingress.namespace, &settings.ingress.category),
        AdmissionGate::new(
            settings.kafka.max_queue_size,
            settings.kafka.warn_threshold(),
        ),
        sink.clone(),
        metrics.clone(),
    ));
    let supervisor = ConnectionSupervisor::new(
        Arc::new(ConnectionState::new(metrics.clone())),
        Backoff::new(settings.mqtt.backoff_base(), settings.mqtt.backoff_cap()),
        settings.mqtt.max_retries,
    );
    let mut dispatch = {
        let token = token.clone();
        tokio::spawn(async move { supervisor.run(transport, handler, token).await })
    };

    info!("Bridge running");
    let mut stats = tokio::time::interval(settings.runtime.stats_interval());
    // the first tick completes immediately
    stats.tick().await;

    let finished = loop {
        tokio::select! {
            _ = token.cancelled() => break None,
            joined = &mut dispatch => break Some(joined),
            _ = stats.tick() => log_stats(&metrics, sink.queue_len()),
        }
    };

    coordinator.trigger("stopping dispatch");
    let outcome = match finished {
        Some(joined) => dispatch_outcome(joined),
        None => match tokio::time::timeout(JOIN_TIMEOUT, &mut dispatch).await {
            Ok(joined) => dispatch_outcome(joined),
            Err(_) => {
                warn!("Dispatch task did not stop within {JOIN_TIMEOUT:?}, aborting");
                dispatch.abort();
                Ok(())
            }
        },
    };

    if let Some(Err(e)) = join_bounded(&mut http, JOIN_TIMEOUT, "health server").await {
        error!("Health server error: {e}");
    }

    coordinator.finish(outcome).await
}

/// A dispatch task that panicked or was aborted is a fatal fault.
fn dispatch_outcome(joined: Result<Result<(), BridgeError>, JoinError>) -> Result<(), BridgeError> {
    joined.unwrap_or_else(|e| {
        error!("Dispatch task failed: {e}");
        Err(BridgeError::DispatchFailed(e.to_string()))
    })
}

fn log_stats(metrics: &Metrics, queue_len: usize) {
    let snapshot = metrics.snapshot();
    info!(
        "Stats: received={}, sent={}, failed={}, dropped={}, invalid_topic={}, queue={}, success={:.2}%",
        snapshot.received,
        snapshot.sent,
        snapshot.failed,
        snapshot.dropped,
        snapshot.invalid_topic,
        queue_len,
        snapshot.success_rate()
    );
}
