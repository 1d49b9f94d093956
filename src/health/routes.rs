use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use super::report::{DevicesReport, HealthReport, StatsReport, render_metrics};
use crate::metrics::Metrics;
use crate::outbound::OutboundSink;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Clone)]
pub struct HealthState {
    pub metrics: Arc<Metrics>,
    pub sink: Arc<dyn OutboundSink>,
    pub stale_after: Duration,
}

pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/stats", get(stats_handler))
        .route("/devices", get(devices_handler))
        .with_state(state)
}

/// Serves the router on `listener` until `token` is cancelled.
pub async fn serve(
    listener: TcpListener,
    state: HealthState,
    token: CancellationToken,
) -> std::io::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(token.cancelled_owned())
        .await
}

async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let report = HealthReport::evaluate(&state.metrics.snapshot(), Utc::now(), state.stale_after);
    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

async fn metrics_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let body = render_metrics(
        &state.metrics.snapshot(),
        state.sink.queue_len(),
        Utc::now(),
    );
    ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body)
}

async fn stats_handler(State(state): State<HealthState>) -> Json<StatsReport> {
    Json(StatsReport::new(
        &state.metrics.snapshot(),
        state.sink.queue_len(),
        Utc::now(),
    ))
}

async fn devices_handler(State(state): State<HealthState>) -> Json<DevicesReport> {
    Json(DevicesReport::new(state.metrics.devices()))
}
