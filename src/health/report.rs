use std::fmt::Write;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics::MetricsSnapshot;

const METRIC_PREFIX: &str = "mqtt_kafka";

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Liveness: connected, and a message seen within `stale_after`.
///
/// An idle bridge is reported unhealthy; the deployment expects continuous
/// telemetry.
pub fn is_live(snapshot: &MetricsSnapshot, now: DateTime<Utc>, stale_after: Duration) -> bool {
    let window = TimeDelta::from_std(stale_after).unwrap_or(TimeDelta::MAX);
    snapshot.connected
        && snapshot
            .last_message_at
            .is_some_and(|at| now - at < window)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub mqtt_connected: bool,
    pub uptime_seconds: f64,
    pub last_message_ago: Option<f64>,
}

impl HealthReport {
    pub fn evaluate(snapshot: &MetricsSnapshot, now: DateTime<Utc>, stale_after: Duration) -> Self {
        let healthy = is_live(snapshot, now, stale_after);
        Self {
            status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
            mqtt_connected: snapshot.connected,
            uptime_seconds: round2(snapshot.uptime_secs(now)),
            last_message_ago: snapshot.last_message_ago(now).map(round2),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    pub received: u64,
    pub sent: u64,
    pub failed: u64,
    pub validation_errors: u64,
    pub kafka_errors: u64,
    pub success_rate: f64,
    pub queue_size: usize,
    pub uptime: String,
    pub mqtt_connected: bool,
}

impl StatsReport {
    pub fn new(snapshot: &MetricsSnapshot, queue_size: usize, now: DateTime<Utc>) -> Self {
        Self {
            received: snapshot.received,
            sent: snapshot.sent,
            failed: snapshot.failed,
            validation_errors: snapshot.invalid_topic,
            kafka_errors: snapshot.outbound_errors,
            success_rate: snapshot.success_rate(),
            queue_size,
            uptime: format!("{:.0}s", snapshot.uptime_secs(now)),
            mqtt_connected: snapshot.connected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevicesReport {
    pub count: usize,
    pub devices: Vec<String>,
}

impl DevicesReport {
    pub fn new(devices: Vec<String>) -> Self {
        Self {
            count: devices.len(),
            devices,
        }
    }
}

/// Prometheus text exposition of every metric plus queue depth and uptime.
pub fn render_metrics(snapshot: &MetricsSnapshot, queue_size: usize, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let mut family = |name: &str, kind: &str, help: &str, value: Option<String>| {
        let _ = writeln!(out, "# HELP {METRIC_PREFIX}_{name} {help}");
        let _ = writeln!(out, "# TYPE {METRIC_PREFIX}_{name} {kind}");
        if let Some(value) = value {
            let _ = writeln!(out, "{METRIC_PREFIX}_{name} {value}");
        }
        out.push('\n');
    };

    family(
        "messages_received_total",
        "counter",
        "Total messages received from MQTT",
        Some(snapshot.received.to_string()),
    );
    family(
        "messages_sent_total",
        "counter",
        "Total messages acknowledged by Kafka",
        Some(snapshot.sent.to_string()),
    );
    family(
        "messages_dropped_total",
        "counter",
        "Messages dropped because the outbound queue was full",
        Some(snapshot.dropped.to_string()),
    );
    family(
        "messages_failed_total",
        "counter",
        "Total failed messages",
        Some(snapshot.failed.to_string()),
    );
    family(
        "validation_errors_total",
        "counter",
        "Messages rejected for an unexpected topic",
        Some(snapshot.invalid_topic.to_string()),
    );
    family(
        "kafka_errors_total",
        "counter",
        "Kafka producer errors",
        Some(snapshot.outbound_errors.to_string()),
    );
    family(
        "mqtt_connected",
        "gauge",
        "MQTT connection status",
        Some(u8::from(snapshot.connected).to_string()),
    );
    family(
        "last_message_timestamp_seconds",
        "gauge",
        "Unix time of the last received message",
        snapshot
            .last_message_at
            .map(|at| format!("{:.3}", at.timestamp_millis() as f64 / 1000.0)),
    );
    family(
        "queue_size",
        "gauge",
        "Current Kafka producer queue size",
        Some(queue_size.to_string()),
    );
    family(
        "uptime_seconds",
        "counter",
        "Bridge uptime in seconds",
        Some(format!("{:.3}", snapshot.uptime_secs(now))),
    );

    out
}
