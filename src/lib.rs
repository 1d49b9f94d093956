//! # mqtt-kafka-bridge
//!
//! `mqtt-kafka-bridge` relays device telemetry from an MQTT broker into a
//! Kafka topic. Every publish on `<namespace>/<category>/<device_id>` is
//! forwarded untouched, keyed by its device id, with explicit and observable
//! drop accounting when the outbound queue is saturated.
//!
//! ## Core Modules
//!
//! - `bridge`: Wires the components together and runs the main loop.
//! - `config`: Loads settings from defaults, an optional file and the environment.
//! - `health`: The HTTP surface (`/health`, `/metrics`, `/stats`, `/devices`).
//! - `ingress`: Topic validation, admission control and hand-off to the outbound sink.
//! - `metrics`: Process-wide counters and gauges shared by every component.
//! - `outbound`: The Kafka producer and delivery outcome tracking.
//! - `shutdown`: Signal handling, bounded flush and final stats.
//! - `supervisor`: The MQTT connection, reconnect backoff and message dispatch.
//! - `utils`: Shared utilities, such as error handling and logging.

pub mod bridge;
pub mod config;
pub mod health;
pub mod ingress;
pub mod metrics;
pub mod outbound;
pub mod shutdown;
pub mod supervisor;
pub mod utils;
