//! The `health` module is the read-only HTTP surface polled by the process
//! supervisor and the metrics scraper.
//!
//! - `GET /health`: liveness, 200 or 503
//! - `GET /metrics`: Prometheus text exposition
//! - `GET /stats`: JSON aggregate for humans
//! - `GET /devices`: device ids seen so far
//!
//! Every response is computed on demand from the shared [`Metrics`] and the
//! outbound sink's queue depth; the module holds no state of its own.
//!
//! [`Metrics`]: crate::metrics::Metrics

pub mod report;
pub mod routes;

pub use report::{DevicesReport, HealthReport, StatsReport, is_live, render_metrics};
pub use routes::{HealthState, router, serve};
