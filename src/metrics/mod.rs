//! The `metrics` module holds the process-wide counters and gauges.
//!
//! A single `Metrics` value is created at startup, wrapped in an `Arc` and
//! handed to every component that reads or updates it. All updates are atomic
//! so the ingress path never waits on a lock held by a reader.

pub mod registry;

pub use registry::{Metrics, MetricsSnapshot};
