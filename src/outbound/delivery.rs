use std::sync::Arc;

use tracing::{error, info};

use crate::metrics::Metrics;

/// Log a progress line every this many successful deliveries.
pub const PROGRESS_EVERY: u64 = 100;

/// Result of a single record as reported by the producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed(String),
}

/// Turns asynchronous delivery reports into metric updates.
///
/// Runs on the producer's own callback thread. Never retries: redelivery is
/// the producer's job (`acks`, `retries`).
#[derive(Debug, Clone)]
pub struct DeliveryTracker {
    metrics: Arc<Metrics>,
}

impl DeliveryTracker {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }

    pub fn on_delivery(&self, key: &[u8], outcome: DeliveryOutcome, queue_len: usize) {
        match outcome {
            DeliveryOutcome::Delivered => {
                let sent = self.metrics.incr_sent();
                if sent % PROGRESS_EVERY == 0 {
                    info!("Delivered {sent} messages (queue: {queue_len})");
                }
            }
            DeliveryOutcome::Failed(cause) => {
                self.metrics.incr_failed();
                self.metrics.incr_outbound_errors();
                error!(
                    "Delivery failed for {}: {cause}",
                    String::from_utf8_lossy(key)
                );
            }
        }
    }
}
