use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};

use super::admission::{Admission, AdmissionGate};
use super::topic::TopicSchema;
use crate::metrics::Metrics;
use crate::outbound::{OutboundSink, ProduceError};
use crate::supervisor::InboundHandler;

/// What happened to one inbound message. Each variant corresponds to exactly
/// one counter bump (besides `received`), except `Forwarded`, whose outcome
/// is counted later by the delivery tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngressOutcome {
    Forwarded,
    InvalidTopic,
    Dropped,
    Rejected,
    Failed,
}

/// Entry point invoked by the MQTT dispatch loop for every message.
pub struct IngressHandler {
    schema: TopicSchema,
    gate: AdmissionGate,
    sink: Arc<dyn OutboundSink>,
    metrics: Arc<Metrics>,
}

impl IngressHandler {
    pub fn new(
        schema: TopicSchema,
        gate: AdmissionGate,
        sink: Arc<dyn OutboundSink>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            schema,
            gate,
            sink,
            metrics,
        }
    }

    pub fn handle(&self, topic: &str, payload: &[u8]) -> IngressOutcome {
        self.handle_at(topic, payload, Utc::now())
    }

    /// Handles a message received at `received_at`.
    ///
    /// Never panics and never blocks: a panic raised while forwarding is
    /// caught here, logged and counted as `failed`.
    pub fn handle_at(
        &self,
        topic: &str,
        payload: &[u8],
        received_at: DateTime<Utc>,
    ) -> IngressOutcome {
        let received = self.metrics.record_received(received_at);

        match catch_unwind(AssertUnwindSafe(|| self.forward(topic, payload, received))) {
            Ok(outcome) => outcome,
            Err(panic) => {
                error!(
                    topic,
                    payload_len = payload.len(),
                    "Unexpected error in message handler: {}",
                    panic_message(panic.as_ref())
                );
                self.metrics.incr_failed();
                IngressOutcome::Failed
            }
        }
    }

    fn forward(&self, topic: &str, payload: &[u8], received: u64) -> IngressOutcome {
        let Some(device_id) = self.schema.device_id(topic) else {
            self.metrics.incr_invalid_topic();
            debug!("Ignoring message on unexpected topic '{topic}'");
            return IngressOutcome::InvalidTopic;
        };

        let depth = self.sink.queue_len();
        let max = self.gate.max_queue();
        match self.gate.decide(depth, received) {
            Admission::Drop => {
                self.metrics.incr_dropped();
                error!("DROPPED: device={device_id}, queue={depth}/{max}");
                return IngressOutcome::Dropped;
            }
            Admission::AdmitWithWarning => {
                warn!("Outbound queue high: {depth}/{max}");
            }
            Admission::Admit => {}
        }

        match self.sink.produce(device_id.as_bytes(), payload) {
            Ok(()) => {
                self.metrics.record_device(device_id);
                IngressOutcome::Forwarded
            }
            Err(ProduceError::QueueFull) => {
                self.metrics.incr_dropped();
                error!("Buffer full on hand-off: device={device_id}");
                IngressOutcome::Dropped
            }
            Err(ProduceError::Rejected(reason)) => {
                self.metrics.incr_outbound_errors();
                error!("Outbound produce error for device={device_id}: {reason}");
                IngressOutcome::Rejected
            }
        }
    }
}

impl InboundHandler for IngressHandler {
    fn on_message(&self, topic: &str, payload: &[u8]) {
        self.handle(topic, payload);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}
