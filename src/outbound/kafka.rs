//! Kafka producer adapter.
//!
//! Wraps an `rdkafka` `ThreadedProducer`: records are queued in librdkafka's
//! internal buffer and delivery reports arrive on its polling thread, where
//! they are forwarded to the [`DeliveryTracker`].

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rdkafka::ClientConfig;
use rdkafka::client::ClientContext;
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use rdkafka::producer::{BaseRecord, DeliveryResult, Producer, ProducerContext, ThreadedProducer};
use rdkafka::types::RDKafkaErrorCode;
use tracing::info;

use super::{DeliveryOutcome, DeliveryTracker, OutboundSink, ProduceError};
use crate::config::KafkaSettings;
use crate::utils::BridgeError;

/// Producer context receiving delivery reports.
///
/// `pending` mirrors the number of records handed off but not yet reported,
/// so progress logs can show queue depth without reaching back into the
/// producer.
pub struct DeliveryContext {
    tracker: DeliveryTracker,
    pending: Arc<AtomicUsize>,
}

impl ClientContext for DeliveryContext {}

impl ProducerContext for DeliveryContext {
    type DeliveryOpaque = ();

    fn delivery(&self, result: &DeliveryResult<'_>, _opaque: Self::DeliveryOpaque) {
        let remaining = release(&self.pending);
        match result {
            Ok(msg) => {
                self.tracker.on_delivery(
                    msg.key().unwrap_or_default(),
                    DeliveryOutcome::Delivered,
                    remaining,
                );
            }
            Err((err, msg)) => {
                self.tracker.on_delivery(
                    msg.key().unwrap_or_default(),
                    DeliveryOutcome::Failed(err.to_string()),
                    remaining,
                );
            }
        }
    }
}

/// Decrements `pending` without wrapping and returns the new value.
fn release(pending: &AtomicUsize) -> usize {
    let prev = match pending.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
        Some(n.saturating_sub(1))
    }) {
        Ok(prev) | Err(prev) => prev,
    };
    prev.saturating_sub(1)
}

pub struct KafkaSink {
    producer: ThreadedProducer<DeliveryContext>,
    topic: String,
    pending: Arc<AtomicUsize>,
}

impl KafkaSink {
    pub fn new(
        settings: &KafkaSettings,
        client_id: &str,
        tracker: DeliveryTracker,
    ) -> Result<Self, BridgeError> {
        let pending = Arc::new(AtomicUsize::new(0));
        let context = DeliveryContext {
            tracker,
            pending: pending.clone(),
        };

        let producer: ThreadedProducer<DeliveryContext> = client_config(settings, client_id)
            .create_with_context(context)
            .map_err(|e| BridgeError::OutboundInit(e.to_string()))?;

        info!(
            "Kafka producer initialized (brokers: {}, topic: {}, user: {})",
            settings.brokers, settings.topic_out, settings.sasl_username
        );

        Ok(Self {
            producer,
            topic: settings.topic_out.clone(),
            pending,
        })
    }
}

/// librdkafka configuration for the bridge producer.
pub fn client_config(settings: &KafkaSettings, client_id: &str) -> ClientConfig {
    let mut config = ClientConfig::new();
    config
        .set("bootstrap.servers", &settings.brokers)
        .set("client.id", client_id)
        .set("security.protocol", &settings.security_protocol)
        .set("acks", &settings.acks)
        .set("retries", settings.retries.to_string())
        .set(
            "queue.buffering.max.messages",
            settings.max_queue_size.to_string(),
        )
        .set(
            "queue.buffering.max.kbytes",
            settings.queue_max_kbytes.to_string(),
        )
        .set("compression.type", &settings.compression)
        .set("linger.ms", settings.linger_ms.to_string());

    if settings.security_protocol.to_uppercase().starts_with("SASL") {
        config
            .set("sasl.mechanism", &settings.sasl_mechanism)
            .set("sasl.username", &settings.sasl_username);
        if let Some(password) = &settings.sasl_password {
            config.set("sasl.password", password);
        }
    }
    config
}

/// Maps a librdkafka hand-off error onto the bridge's two local failure modes.
pub fn classify(err: &KafkaError) -> ProduceError {
    match err {
        KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull) => ProduceError::QueueFull,
        other => ProduceError::Rejected(other.to_string()),
    }
}

impl OutboundSink for KafkaSink {
    fn queue_len(&self) -> usize {
        self.producer.in_flight_count().max(0) as usize
    }

    fn produce(&self, key: &[u8], value: &[u8]) -> Result<(), ProduceError> {
        // count before send: the report may arrive before send returns
        self.pending.fetch_add(1, Ordering::AcqRel);
        let record = BaseRecord::to(&self.topic).key(key).payload(value);
        match self.producer.send(record) {
            Ok(()) => Ok(()),
            Err((err, _)) => {
                release(&self.pending);
                Err(classify(&err))
            }
        }
    }

    fn flush(&self, timeout: Duration) -> Result<(), ProduceError> {
        self.producer
            .flush(timeout)
            .map_err(|e| ProduceError::Rejected(e.to_string()))
    }
}
