use super::admission::{Admission, AdmissionGate};
use super::handler::{IngressHandler, IngressOutcome};
use super::topic::TopicSchema;
use crate::metrics::Metrics;
use crate::outbound::memory::MemorySink;
use crate::outbound::{
    DeliveryOutcome, DeliveryTracker, OutboundRecord, OutboundSink, ProduceError,
};
use crate::supervisor::InboundHandler;
use chrono::{TimeZone, Utc};
use std::sync::Arc;

fn setup(max_queue: usize) -> (IngressHandler, Arc<MemorySink>, Arc<Metrics>) {
    let metrics = Arc::new(Metrics::new());
    let sink = Arc::new(MemorySink::new(DeliveryTracker::new(metrics.clone())));
    let handler = IngressHandler::new(
        TopicSchema::new("iot", "telemetry"),
        AdmissionGate::with_max(max_queue),
        sink.clone(),
        metrics.clone(),
    );
    (handler, sink, metrics)
}

#[test]
fn test_topic_schema_extracts_device_id() {
    let schema = TopicSchema::new("iot", "telemetry");
    assert_eq!(schema.device_id("iot/telemetry/dev-1"), Some("dev-1"));
    assert_eq!(schema.device_id("foo/bar"), None);
    assert_eq!(schema.device_id("iot/telemetry"), None);
    assert_eq!(schema.device_id("iot/telemetry/"), None);
    assert_eq!(schema.device_id("iot/telemetry/dev-1/extra"), None);
    assert_eq!(schema.device_id("iot/alerts/dev-1"), None);
    assert_eq!(schema.device_id("other/telemetry/dev-1"), None);
}

#[test]
fn test_admission_gate_thresholds() {
    let gate = AdmissionGate::with_max(10);
    assert_eq!(gate.decide(0, 1), Admission::Admit);
    assert_eq!(gate.decide(9, 1), Admission::Admit);
    assert_eq!(gate.decide(9, 100), Admission::AdmitWithWarning);
    // at the threshold itself no warning
    assert_eq!(gate.decide(8, 100), Admission::Admit);
    assert_eq!(gate.decide(10, 1), Admission::Drop);
    assert_eq!(gate.decide(11, 100), Admission::Drop);
}

#[test]
fn test_valid_message_is_forwarded_unchanged() {
    let (handler, sink, metrics) = setup(10);

    let outcome = handler.handle("iot/telemetry/dev-1", b"42");

    assert_eq!(outcome, IngressOutcome::Forwarded);
    assert_eq!(
        sink.produced(),
        vec![OutboundRecord {
            key: b"dev-1".to_vec(),
            value: b"42".to_vec(),
        }]
    );
    assert_eq!(metrics.received(), 1);
    assert_eq!(metrics.devices(), vec!["dev-1"]);
}

#[test]
fn test_binary_payload_is_not_reencoded() {
    let (handler, sink, _) = setup(10);
    let payload = [0u8, 159, 146, 150, 255];

    handler.handle("iot/telemetry/sensor-9", &payload);

    assert_eq!(sink.produced()[0].value, payload.to_vec());
}

#[test]
fn test_invalid_topic_is_counted_and_not_forwarded() {
    let (handler, sink, metrics) = setup(10);

    let outcome = handler.handle("foo/bar", b"42");

    assert_eq!(outcome, IngressOutcome::InvalidTopic);
    assert!(sink.produced().is_empty());
    let snap = metrics.snapshot();
    assert_eq!(snap.received, 1);
    assert_eq!(snap.invalid_topic, 1);
    assert!(metrics.devices().is_empty());
}

#[test]
fn test_full_queue_drops_new_messages() {
    let (handler, sink, metrics) = setup(2);

    assert_eq!(handler.handle("iot/telemetry/a", b"1"), IngressOutcome::Forwarded);
    assert_eq!(handler.handle("iot/telemetry/b", b"2"), IngressOutcome::Forwarded);
    assert_eq!(handler.handle("iot/telemetry/c", b"3"), IngressOutcome::Dropped);

    assert_eq!(sink.produced().len(), 2);
    assert_eq!(metrics.snapshot().dropped, 1);

    // room again once a delivery resolves
    sink.resolve_next(DeliveryOutcome::Delivered);
    assert_eq!(handler.handle("iot/telemetry/c", b"3"), IngressOutcome::Forwarded);
}

#[test]
fn test_buffer_full_on_handoff_counts_as_dropped() {
    let (handler, sink, metrics) = setup(10);
    sink.fail_next(ProduceError::QueueFull);

    assert_eq!(handler.handle("iot/telemetry/a", b"1"), IngressOutcome::Dropped);

    let snap = metrics.snapshot();
    assert_eq!(snap.dropped, 1);
    assert_eq!(snap.outbound_errors, 0);
}

#[test]
fn test_client_rejection_counts_outbound_error() {
    let (handler, sink, metrics) = setup(10);
    sink.fail_next(ProduceError::Rejected("message too large".to_string()));

    assert_eq!(handler.handle("iot/telemetry/a", b"1"), IngressOutcome::Rejected);

    let snap = metrics.snapshot();
    assert_eq!(snap.outbound_errors, 1);
    assert_eq!(snap.dropped, 0);
    assert_eq!(snap.failed, 0);
    // handler keeps working afterwards
    assert_eq!(handler.handle("iot/telemetry/a", b"2"), IngressOutcome::Forwarded);
}

#[test]
fn test_panic_in_forwarding_is_contained() {
    let metrics = Arc::new(Metrics::new());
    let sink = Arc::new(MemorySink::panicking(DeliveryTracker::new(metrics.clone())));
    let handler = IngressHandler::new(
        TopicSchema::new("iot", "telemetry"),
        AdmissionGate::with_max(10),
        sink,
        metrics.clone(),
    );

    assert_eq!(handler.handle("iot/telemetry/a", b"1"), IngressOutcome::Failed);

    let snap = metrics.snapshot();
    assert_eq!(snap.received, 1);
    assert_eq!(snap.failed, 1);
}

#[test]
fn test_last_message_at_is_recorded() {
    let (handler, _, metrics) = setup(10);
    let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

    handler.handle_at("not/a/valid/topic", b"x", at);

    // stamped even for rejected messages
    assert_eq!(metrics.last_message_at(), Some(at));
}

#[test]
fn test_redelivered_message_is_not_deduplicated() {
    let (handler, sink, metrics) = setup(10);

    handler.handle("iot/telemetry/dev-1", b"42");
    sink.resolve_all(DeliveryOutcome::Delivered);
    handler.handle("iot/telemetry/dev-1", b"42");
    sink.resolve_all(DeliveryOutcome::Delivered);

    assert_eq!(sink.produced().len(), 2);
    let snap = metrics.snapshot();
    assert_eq!(snap.received, 2);
    assert_eq!(snap.sent, 2);
}

#[test]
fn test_accounting_balances_once_quiesced() {
    let (handler, sink, metrics) = setup(3);

    let topics = [
        "iot/telemetry/a",
        "iot/telemetry/b",
        "bad",
        "iot/telemetry/c",
        "iot/telemetry/d", // dropped: queue at 3
        "iot/x/y",
    ];
    for topic in topics {
        handler.on_message(topic, b"v");
    }
    sink.fail_next(ProduceError::Rejected("closed".into()));

    let in_flight = sink.queue_len() as u64;
    let snap = metrics.snapshot();
    assert_eq!(
        snap.received,
        snap.sent + snap.dropped + snap.failed + snap.invalid_topic + snap.outbound_errors
            + in_flight
    );

    sink.resolve_all(DeliveryOutcome::Delivered);
    handler.on_message("iot/telemetry/e", b"v"); // rejected by the client

    let snap = metrics.snapshot();
    assert_eq!(sink.queue_len(), 0);
    assert_eq!(snap.received, 7);
    assert_eq!(
        snap.received,
        snap.sent + snap.dropped + snap.failed + snap.invalid_topic + snap.outbound_errors
    );
    assert!(snap.received >= snap.sent + snap.dropped + snap.failed);
}
