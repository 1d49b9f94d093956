use super::{FlushReport, ShutdownCoordinator, exit_code, join_bounded, listen_for_signals};
use crate::metrics::Metrics;
use crate::outbound::memory::MemorySink;
use crate::outbound::{DeliveryOutcome, DeliveryTracker, OutboundSink};
use crate::utils::BridgeError;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn coordinator() -> (ShutdownCoordinator, Arc<MemorySink>, Arc<Metrics>) {
    let metrics = Arc::new(Metrics::new());
    let sink = Arc::new(MemorySink::new(DeliveryTracker::new(metrics.clone())));
    let coordinator = ShutdownCoordinator::new(
        CancellationToken::new(),
        sink.clone(),
        metrics.clone(),
        Duration::from_millis(50),
    );
    (coordinator, sink, metrics)
}

#[test]
fn test_exit_codes() {
    assert_eq!(exit_code(&Ok(())), 0);
    assert_eq!(
        exit_code(&Err(BridgeError::ConnectRetriesExhausted {
            attempts: 6,
            last_error: "connection refused".to_string(),
        })),
        1
    );
    assert_eq!(exit_code(&Err(BridgeError::Tls("missing".into()))), 1);
}

#[tokio::test]
async fn test_flush_of_empty_queue_abandons_nothing() {
    let (coordinator, _, _) = coordinator();
    assert_eq!(coordinator.flush().await, FlushReport { abandoned: 0 });
}

#[tokio::test]
async fn test_unresolved_records_are_abandoned_uncounted() {
    let (coordinator, sink, metrics) = coordinator();
    sink.produce(b"dev-1", b"1").unwrap();
    sink.produce(b"dev-2", b"2").unwrap();
    sink.produce(b"dev-3", b"3").unwrap();
    sink.resolve_next(DeliveryOutcome::Delivered);

    let report = coordinator.flush().await;

    assert_eq!(report.abandoned, 2);
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.sent, 1);
    assert_eq!(snapshot.failed, 0);
}

#[tokio::test]
async fn test_finish_cancels_token_and_passes_outcome_through() {
    let (coordinator, _, _) = coordinator();
    let token = coordinator.token().clone();

    let outcome = coordinator
        .finish(Err(BridgeError::OutboundInit("no brokers".into())))
        .await;

    assert!(token.is_cancelled());
    assert!(matches!(outcome, Err(BridgeError::OutboundInit(_))));
    assert!(coordinator.finish(Ok(())).await.is_ok());
}

#[test]
fn test_trigger_is_idempotent() {
    let (coordinator, _, _) = coordinator();
    coordinator.trigger("first");
    coordinator.trigger("second");
    assert!(coordinator.token().is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_join_bounded_aborts_stuck_task() {
    let mut stuck = tokio::spawn(std::future::pending::<()>());
    assert_eq!(
        join_bounded(&mut stuck, Duration::from_secs(5), "stuck").await,
        None
    );

    let mut quick = tokio::spawn(async { 7 });
    assert_eq!(
        join_bounded(&mut quick, Duration::from_secs(5), "quick").await,
        Some(7)
    );
}

#[tokio::test]
async fn test_signal_listener_exits_with_token() {
    let token = CancellationToken::new();
    let listener = listen_for_signals(token.clone());
    token.cancel();
    tokio::time::timeout(Duration::from_secs(1), listener)
        .await
        .expect("listener stops")
        .unwrap();
}
