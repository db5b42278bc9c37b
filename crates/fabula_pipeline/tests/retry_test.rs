//! Tests for the retry harness.

use fabula_error::{
    ExternalServiceError, ExternalServiceErrorKind, FabulaErrorKind, FabulaResult,
    ValidationError, ValidationErrorKind,
};
use fabula_pipeline::retry;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn transient() -> fabula_error::FabulaError {
    ExternalServiceError::new(ExternalServiceErrorKind::Transport("reset".to_string())).into()
}

fn fatal() -> fabula_error::FabulaError {
    ValidationError::new(ValidationErrorKind::EmptyInput).into()
}

#[tokio::test]
async fn succeeds_first_try_without_delay() {
    let calls = AtomicUsize::new(0);
    let result: FabulaResult<u32> = retry(
        || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(7) }
        },
        3,
        Duration::from_millis(10),
        &CancellationToken::new(),
    )
    .await;
    assert_eq!(result.unwrap(), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn retries_transient_failures_then_succeeds() {
    let calls = AtomicUsize::new(0);
    let result: FabulaResult<&str> = retry(
        || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(transient())
                } else {
                    Ok("done")
                }
            }
        },
        3,
        Duration::from_millis(5),
        &CancellationToken::new(),
    )
    .await;
    assert_eq!(result.unwrap(), "done");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn exhaustion_maps_to_external_service_error() {
    let calls = AtomicUsize::new(0);
    let result: FabulaResult<()> = retry(
        || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(transient()) }
        },
        3,
        Duration::from_millis(5),
        &CancellationToken::new(),
    )
    .await;

    let err = result.unwrap_err();
    assert_eq!(calls.load(Ordering::SeqCst), 3, "bounded attempts");
    match err.kind() {
        FabulaErrorKind::External(e) => {
            assert!(matches!(
                e.kind,
                ExternalServiceErrorKind::Exhausted { attempts: 3, .. }
            ));
        }
        other => panic!("expected exhausted external error, got {other:?}"),
    }
}

#[tokio::test]
async fn fatal_errors_short_circuit() {
    let calls = AtomicUsize::new(0);
    let result: FabulaResult<()> = retry(
        || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(fatal()) }
        },
        5,
        Duration::from_millis(5),
        &CancellationToken::new(),
    )
    .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1, "no retry on fatal errors");
    assert!(matches!(
        result.unwrap_err().kind(),
        FabulaErrorKind::Validation(_)
    ));
}

#[tokio::test]
async fn cancellation_during_backoff_returns_immediately() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let calls = AtomicUsize::new(0);
    let started = std::time::Instant::now();
    let result: FabulaResult<()> = retry(
        || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(transient()) }
        },
        5,
        Duration::from_secs(30),
        &cancel,
    )
    .await;

    assert!(matches!(
        result.unwrap_err().kind(),
        FabulaErrorKind::Cancelled(_)
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 1, "no attempt after cancel");
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "returned without sitting out the backoff"
    );
}
