//! Bounded retry with exponential backoff and cancellation.

use fabula_error::{
    Cancelled, ExternalServiceError, ExternalServiceErrorKind, FabulaError, FabulaResult,
    RetryableError,
};
use std::future::Future;
use std::time::Duration;
use tokio_retry2::strategy::{jitter, ExponentialBackoff};
use tokio_retry2::{Retry, RetryError};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Run a fallible operation with bounded attempts and exponential delay.
///
/// The delay before attempt `i + 1` is `base_delay * 2^i` with jitter.
/// Classification comes from [`RetryableError`]: a non-retryable error is
/// raised immediately, a retryable one is re-attempted until `attempts`
/// runs out and is then mapped to `ExternalServiceError::Exhausted`.
///
/// The whole loop races `cancel`; cancellation during a backoff sleep
/// returns `Cancelled` without executing the next attempt.
pub async fn retry<T, F, Fut>(
    mut op: F,
    attempts: usize,
    base_delay: Duration,
    cancel: &CancellationToken,
) -> FabulaResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = FabulaResult<T>>,
{
    let attempts = attempts.max(1);
    // from_millis(2) yields 2^1, 2^2, ... which the factor scales back to
    // base, 2*base, 4*base.
    let factor = (base_delay.as_millis() as u64 / 2).max(1);
    let strategy = ExponentialBackoff::from_millis(2)
        .factor(factor)
        .map(jitter)
        .take(attempts - 1);

    let body = Retry::spawn(strategy, || {
        let fut = op();
        async move {
            match fut.await {
                Ok(value) => Ok(value),
                Err(e) if e.is_retryable() => {
                    warn!(error = %e, "retryable failure");
                    Err(RetryError::Transient {
                        err: e,
                        retry_after: None,
                    })
                }
                Err(e) => Err(RetryError::Permanent(e)),
            }
        }
    });

    let result = tokio::select! {
        _ = cancel.cancelled() => return Err(Cancelled.into()),
        result = body => result,
    };

    result.map_err(|e: FabulaError| {
        if e.is_retryable() {
            // The strategy ran dry on a transient error.
            ExternalServiceError::new(ExternalServiceErrorKind::Exhausted {
                attempts,
                last_error: e.detail(),
            })
            .into()
        } else {
            e
        }
    })
}

/// Bound one adapter call by the per-operation timeout.
///
/// A deadline overrun surfaces as a retryable `ExternalServiceError` so
/// the harness treats it like any other transient transport failure.
pub async fn with_deadline<T, Fut>(deadline: Duration, context: &str, fut: Fut) -> FabulaResult<T>
where
    Fut: Future<Output = FabulaResult<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(ExternalServiceError::new(ExternalServiceErrorKind::Timeout(
            format!("{context}: no response within {}s", deadline.as_secs()),
        ))
        .into()),
    }
}
