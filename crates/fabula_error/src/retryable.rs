//! Retry classification for fallible operations.

/// Trait for errors that support retry classification.
///
/// Transient failures such as connection resets, timeouts, 429 and 5xx
/// responses should return `true`; malformed payloads and validation
/// failures should return `false` so the caller fails immediately.
///
/// # Examples
///
/// ```
/// use fabula_error::{ExternalServiceError, ExternalServiceErrorKind, RetryableError};
///
/// let err = ExternalServiceError::new(ExternalServiceErrorKind::Timeout("tts".into()));
/// assert!(err.is_retryable());
/// ```
pub trait RetryableError {
    /// Returns true if this error should trigger a retry.
    fn is_retryable(&self) -> bool;
}
