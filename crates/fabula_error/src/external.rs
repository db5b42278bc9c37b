//! Transport-level errors from external services.

use crate::RetryableError;

/// Kinds of external service failures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum ExternalServiceErrorKind {
    /// Connection-level failure (refused, reset, DNS)
    #[display("Transport error: {}", _0)]
    Transport(String),
    /// Request exceeded its deadline
    #[display("Request timed out: {}", _0)]
    Timeout(String),
    /// Service answered with a non-success status
    #[display("HTTP {} error: {}", status_code, message)]
    Status {
        /// HTTP status code
        status_code: u16,
        /// Error message from the service
        message: String,
    },
    /// All retry attempts were used up
    #[display("Retries exhausted after {} attempts: {}", attempts, last_error)]
    Exhausted {
        /// How many attempts were made
        attempts: usize,
        /// The final error message
        last_error: String,
    },
}

impl ExternalServiceErrorKind {
    /// Check if this error type should be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExternalServiceErrorKind::Transport(_) => true,
            ExternalServiceErrorKind::Timeout(_) => true,
            ExternalServiceErrorKind::Status { status_code, .. } => {
                matches!(*status_code, 408 | 429 | 500 | 502 | 503 | 504)
            }
            ExternalServiceErrorKind::Exhausted { .. } => false,
        }
    }
}

/// External service error with location tracking.
///
/// # Examples
///
/// ```
/// use fabula_error::{ExternalServiceError, ExternalServiceErrorKind, RetryableError};
///
/// let err = ExternalServiceError::new(ExternalServiceErrorKind::Status {
///     status_code: 503,
///     message: "Service unavailable".to_string(),
/// });
/// assert!(err.is_retryable());
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("External Service Error: {} at line {} in {}", kind, line, file)]
pub struct ExternalServiceError {
    /// The kind of error that occurred
    pub kind: ExternalServiceErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ExternalServiceError {
    /// Create a new external service error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ExternalServiceErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

impl RetryableError for ExternalServiceError {
    fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}
