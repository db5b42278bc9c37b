//! Shared request plumbing for the HTTP-backed adapters.

use fabula_error::{ExternalServiceError, ExternalServiceErrorKind, FabulaError};
use reqwest::Response;

/// Map a reqwest transport failure onto the retryable error taxonomy.
pub(crate) fn transport_error(context: &str, err: reqwest::Error) -> FabulaError {
    let kind = if err.is_timeout() {
        ExternalServiceErrorKind::Timeout(format!("{context}: {err}"))
    } else {
        ExternalServiceErrorKind::Transport(format!("{context}: {err}"))
    };
    ExternalServiceError::new(kind).into()
}

/// Reject non-success responses, preserving the provider's message.
pub(crate) async fn check_status(context: &str, response: Response) -> Result<Response, FabulaError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::error!(context, status = %status, body = %body, "provider returned error status");
    Err(ExternalServiceError::new(ExternalServiceErrorKind::Status {
        status_code: status.as_u16(),
        message: format!("{context}: {body}"),
    })
    .into())
}
