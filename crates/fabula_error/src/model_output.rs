//! Errors for malformed responses from generative endpoints.

/// Kinds of malformed model output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum ModelOutputErrorKind {
    /// Response body was not valid JSON
    #[display("Response is not valid JSON: {}", _0)]
    InvalidJson(String),
    /// A required key is missing from the response
    #[display("Missing required key: {}", _0)]
    MissingKey(String),
    /// A key is present but has the wrong shape
    #[display("Malformed field {}: {}", field, detail)]
    MalformedField {
        /// The offending field path
        field: String,
        /// What was wrong with it
        detail: String,
    },
    /// Base64 payload could not be decoded
    #[display("Base64 decode error: {}", _0)]
    Base64Decode(String),
    /// Response carried no usable payload at all
    #[display("Empty response payload: {}", _0)]
    EmptyPayload(String),
}

/// Model output error with location tracking.
///
/// Raised when an external model answers the protocol correctly but the
/// payload does not match the contract. Never retried.
///
/// # Examples
///
/// ```
/// use fabula_error::{ModelOutputError, ModelOutputErrorKind};
///
/// let err = ModelOutputError::new(ModelOutputErrorKind::MissingKey("characters".into()));
/// assert!(format!("{}", err).contains("characters"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Model Output Error: {} at line {} in {}", kind, line, file)]
pub struct ModelOutputError {
    /// The kind of error that occurred
    pub kind: ModelOutputErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ModelOutputError {
    /// Create a new model output error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ModelOutputErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
