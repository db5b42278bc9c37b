//! Top-level error wrapper types.

use crate::{
    CompositionError, ExternalServiceError, ModelOutputError, RenderError, RetryableError,
    StorageError, ValidationError,
};

/// Marker error for cooperative cancellation.
///
/// Terminal but distinct from a failure: the orchestrator maps it to the
/// `cancelled` job status rather than `failed`.
#[derive(Debug, Clone, Copy, Default, derive_more::Display, derive_more::Error)]
#[display("Job cancelled")]
pub struct Cancelled;

/// The closed set of Fabula error conditions.
///
/// Every variant corresponds to one wire label exposed on failed-job
/// events; see [`FabulaErrorKind::label`].
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum FabulaErrorKind {
    /// Bad input or out-of-range option
    #[from(ValidationError)]
    Validation(ValidationError),
    /// Adapter returned malformed data
    #[from(ModelOutputError)]
    ModelOutput(ModelOutputError),
    /// Transport failure, possibly after exhausted retries
    #[from(ExternalServiceError)]
    External(ExternalServiceError),
    /// Stage-3 failure tagged with the failing scene
    #[from(RenderError)]
    Render(RenderError),
    /// Stage-4 failure
    #[from(CompositionError)]
    Composition(CompositionError),
    /// Filesystem failure
    #[from(StorageError)]
    Storage(StorageError),
    /// Cooperative cancellation
    #[from(Cancelled)]
    Cancelled(Cancelled),
}

impl FabulaErrorKind {
    /// Wire label for this error kind, as carried by failed-job events.
    pub fn label(&self) -> &'static str {
        match self {
            FabulaErrorKind::Validation(_) => "ValidationError",
            FabulaErrorKind::ModelOutput(_) => "ModelOutputError",
            FabulaErrorKind::External(_) => "ExternalServiceError",
            FabulaErrorKind::Render(_) => "RenderError",
            FabulaErrorKind::Composition(_) => "CompositionError",
            FabulaErrorKind::Storage(_) => "StorageError",
            FabulaErrorKind::Cancelled(_) => "Cancelled",
        }
    }

    /// True if this error terminates the job as `cancelled` rather than `failed`.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, FabulaErrorKind::Cancelled(_))
    }
}

/// Fabula error with kind discrimination.
///
/// # Examples
///
/// ```
/// use fabula_error::{FabulaError, FabulaResult, ValidationError, ValidationErrorKind};
///
/// fn might_fail() -> FabulaResult<()> {
///     Err(ValidationError::new(ValidationErrorKind::EmptyInput))?
/// }
///
/// let err = might_fail().unwrap_err();
/// assert_eq!(err.kind().label(), "ValidationError");
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Fabula Error: {}", _0)]
pub struct FabulaError(Box<FabulaErrorKind>);

impl FabulaError {
    /// Create a new error from a kind.
    pub fn new(kind: FabulaErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &FabulaErrorKind {
        &self.0
    }

    /// Best-effort human detail string, without source locations.
    pub fn detail(&self) -> String {
        match self.kind() {
            FabulaErrorKind::Validation(e) => e.kind.to_string(),
            FabulaErrorKind::ModelOutput(e) => e.kind.to_string(),
            FabulaErrorKind::External(e) => e.kind.to_string(),
            FabulaErrorKind::Render(e) => format!("scene {}: {}", e.scene_id, e.kind),
            FabulaErrorKind::Composition(e) => e.kind.to_string(),
            FabulaErrorKind::Storage(e) => e.kind.to_string(),
            FabulaErrorKind::Cancelled(e) => e.to_string(),
        }
    }
}

// Generic From implementation for any type that converts to FabulaErrorKind
impl<T> From<T> for FabulaError
where
    T: Into<FabulaErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

impl RetryableError for FabulaError {
    fn is_retryable(&self) -> bool {
        match self.kind() {
            FabulaErrorKind::External(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Result type for Fabula operations.
pub type FabulaResult<T> = std::result::Result<T, FabulaError>;
