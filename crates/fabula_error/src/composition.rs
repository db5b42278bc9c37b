//! Stage-4 composition errors.

/// Kinds of composition failures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum CompositionErrorKind {
    /// The media tool exited non-zero; message carries captured stderr
    #[display("Media tool failed: {}", _0)]
    CommandFailed(String),
    /// The media tool ran past its deadline
    #[display("Media tool timed out: {}", _0)]
    Timeout(String),
    /// Failed to spawn the media tool process
    #[display("Failed to launch media tool: {}", _0)]
    Spawn(String),
    /// A required input file is missing
    #[display("Missing input: {}", _0)]
    MissingInput(String),
    /// Duration probe output was unusable
    #[display("Unreadable probe output: {}", _0)]
    Probe(String),
}

/// Composition error with location tracking.
///
/// # Examples
///
/// ```
/// use fabula_error::{CompositionError, CompositionErrorKind};
///
/// let err = CompositionError::new(CompositionErrorKind::Timeout("concat".into()));
/// assert!(format!("{}", err).contains("timed out"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Composition Error: {} at line {} in {}", kind, line, file)]
pub struct CompositionError {
    /// The kind of error that occurred
    pub kind: CompositionErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl CompositionError {
    /// Create a new composition error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: CompositionErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
