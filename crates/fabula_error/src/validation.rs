//! Input validation error types.

/// Kinds of validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum ValidationErrorKind {
    /// Input text is empty or whitespace only
    #[display("Input text is empty")]
    EmptyInput,
    /// Input text is shorter than the configured minimum
    #[display("Input text too short: {} characters, minimum {}", actual, min)]
    TextTooShort {
        /// Configured minimum length
        min: usize,
        /// Actual input length
        actual: usize,
    },
    /// Input text exceeds the configured maximum
    #[display("Input text too long: {} characters, maximum {}", actual, max)]
    TextTooLong {
        /// Configured maximum length
        max: usize,
        /// Actual input length
        actual: usize,
    },
    /// Analysis produced no characters
    #[display("Analysis extracted no characters")]
    NoCharacters,
    /// Analysis produced no scenes
    #[display("Analysis extracted no scenes")]
    NoScenes,
    /// A chapter has an empty scene list
    #[display("Chapter {} has no scenes", _0)]
    EmptyChapter(u32),
    /// A job option is out of range
    #[display("Invalid option: {}", _0)]
    InvalidOption(String),
}

/// Validation error with location tracking.
///
/// # Examples
///
/// ```
/// use fabula_error::{ValidationError, ValidationErrorKind};
///
/// let err = ValidationError::new(ValidationErrorKind::TextTooShort { min: 100, actual: 12 });
/// assert!(format!("{}", err).contains("too short"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Validation Error: {} at line {} in {}", kind, line, file)]
pub struct ValidationError {
    /// The kind of error that occurred
    pub kind: ValidationErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ValidationError {
    /// Create a new validation error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ValidationErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
