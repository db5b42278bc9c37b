//! Error types for the Fabula pipeline.
//!
//! This crate provides the foundation error types used throughout the Fabula
//! workspace.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! The top-level [`FabulaErrorKind`] is a closed set; every variant maps to
//! one of the wire labels exposed on failed-job events via
//! [`FabulaErrorKind::label`].
//!
//! # Examples
//!
//! ```
//! use fabula_error::{FabulaResult, StorageError, StorageErrorKind};
//!
//! fn write_blob() -> FabulaResult<()> {
//!     Err(StorageError::new(StorageErrorKind::FileWrite("disk full".into())))?
//! }
//!
//! assert!(write_blob().is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod composition;
mod error;
mod external;
mod model_output;
mod render;
mod retryable;
mod storage;
mod validation;

pub use composition::{CompositionError, CompositionErrorKind};
pub use error::{Cancelled, FabulaError, FabulaErrorKind, FabulaResult};
pub use external::{ExternalServiceError, ExternalServiceErrorKind};
pub use model_output::{ModelOutputError, ModelOutputErrorKind};
pub use render::{RenderError, RenderErrorKind};
pub use retryable::RetryableError;
pub use storage::{StorageError, StorageErrorKind};
pub use validation::{ValidationError, ValidationErrorKind};
