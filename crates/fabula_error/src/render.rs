//! Stage-3 rendering errors.

/// Kinds of per-scene rendering failures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum RenderErrorKind {
    /// Image synthesis failed past retry
    #[display("Image synthesis failed: {}", _0)]
    Image(String),
    /// Speech synthesis failed past retry
    #[display("Speech synthesis failed: {}", _0)]
    Speech(String),
    /// Duration probe on the rendered audio failed
    #[display("Audio probe failed: {}", _0)]
    Probe(String),
    /// A scene with no usable voice assignment
    #[display("No voice available for speaker {}", _0)]
    UnassignedSpeaker(String),
}

/// Rendering error tagged with the scene it occurred in.
///
/// # Examples
///
/// ```
/// use fabula_error::{RenderError, RenderErrorKind};
///
/// let err = RenderError::new(2, RenderErrorKind::Image("no bytes".into()));
/// assert_eq!(err.scene_id, 2);
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Render Error in scene {}: {} at line {} in {}", scene_id, kind, line, file)]
pub struct RenderError {
    /// Scene in which rendering failed
    pub scene_id: u32,
    /// The kind of error that occurred
    pub kind: RenderErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl RenderError {
    /// Create a new render error with automatic location tracking.
    #[track_caller]
    pub fn new(scene_id: u32, kind: RenderErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            scene_id,
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
