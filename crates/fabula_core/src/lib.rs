//! Core data types for the Fabula prose-to-video pipeline.
//!
//! This crate provides the foundation data types shared by every stage:
//! the job record and its options, the analyzed text entity graph, the
//! storyboard, rendered artifacts, progress events, and the voice catalog.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod analysis;
mod event;
mod job;
mod options;
mod rendered;
mod storyboard;
mod voice;

pub use analysis::{
    AgeStage, AgeVariant, AnalyzedText, Appearance, Chapter, Character, DialogueLine, Gender,
    PlotKind, PlotPoint, Scene,
};
pub use event::{EventPayload, JobEvent};
pub use job::{Job, JobError, JobId, JobStatus, Stage};
pub use options::{parse_image_size, AnalyzerMode, DialogueMode, JobOptions};
pub use rendered::{FinalVideo, RenderedChapter, RenderedScene, RenderedStoryboard};
pub use storyboard::{
    AudioKind, AudioUnit, ImageInfo, ResolvedCharacter, Storyboard, StoryboardChapter,
    StoryboardScene,
};
pub use voice::{builtin_catalog, VoiceSpec};
