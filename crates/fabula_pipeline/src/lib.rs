//! The Fabula job pipeline runtime.
//!
//! This crate drives a job through the four stages — text analysis,
//! storyboard construction, scene rendering, and composition — and owns
//! everything that makes the run observable and interruptible: the retry
//! harness, the per-job voice registry, the progress band mapping, and
//! cooperative cancellation.
//!
//! The [`Engine`] is the entry point: it accepts submissions, spawns one
//! task per job, publishes progress on an [`fabula_events::EventBus`], and
//! guarantees that every job ends in exactly one terminal status.

#![forbid(unsafe_code)]

mod analyzer;
mod composer;
mod engine;
mod renderer;
mod retry;
mod settings;
mod storyboard;
mod voices;

pub use analyzer::TextAnalyzer;
pub use composer::SceneComposer;
pub use engine::{Adapters, Engine};
pub use renderer::SceneRenderer;
pub use retry::{retry, with_deadline};
pub use settings::EngineSettings;
pub use storyboard::StoryboardBuilder;
pub use voices::VoiceRegistry;
