//! Adapter implementations for the Fabula pipeline.
//!
//! Thin, stateless wrappers over the external collaborators:
//! an OpenAI-compatible chat endpoint for text understanding, image and
//! speech synthesis endpoints with base64-in-JSON payloads, and the
//! `ffmpeg`/`ffprobe` command pair for muxing. Each adapter maps its
//! protocol onto one capability trait from `fabula_interface` and raises
//! typed errors: transport problems are retryable, malformed payloads are
//! fatal.

#![forbid(unsafe_code)]

mod ffmpeg;
mod http;
mod image;
mod narrative;
mod speech;

pub use ffmpeg::{FfmpegConfig, FfmpegTool};
pub use image::ImageModelClient;
pub use narrative::NarrativeModelClient;
pub use speech::SpeechModelClient;
