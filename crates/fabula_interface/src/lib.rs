//! Capability traits for the external collaborators of the pipeline.
//!
//! Each trait hides one protocol and exposes one capability: structured
//! text understanding, image synthesis, speech synthesis, and media
//! muxing. Implementations live in `fabula_models`; tests substitute
//! scripted fakes. All adapters are stateless and safe for concurrent use
//! within a job.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use fabula_error::FabulaResult;
use std::path::Path;

/// Structured analysis of prose through a language model.
///
/// The adapter returns the raw JSON object; the calling stage parses and
/// validates it against the entity-graph contract. Transport failures are
/// retryable; a response that is not a JSON object is fatal.
#[async_trait]
pub trait TextUnderstanding: Send + Sync {
    /// Run `prompt` against `text` and return the model's JSON object.
    async fn analyze(&self, prompt: &str, text: &str) -> FabulaResult<serde_json::Value>;
}

/// Text-to-image synthesis.
#[async_trait]
pub trait ImageSynthesis: Send + Sync {
    /// Generate one image and return its raw encoded bytes (PNG or JPEG).
    ///
    /// `size` is a "WxH" string understood by the provider. `seed` is
    /// forwarded when the provider honors one.
    async fn generate_image(
        &self,
        prompt: &str,
        size: &str,
        seed: Option<u64>,
    ) -> FabulaResult<Vec<u8>>;
}

/// Text-to-speech synthesis.
#[async_trait]
pub trait SpeechSynthesis: Send + Sync {
    /// Synthesize `text` with the given provider voice and return raw
    /// encoded audio bytes in the requested container (e.g. "mp3").
    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        speed_ratio: f64,
        encoding: &str,
    ) -> FabulaResult<Vec<u8>>;
}

/// Command-shaped media processing: muxing, concatenation, probing.
///
/// Every operation runs to completion under a configured timeout; on a
/// non-zero exit the captured stderr is embedded in the error detail.
#[async_trait]
pub trait MediaMux: Send + Sync {
    /// Loop a still image over an audio track into a video clip of the
    /// given duration.
    async fn mux_still(
        &self,
        image_path: &Path,
        audio_path: &Path,
        duration: f64,
        out_path: &Path,
    ) -> FabulaResult<()>;

    /// Concatenate codec-compatible inputs by stream copy, no re-encode.
    ///
    /// Works for both the scene clips and bare audio tracks.
    async fn concat(&self, inputs: &[&Path], out_path: &Path) -> FabulaResult<()>;

    /// Container duration of a media file, in seconds.
    async fn probe_duration(&self, path: &Path) -> FabulaResult<f64>;

    /// Write a quiet audio track of the given length.
    async fn make_silence(&self, duration: f64, out_path: &Path) -> FabulaResult<()>;
}
