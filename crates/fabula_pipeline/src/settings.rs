//! Engine configuration.
//!
//! Settings layer bundled defaults, an optional `./fabula.toml`, and
//! `FABULA_`-prefixed environment variables, with later sources winning.
//! Everything here is read-only after boot; per-job knobs live in
//! `JobOptions`.

use config::{Config, Environment, File, FileFormat};
use fabula_error::{FabulaResult, ValidationError, ValidationErrorKind};
use serde::Deserialize;
use std::path::PathBuf;

const DEFAULT_SETTINGS: &str = include_str!("../fabula.default.toml");

/// Process-wide engine settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    /// Root for per-job scratch trees
    pub scratch_base: PathBuf,
    /// Root for promoted final videos
    pub videos_base: PathBuf,
    /// Base URL of the generative API provider
    pub model_endpoint: String,
    /// API key for the provider; set through `FABULA_API_KEY`
    #[serde(default)]
    pub api_key: String,
    /// Model for text understanding
    pub analysis_model: String,
    /// Model for image synthesis
    pub image_model: String,
    /// Marker inserted between merged dialogue lines
    pub dialogue_pause_marker: String,
    /// Per-subscriber event queue depth
    pub event_capacity: usize,
    /// ffmpeg binary name or path
    pub ffmpeg_bin: String,
    /// ffprobe binary name or path
    pub ffprobe_bin: String,
    /// Deadline for a single media-tool invocation, seconds
    pub mux_timeout_secs: u64,
    /// Video codec for scene clips
    pub video_codec: String,
    /// Encoder preset
    pub video_preset: String,
    /// Audio codec for scene clips
    pub audio_codec: String,
    /// Audio bitrate for scene clips
    pub audio_bitrate: String,
    /// Pixel format for scene clips
    pub pixel_format: String,
}

impl EngineSettings {
    /// Load settings from the default layer, `./fabula.toml` and the
    /// environment.
    pub fn load() -> FabulaResult<Self> {
        Self::load_from(None)
    }

    /// Load settings with an explicit override file.
    pub fn load_from(path: Option<&str>) -> FabulaResult<Self> {
        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_SETTINGS, FileFormat::Toml));
        builder = match path {
            Some(path) => builder.add_source(File::with_name(path)),
            None => builder.add_source(File::with_name("fabula").required(false)),
        };
        let config = builder
            .add_source(Environment::with_prefix("FABULA"))
            .build()
            .map_err(|e| {
                ValidationError::new(ValidationErrorKind::InvalidOption(format!(
                    "settings: {e}"
                )))
            })?;
        config.try_deserialize().map_err(|e| {
            ValidationError::new(ValidationErrorKind::InvalidOption(format!("settings: {e}")))
                .into()
        })
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Config::builder()
            .add_source(File::from_str(DEFAULT_SETTINGS, FileFormat::Toml))
            .build()
            .and_then(Config::try_deserialize)
            .expect("bundled default settings parse")
    }
}
