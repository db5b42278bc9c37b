//! Per-job configuration.

use crate::VoiceSpec;
use fabula_error::{ValidationError, ValidationErrorKind};
use serde::{Deserialize, Serialize};

/// Strategy for stage 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerMode {
    /// One adapter call over the whole text
    #[display("simple")]
    Simple,
    /// Windowed calls merged into one result
    #[default]
    #[display("chunked")]
    Chunked,
}

/// Per-scene audio granularity for dialogue.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum DialogueMode {
    /// One audio unit per dialogue line
    #[display("per_line")]
    PerLine,
    /// One merged audio unit per scene
    #[default]
    #[display("merged")]
    Merged,
}

/// Options recognized at job submission.
///
/// Every field has a serde default so submitters only supply what they
/// want to override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobOptions {
    /// Stage-1 strategy
    pub analyzer_mode: AnalyzerMode,
    /// Cap on extracted characters
    pub max_characters: usize,
    /// Cap on extracted scenes
    pub max_scenes: usize,
    /// Characters per window in chunked mode
    pub chunk_size: usize,
    /// Minimum accepted input length
    pub min_text_length: usize,
    /// Maximum accepted input length
    pub max_text_length: usize,
    /// Per-scene audio granularity
    pub dialogue_mode: DialogueMode,
    /// Lower clamp for estimated scene duration, seconds
    pub duration_min: f64,
    /// Upper clamp for estimated scene duration, seconds
    pub duration_max: f64,
    /// Speech pacing used for the duration estimate
    pub chars_per_second: f64,
    /// Seconds added per listed action
    pub action_seconds: f64,
    /// Duration of a silent scene, seconds
    pub silent_scene_duration: f64,
    /// Image dimensions as "WxH"
    pub image_size: String,
    /// Bounded attempts per external operation
    pub retry_attempts: usize,
    /// Per-operation timeout, seconds
    pub request_timeout_secs: u64,
    /// Overall job deadline, seconds; none means unbounded
    pub job_timeout_secs: Option<u64>,
    /// Stage-3 fan-out bound
    pub max_parallel_scenes: usize,
    /// Skip scratch cleanup when the job fails or is cancelled
    pub retain_scratch_on_failure: bool,
    /// Speech speed multiplier passed to the TTS adapter
    pub speech_speed_ratio: f64,
    /// Audio container requested from the TTS adapter
    pub audio_encoding: String,
    /// Voice used for narration units
    pub narrator_voice: String,
    /// Voice used when no catalog entry matches
    pub default_voice: String,
    /// Override for the built-in voice catalog
    pub voice_catalog: Option<Vec<VoiceSpec>>,
    /// Seed forwarded to the image adapter when it honors one
    pub image_seed: Option<u64>,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            analyzer_mode: AnalyzerMode::default(),
            max_characters: 10,
            max_scenes: 30,
            chunk_size: 3000,
            min_text_length: 100,
            max_text_length: 50_000,
            dialogue_mode: DialogueMode::default(),
            duration_min: 3.0,
            duration_max: 10.0,
            chars_per_second: 3.0,
            action_seconds: 1.5,
            silent_scene_duration: 3.0,
            image_size: "1024x1024".to_string(),
            retry_attempts: 3,
            request_timeout_secs: 300,
            job_timeout_secs: None,
            max_parallel_scenes: 1,
            retain_scratch_on_failure: false,
            speech_speed_ratio: 1.0,
            audio_encoding: "mp3".to_string(),
            narrator_voice: "qiniu_zh_male_tyygjs".to_string(),
            default_voice: "qiniu_zh_female_wwxkjx".to_string(),
            voice_catalog: None,
            image_seed: None,
        }
    }
}

impl JobOptions {
    /// Check option ranges before a job is accepted.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_scenes == 0 {
            return Err(ValidationError::new(ValidationErrorKind::InvalidOption(
                "max_scenes must be at least 1".to_string(),
            )));
        }
        if self.max_characters == 0 {
            return Err(ValidationError::new(ValidationErrorKind::InvalidOption(
                "max_characters must be at least 1".to_string(),
            )));
        }
        if self.chunk_size == 0 {
            return Err(ValidationError::new(ValidationErrorKind::InvalidOption(
                "chunk_size must be at least 1".to_string(),
            )));
        }
        if self.duration_min <= 0.0 || self.duration_max < self.duration_min {
            return Err(ValidationError::new(ValidationErrorKind::InvalidOption(
                format!(
                    "duration clamp [{}, {}] is not a valid range",
                    self.duration_min, self.duration_max
                ),
            )));
        }
        if self.chars_per_second <= 0.0 {
            return Err(ValidationError::new(ValidationErrorKind::InvalidOption(
                "chars_per_second must be positive".to_string(),
            )));
        }
        if self.retry_attempts == 0 {
            return Err(ValidationError::new(ValidationErrorKind::InvalidOption(
                "retry_attempts must be at least 1".to_string(),
            )));
        }
        if self.max_parallel_scenes == 0 {
            return Err(ValidationError::new(ValidationErrorKind::InvalidOption(
                "max_parallel_scenes must be at least 1".to_string(),
            )));
        }
        if parse_image_size(&self.image_size).is_none() {
            return Err(ValidationError::new(ValidationErrorKind::InvalidOption(
                format!("image_size {:?} is not WxH", self.image_size),
            )));
        }
        Ok(())
    }
}

/// Parse a "WxH" size string into a (width, height) pair.
pub fn parse_image_size(size: &str) -> Option<(u32, u32)> {
    let (w, h) = size.split_once(['x', 'X'])?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}
