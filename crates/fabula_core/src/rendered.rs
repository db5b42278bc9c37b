//! Artifacts produced by stages 3 and 4.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A scene with its synthesized assets on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedScene {
    /// Scene number carried over from the storyboard
    pub scene_id: u32,
    /// Chapter the scene belongs to
    pub chapter_id: u32,
    /// Absolute path of the scene still inside the scratch tree
    pub image_path: PathBuf,
    /// Absolute path of the scene audio track inside the scratch tree
    pub audio_path: PathBuf,
    /// Duration reported by probing the audio track
    pub measured_audio_duration: f64,
    /// max(estimated, measured); the clip length used for muxing
    pub final_duration: f64,
}

/// A chapter of rendered scenes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedChapter {
    /// Chapter number
    pub chapter_id: u32,
    /// Chapter title
    pub title: String,
    /// Rendered scenes, in storyboard order
    pub scenes: Vec<RenderedScene>,
}

impl RenderedChapter {
    /// Sum of final scene durations in this chapter.
    pub fn total_duration(&self) -> f64 {
        self.scenes.iter().map(|s| s.final_duration).sum()
    }
}

/// Output of stage 3.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RenderedStoryboard {
    /// Chapters in order
    pub chapters: Vec<RenderedChapter>,
}

impl RenderedStoryboard {
    /// Total number of rendered scenes.
    pub fn scene_count(&self) -> usize {
        self.chapters.iter().map(|c| c.scenes.len()).sum()
    }
}

/// Descriptor of the promoted final video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalVideo {
    /// Location of the promoted file
    #[serde(rename = "video_path")]
    pub path: PathBuf,
    /// Container duration in seconds
    #[serde(rename = "duration")]
    pub duration_seconds: f64,
    /// File size in bytes
    #[serde(rename = "file_size")]
    pub byte_size: u64,
    /// Number of scenes that went into the video
    #[serde(rename = "scenes_count")]
    pub scene_count: usize,
    /// Number of chapters that went into the video
    #[serde(rename = "chapters_count")]
    pub chapter_count: usize,
}
