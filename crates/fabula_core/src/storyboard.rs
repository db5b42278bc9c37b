//! Storyboard types produced by stage 2.

use crate::{Appearance, Gender};
use serde::{Deserialize, Serialize};

/// How a scene image should be composed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Full positive prompt for the image model
    pub prompt: String,
    /// Style tags appended to the prompt
    pub style_tags: Vec<String>,
    /// Shot type, e.g. "medium_shot"
    pub shot_type: String,
    /// Camera angle, e.g. "eye_level"
    pub camera_angle: String,
    /// Camera movement, e.g. "static"
    pub camera_movement: String,
    /// Composition principle
    pub composition: String,
    /// Lighting design
    pub lighting: String,
    /// Mood of the frame
    pub mood: String,
    /// Transition into the next scene
    pub transition: String,
}

/// What a scene audio unit contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "lowercase")]
pub enum AudioKind {
    /// Narrator voice-over
    #[display("narration")]
    Narration,
    /// Character speech
    #[display("dialogue")]
    Dialogue,
    /// No audio; a fixed-length quiet track
    #[display("silence")]
    Silence,
}

/// One unit of audio to synthesize for a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioUnit {
    /// Narration, dialogue or silence
    pub kind: AudioKind,
    /// Speaking character for dialogue units
    pub speaker: Option<String>,
    /// Text to speak; empty for silence
    pub text: String,
    /// Estimated duration in seconds
    pub estimated_duration: f64,
}

impl AudioUnit {
    /// A quiet track of the given length.
    pub fn silence(duration: f64) -> Self {
        Self {
            kind: AudioKind::Silence,
            speaker: None,
            text: String::new(),
            estimated_duration: duration,
        }
    }
}

/// Merged global + per-scene appearance snapshot for one character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedCharacter {
    /// Character name
    pub name: String,
    /// Appearance after overlaying the scene override
    pub appearance: Appearance,
    /// Personality from the global record
    pub personality: String,
    /// Role from the global record
    pub role: String,
}

impl ResolvedCharacter {
    /// Short prompt fragment describing this character.
    pub fn prompt_fragment(&self) -> String {
        let mut parts = vec![self.name.clone()];
        if self.appearance.gender != Gender::Unknown {
            parts.push(format!("{:?}", self.appearance.gender).to_lowercase());
        }
        for attr in [
            &self.appearance.hair,
            &self.appearance.eyes,
            &self.appearance.clothing,
            &self.appearance.features,
        ] {
            if !attr.is_empty() {
                parts.push(attr.clone());
            }
        }
        parts.join(", ")
    }
}

/// A scene ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryboardScene {
    /// Scene number carried over from analysis
    pub scene_id: u32,
    /// Chapter the scene belongs to
    pub chapter_id: u32,
    /// Where the scene takes place
    pub location: String,
    /// When the scene takes place
    pub time: String,
    /// Environment description
    pub description: String,
    /// Mood of the scene
    pub atmosphere: String,
    /// Image prompt bundle
    pub image_info: ImageInfo,
    /// Ordered audio units for the scene
    pub audio: Vec<AudioUnit>,
    /// Characters present with merged appearance
    pub characters_resolved: Vec<ResolvedCharacter>,
    /// Estimated duration, clamped to the configured range
    pub estimated_duration: f64,
}

/// A chapter of storyboard scenes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryboardChapter {
    /// Chapter number
    pub chapter_id: u32,
    /// Chapter title
    pub title: String,
    /// Scenes in order
    pub scenes: Vec<StoryboardScene>,
}

/// Output of stage 2.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Storyboard {
    /// Chapters in order
    pub chapters: Vec<StoryboardChapter>,
}

impl Storyboard {
    /// Total number of scenes across all chapters.
    pub fn scene_count(&self) -> usize {
        self.chapters.iter().map(|c| c.scenes.len()).sum()
    }

    /// Sum of estimated scene durations.
    pub fn estimated_duration(&self) -> f64 {
        self.chapters
            .iter()
            .flat_map(|c| &c.scenes)
            .map(|s| s.estimated_duration)
            .sum()
    }

    /// Iterate scenes in storyboard order.
    pub fn scenes(&self) -> impl Iterator<Item = &StoryboardScene> {
        self.chapters.iter().flat_map(|c| c.scenes.iter())
    }
}
