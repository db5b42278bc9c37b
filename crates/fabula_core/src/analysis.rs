//! Entity graph produced by text understanding.
//!
//! These types mirror the JSON contract of the text-understanding adapter:
//! unknown keys are ignored on deserialization, missing optional keys take
//! their defaults, and a missing required key fails the parse.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Character gender as reported by the analysis model.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    /// Male character
    Male,
    /// Female character
    Female,
    /// Gender not determined from the text
    #[default]
    #[serde(other)]
    Unknown,
}

/// Coarse age bucket used for voice matching.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AgeStage {
    /// Under roughly 12
    Child,
    /// Roughly 12 to 25
    Youth,
    /// Roughly 25 to 60
    Adult,
    /// Over roughly 60
    Elder,
    /// Age not determined from the text
    #[default]
    #[serde(other)]
    Unknown,
}

impl AgeStage {
    /// Bucket a numeric age into a stage.
    pub fn from_age(age: u32) -> Self {
        if age < 12 {
            AgeStage::Child
        } else if age < 25 {
            AgeStage::Youth
        } else if age < 60 {
            AgeStage::Adult
        } else {
            AgeStage::Elder
        }
    }
}

/// Physical description of a character.
///
/// All descriptive fields are free text; an empty string means the model
/// did not report that attribute.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Appearance {
    /// Character gender
    #[serde(default)]
    pub gender: Gender,
    /// Numeric age if the text states one
    #[serde(default)]
    pub age: Option<u32>,
    /// Coarse age bucket
    #[serde(default)]
    pub age_stage: AgeStage,
    /// Hair style and color
    #[serde(default)]
    pub hair: String,
    /// Eye color and features
    #[serde(default)]
    pub eyes: String,
    /// Typical clothing
    #[serde(default)]
    pub clothing: String,
    /// Distinguishing features
    #[serde(default)]
    pub features: String,
    /// Body type
    #[serde(default)]
    pub body_type: String,
    /// Height description
    #[serde(default)]
    pub height: String,
    /// Skin description
    #[serde(default)]
    pub skin: String,
}

impl Appearance {
    /// The age bucket to use for voice matching: an explicit numeric age
    /// wins over the reported stage.
    pub fn effective_age_stage(&self) -> AgeStage {
        match self.age {
            Some(age) => AgeStage::from_age(age),
            None => self.age_stage,
        }
    }

    /// Overlay `other` on top of `self`: non-empty attributes of `other` win.
    pub fn overlaid_with(&self, other: &Appearance) -> Appearance {
        fn pick(over: &str, base: &str) -> String {
            if over.is_empty() { base } else { over }.to_string()
        }
        Appearance {
            gender: if other.gender == Gender::Unknown {
                self.gender
            } else {
                other.gender
            },
            age: other.age.or(self.age),
            age_stage: if other.age_stage == AgeStage::Unknown {
                self.age_stage
            } else {
                other.age_stage
            },
            hair: pick(&other.hair, &self.hair),
            eyes: pick(&other.eyes, &self.eyes),
            clothing: pick(&other.clothing, &self.clothing),
            features: pick(&other.features, &self.features),
            body_type: pick(&other.body_type, &self.body_type),
            height: pick(&other.height, &self.height),
            skin: pick(&other.skin, &self.skin),
        }
    }
}

/// Appearance of a character at a specific age stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeVariant {
    /// Age bucket this variant describes
    pub age_stage: AgeStage,
    /// Appearance at that stage
    #[serde(default)]
    pub appearance: Appearance,
}

/// A character extracted from the text, unique by name within a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    /// Character name
    pub name: String,
    /// Physical description
    #[serde(default)]
    pub appearance: Appearance,
    /// Personality traits
    #[serde(default)]
    pub personality: String,
    /// Role in the story
    #[serde(default)]
    pub role: String,
    /// Appearance changes across age stages
    #[serde(default)]
    pub age_variants: Vec<AgeVariant>,
}

impl Character {
    /// A placeholder for a speaker the model referenced but never described.
    pub fn unknown(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            appearance: Appearance::default(),
            personality: String::new(),
            role: String::new(),
            age_variants: Vec::new(),
        }
    }
}

/// One spoken line within a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueLine {
    /// Name of the speaking character
    pub speaker: String,
    /// What is said
    #[serde(default)]
    pub text: String,
}

/// A single scene within a chapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Scene number, unique within the chapter, in encounter order
    pub scene_id: u32,
    /// Where the scene takes place
    #[serde(default)]
    pub location: String,
    /// When the scene takes place
    #[serde(default)]
    pub time: String,
    /// Environment description
    #[serde(default)]
    pub description: String,
    /// Mood of the scene
    #[serde(default)]
    pub atmosphere: String,
    /// Lighting description
    #[serde(default)]
    pub lighting: String,
    /// Names of characters present, in order of appearance
    #[serde(default)]
    pub characters: Vec<String>,
    /// Narration text, empty when the scene has none
    #[serde(default)]
    pub narration: String,
    /// Spoken lines in order
    #[serde(default)]
    pub dialogue: Vec<DialogueLine>,
    /// Action beats
    #[serde(default)]
    pub actions: Vec<String>,
    /// Per-scene appearance overrides by character name
    #[serde(default)]
    pub character_appearances: HashMap<String, Appearance>,
}

/// An ordered group of scenes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    /// Chapter number in reading order
    pub chapter_id: u32,
    /// Chapter title
    #[serde(default)]
    pub title: String,
    /// Scenes in reading order
    #[serde(default)]
    pub scenes: Vec<Scene>,
}

/// Narrative function of a plot point.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PlotKind {
    /// Conflict beat
    Conflict,
    /// Climax beat
    Climax,
    /// Resolution beat
    Resolution,
    /// Ordinary beat
    #[default]
    #[serde(other)]
    Normal,
}

/// A narrative beat anchored to a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotPoint {
    /// Scene the beat belongs to
    #[serde(alias = "scene_id")]
    pub scene_ref: u32,
    /// Narrative function
    #[serde(default, alias = "type")]
    pub kind: PlotKind,
    /// Beat description
    #[serde(default)]
    pub description: String,
}

/// Output of stage 1: the full entity graph for a piece of prose.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalyzedText {
    /// Extracted characters, unique by name
    #[serde(default)]
    pub characters: Vec<Character>,
    /// Chapters in reading order
    #[serde(default)]
    pub chapters: Vec<Chapter>,
    /// Narrative beats in reading order
    #[serde(default)]
    pub plot_points: Vec<PlotPoint>,
}

impl AnalyzedText {
    /// Total number of scenes across all chapters.
    pub fn scene_count(&self) -> usize {
        self.chapters.iter().map(|c| c.scenes.len()).sum()
    }

    /// Look up a character by name.
    pub fn character(&self, name: &str) -> Option<&Character> {
        self.characters.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn age_buckets() {
        assert_eq!(AgeStage::from_age(7), AgeStage::Child);
        assert_eq!(AgeStage::from_age(16), AgeStage::Youth);
        assert_eq!(AgeStage::from_age(40), AgeStage::Adult);
        assert_eq!(AgeStage::from_age(71), AgeStage::Elder);
    }

    #[test]
    fn overlay_prefers_non_empty() {
        let base = Appearance {
            hair: "short black hair".into(),
            clothing: "school uniform".into(),
            ..Appearance::default()
        };
        let over = Appearance {
            clothing: "rain coat".into(),
            ..Appearance::default()
        };
        let merged = base.overlaid_with(&over);
        assert_eq!(merged.hair, "short black hair");
        assert_eq!(merged.clothing, "rain coat");
    }

    #[test]
    fn unknown_enum_values_fall_back() {
        let g: Gender = serde_json::from_str("\"nonbinary\"").unwrap();
        assert_eq!(g, Gender::Unknown);
        let k: PlotKind = serde_json::from_str("\"twist\"").unwrap();
        assert_eq!(k, PlotKind::Normal);
    }
}
