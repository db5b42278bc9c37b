//! Stage 2: pure transform from the entity graph to a storyboard.

use fabula_core::{
    AnalyzedText, AudioKind, AudioUnit, Chapter, DialogueMode, ImageInfo, JobOptions,
    ResolvedCharacter, Scene, Storyboard, StoryboardChapter, StoryboardScene,
};
use tracing::instrument;

/// Stage-2 driver. Deterministic: the same analysis and options always
/// produce the same storyboard.
pub struct StoryboardBuilder<'a> {
    options: &'a JobOptions,
    pause_marker: &'a str,
}

impl<'a> StoryboardBuilder<'a> {
    /// Create a builder for one job.
    pub fn new(options: &'a JobOptions, pause_marker: &'a str) -> Self {
        Self {
            options,
            pause_marker,
        }
    }

    /// Transform the analysis into a renderable storyboard.
    #[instrument(skip(self, analysis), fields(scenes = analysis.scene_count()))]
    pub fn build(&self, analysis: &AnalyzedText) -> Storyboard {
        let chapters = analysis
            .chapters
            .iter()
            .map(|chapter| self.build_chapter(chapter, analysis))
            .collect();
        Storyboard { chapters }
    }

    fn build_chapter(&self, chapter: &Chapter, analysis: &AnalyzedText) -> StoryboardChapter {
        let title = if chapter.title.is_empty() {
            format!("Chapter {}", chapter.chapter_id)
        } else {
            chapter.title.clone()
        };
        StoryboardChapter {
            chapter_id: chapter.chapter_id,
            title,
            scenes: chapter
                .scenes
                .iter()
                .map(|scene| self.build_scene(scene, chapter.chapter_id, analysis))
                .collect(),
        }
    }

    fn build_scene(
        &self,
        scene: &Scene,
        chapter_id: u32,
        analysis: &AnalyzedText,
    ) -> StoryboardScene {
        let characters_resolved = self.resolve_characters(scene, analysis);
        let audio = self.build_audio(scene);
        let estimated_duration = self.scene_duration(&audio);
        let image_info = self.build_image_info(scene, &characters_resolved);

        StoryboardScene {
            scene_id: scene.scene_id,
            chapter_id,
            location: scene.location.clone(),
            time: scene.time.clone(),
            description: scene.description.clone(),
            atmosphere: scene.atmosphere.clone(),
            image_info,
            audio,
            characters_resolved,
            estimated_duration,
        }
    }

    /// Overlay the per-scene appearance on top of the global record for
    /// every character present in the scene.
    fn resolve_characters(&self, scene: &Scene, analysis: &AnalyzedText) -> Vec<ResolvedCharacter> {
        scene
            .characters
            .iter()
            .map(|name| {
                let global = analysis.character(name);
                let base = global.map(|c| c.appearance.clone()).unwrap_or_default();
                let appearance = match scene.character_appearances.get(name) {
                    Some(local) => base.overlaid_with(local),
                    None => base,
                };
                ResolvedCharacter {
                    name: name.clone(),
                    appearance,
                    personality: global.map(|c| c.personality.clone()).unwrap_or_default(),
                    role: global.map(|c| c.role.clone()).unwrap_or_default(),
                }
            })
            .collect()
    }

    /// One audio unit per scene in merged mode, one per line in per-line
    /// mode; narration when there is no dialogue; a fixed-length silence
    /// when there is neither.
    fn build_audio(&self, scene: &Scene) -> Vec<AudioUnit> {
        if !scene.dialogue.is_empty() {
            return match self.options.dialogue_mode {
                DialogueMode::Merged => {
                    let text = scene
                        .dialogue
                        .iter()
                        .map(|line| line.text.as_str())
                        .collect::<Vec<_>>()
                        .join(self.pause_marker);
                    vec![AudioUnit {
                        kind: AudioKind::Dialogue,
                        speaker: Some(scene.dialogue[0].speaker.clone()),
                        text: text.clone(),
                        estimated_duration: self.unit_duration(&text, scene),
                    }]
                }
                DialogueMode::PerLine => scene
                    .dialogue
                    .iter()
                    .map(|line| AudioUnit {
                        kind: AudioKind::Dialogue,
                        speaker: Some(line.speaker.clone()),
                        text: line.text.clone(),
                        estimated_duration: self.unit_duration(&line.text, scene),
                    })
                    .collect(),
            };
        }
        if !scene.narration.trim().is_empty() {
            return vec![AudioUnit {
                kind: AudioKind::Narration,
                speaker: None,
                text: scene.narration.clone(),
                estimated_duration: self.unit_duration(&scene.narration, scene),
            }];
        }
        vec![AudioUnit::silence(self.options.silent_scene_duration)]
    }

    /// `max(duration_min, chars / chars_per_second + actions * action_seconds)`
    /// clamped to `duration_max`.
    fn unit_duration(&self, text: &str, scene: &Scene) -> f64 {
        let speech = text.chars().count() as f64 / self.options.chars_per_second;
        let actions = scene.actions.len() as f64 * self.options.action_seconds;
        (speech + actions)
            .max(self.options.duration_min)
            .min(self.options.duration_max)
    }

    /// Scene estimate: the summed unit estimates under the same clamp.
    /// Silence-only scenes take the configured silent duration as-is.
    fn scene_duration(&self, audio: &[AudioUnit]) -> f64 {
        if audio.len() == 1 && audio[0].kind == AudioKind::Silence {
            return audio[0].estimated_duration;
        }
        let total: f64 = audio.iter().map(|u| u.estimated_duration).sum();
        total
            .max(self.options.duration_min)
            .min(self.options.duration_max)
    }

    /// Compose the image prompt from scene context, merged character
    /// descriptors and the fixed framing defaults.
    fn build_image_info(&self, scene: &Scene, characters: &[ResolvedCharacter]) -> ImageInfo {
        let mut parts: Vec<String> = vec!["anime style".to_string()];
        if !scene.description.is_empty() {
            parts.push(scene.description.clone());
        }
        if !scene.location.is_empty() {
            parts.push(format!("location: {}", scene.location));
        }
        if !scene.time.is_empty() {
            parts.push(format!("time: {}", scene.time));
        }
        if !scene.atmosphere.is_empty() {
            parts.push(format!("atmosphere: {}", scene.atmosphere));
        }
        if !scene.lighting.is_empty() {
            parts.push(format!("lighting: {}", scene.lighting));
        }
        for character in characters {
            let fragment = character.prompt_fragment();
            if fragment.len() > character.name.len() {
                parts.push(fragment);
            }
        }
        for action in &scene.actions {
            if !action.is_empty() {
                parts.push(action.clone());
            }
        }
        parts.push("high quality, detailed, cinematic composition".to_string());

        ImageInfo {
            prompt: parts.join(", "),
            style_tags: vec![
                "anime".to_string(),
                "high quality".to_string(),
                "detailed".to_string(),
            ],
            shot_type: "medium_shot".to_string(),
            camera_angle: "eye_level".to_string(),
            camera_movement: "static".to_string(),
            composition: "rule of thirds".to_string(),
            lighting: if scene.lighting.is_empty() {
                "natural".to_string()
            } else {
                scene.lighting.clone()
            },
            mood: if scene.atmosphere.is_empty() {
                "neutral".to_string()
            } else {
                scene.atmosphere.clone()
            },
            transition: "cut".to_string(),
        }
    }
}
