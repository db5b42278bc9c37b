//! Stage 1: structured analysis of the input prose.

use crate::retry::{retry, with_deadline};
use fabula_core::{AnalyzedText, Character, JobOptions};
use fabula_error::{
    FabulaResult, ModelOutputError, ModelOutputErrorKind, ValidationError, ValidationErrorKind,
};
use fabula_interface::TextUnderstanding;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

const RETRY_BASE_DELAY: Duration = Duration::from_secs(2);

fn analysis_prompt(max_characters: usize, max_scenes: usize) -> String {
    format!(
        "Analyze the novel excerpt below and answer with one JSON object of the shape \
{{\"characters\": [{{\"name\", \"appearance\": {{\"gender\", \"age\", \"age_stage\", \"hair\", \
\"eyes\", \"clothing\", \"features\", \"body_type\", \"height\", \"skin\"}}, \"personality\", \
\"role\", \"age_variants\"}}], \"chapters\": [{{\"chapter_id\", \"title\", \"scenes\": \
[{{\"scene_id\", \"location\", \"time\", \"description\", \"atmosphere\", \"lighting\", \
\"characters\", \"narration\", \"dialogue\": [{{\"speaker\", \"text\"}}], \"actions\", \
\"character_appearances\"}}]}}], \"plot_points\": [{{\"scene_ref\", \"kind\", \
\"description\"}}]}}. \
Gender is one of male/female/unknown; age_stage one of child/youth/adult/elder/unknown; \
plot point kind one of conflict/climax/resolution/normal. \
Extract at most {max_characters} characters and at most {max_scenes} scenes."
    )
}

/// Stage-1 driver: calls the text-understanding adapter and shapes the
/// result into a validated entity graph.
pub struct TextAnalyzer {
    model: Arc<dyn TextUnderstanding>,
}

impl TextAnalyzer {
    /// Create the analyzer over a text-understanding capability.
    pub fn new(model: Arc<dyn TextUnderstanding>) -> Self {
        Self { model }
    }

    /// Analyze the input text.
    ///
    /// Returns the entity graph plus any warnings (truncations) the caller
    /// should surface as progress events.
    #[instrument(skip(self, text, options, cancel), fields(text_len = text.len(), mode = %options.analyzer_mode))]
    pub async fn analyze(
        &self,
        text: &str,
        options: &JobOptions,
        cancel: &CancellationToken,
    ) -> FabulaResult<(AnalyzedText, Vec<String>)> {
        validate_input(text, options)?;

        let mut analysis = match options.analyzer_mode {
            fabula_core::AnalyzerMode::Simple => self.analyze_window(text, options, cancel).await?,
            fabula_core::AnalyzerMode::Chunked => {
                let chunks = split_into_chunks(text, options.chunk_size);
                debug!(chunks = chunks.len(), "split text into analysis windows");
                let mut partials = Vec::with_capacity(chunks.len());
                for chunk in &chunks {
                    partials.push(self.analyze_window(chunk, options, cancel).await?);
                }
                merge_windows(partials)
            }
        };

        let warnings = enforce_limits(&mut analysis, options);
        validate_analysis(&analysis)?;

        info!(
            characters = analysis.characters.len(),
            chapters = analysis.chapters.len(),
            scenes = analysis.scene_count(),
            "text analysis complete"
        );
        Ok((analysis, warnings))
    }

    async fn analyze_window(
        &self,
        window: &str,
        options: &JobOptions,
        cancel: &CancellationToken,
    ) -> FabulaResult<AnalyzedText> {
        let prompt = analysis_prompt(options.max_characters, options.max_scenes);
        let deadline = Duration::from_secs(options.request_timeout_secs);
        let model = Arc::clone(&self.model);
        let value = retry(
            || {
                let model = Arc::clone(&model);
                let prompt = prompt.clone();
                async move {
                    with_deadline(deadline, "text analysis", model.analyze(&prompt, window)).await
                }
            },
            options.retry_attempts,
            RETRY_BASE_DELAY,
            cancel,
        )
        .await?;
        parse_payload(value)
    }
}

fn validate_input(text: &str, options: &JobOptions) -> Result<(), ValidationError> {
    options.validate()?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(ValidationErrorKind::EmptyInput));
    }
    let length = trimmed.chars().count();
    if length < options.min_text_length {
        return Err(ValidationError::new(ValidationErrorKind::TextTooShort {
            min: options.min_text_length,
            actual: length,
        }));
    }
    if length > options.max_text_length {
        return Err(ValidationError::new(ValidationErrorKind::TextTooLong {
            max: options.max_text_length,
            actual: length,
        }));
    }
    Ok(())
}

/// Parse the adapter's JSON object into the entity graph.
///
/// Unknown keys are ignored; a missing required key or a wrong shape is a
/// fatal model-output error.
fn parse_payload(value: serde_json::Value) -> FabulaResult<AnalyzedText> {
    for key in ["characters", "chapters"] {
        if value.get(key).is_none() {
            return Err(ModelOutputError::new(ModelOutputErrorKind::MissingKey(key.to_string())).into());
        }
    }
    serde_json::from_value(value).map_err(|e| {
        ModelOutputError::new(ModelOutputErrorKind::MalformedField {
            field: "$".to_string(),
            detail: e.to_string(),
        })
        .into()
    })
}

/// Split on blank-line paragraph boundaries, packing windows up to
/// `chunk_size` characters. A single oversized paragraph becomes its own
/// window rather than being cut mid-sentence.
fn split_into_chunks(text: &str, chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for paragraph in text.split("\n\n") {
        let para_len = paragraph.chars().count();
        let current_len = current.chars().count();
        if current_len + para_len > chunk_size && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Merge per-window results into one graph.
///
/// Characters union by name: the first occurrence's non-empty attributes
/// win, later occurrences fill gaps and contribute new age variants.
/// Chapters keep window order with chapter and scene ids renumbered
/// monotonically; plot point references follow the renumbering.
fn merge_windows(windows: Vec<AnalyzedText>) -> AnalyzedText {
    let mut merged = AnalyzedText::default();
    let mut index_by_name: HashMap<String, usize> = HashMap::new();
    let mut next_chapter_id = 0u32;
    let mut next_scene_id = 0u32;

    for window in windows {
        for character in window.characters {
            match index_by_name.get(&character.name) {
                Some(&i) => {
                    let existing = &mut merged.characters[i];
                    existing.appearance =
                        character.appearance.overlaid_with(&existing.appearance);
                    if existing.personality.is_empty() {
                        existing.personality = character.personality;
                    }
                    if existing.role.is_empty() {
                        existing.role = character.role;
                    }
                    for variant in character.age_variants {
                        if !existing
                            .age_variants
                            .iter()
                            .any(|v| v.age_stage == variant.age_stage)
                        {
                            existing.age_variants.push(variant);
                        }
                    }
                }
                None => {
                    index_by_name.insert(character.name.clone(), merged.characters.len());
                    merged.characters.push(character);
                }
            }
        }

        let mut scene_ids: HashMap<u32, u32> = HashMap::new();
        for mut chapter in window.chapters {
            next_chapter_id += 1;
            chapter.chapter_id = next_chapter_id;
            for scene in &mut chapter.scenes {
                next_scene_id += 1;
                scene_ids.entry(scene.scene_id).or_insert(next_scene_id);
                scene.scene_id = next_scene_id;
            }
            merged.chapters.push(chapter);
        }

        for mut plot_point in window.plot_points {
            if let Some(&renumbered) = scene_ids.get(&plot_point.scene_ref) {
                plot_point.scene_ref = renumbered;
            }
            merged.plot_points.push(plot_point);
        }
    }
    merged
}

/// Apply the scene and character caps and promote unknown speakers.
fn enforce_limits(analysis: &mut AnalyzedText, options: &JobOptions) -> Vec<String> {
    let mut warnings = Vec::new();

    // Scene cap: truncate from the tail, dropping emptied chapters.
    let total = analysis.scene_count();
    if total > options.max_scenes {
        let mut remaining = options.max_scenes;
        for chapter in &mut analysis.chapters {
            let keep = chapter.scenes.len().min(remaining);
            chapter.scenes.truncate(keep);
            remaining -= keep;
        }
        analysis.chapters.retain(|c| !c.scenes.is_empty());
        warnings.push(format!(
            "analysis produced {total} scenes; keeping the first {}",
            options.max_scenes
        ));
    }

    // Every speaker and listed name must resolve to a character; unknown
    // ones are promoted with an unknown appearance.
    let known: HashSet<String> = analysis.characters.iter().map(|c| c.name.clone()).collect();
    let mut promoted: Vec<String> = Vec::new();
    for chapter in &analysis.chapters {
        for scene in &chapter.scenes {
            for name in scene
                .characters
                .iter()
                .chain(scene.dialogue.iter().map(|d| &d.speaker))
            {
                if !name.is_empty() && !known.contains(name) && !promoted.contains(name) {
                    promoted.push(name.clone());
                }
            }
        }
    }
    for name in promoted {
        debug!(name = %name, "promoting unlisted speaker to character");
        analysis.characters.push(Character::unknown(name));
    }

    // Character cap: drop by lowest mention count, never dropping anyone
    // who still speaks.
    if analysis.characters.len() > options.max_characters {
        let mut mentions: HashMap<&str, usize> = HashMap::new();
        let mut speakers: HashSet<&str> = HashSet::new();
        for chapter in &analysis.chapters {
            for scene in &chapter.scenes {
                for name in &scene.characters {
                    *mentions.entry(name.as_str()).or_default() += 1;
                }
                for line in &scene.dialogue {
                    *mentions.entry(line.speaker.as_str()).or_default() += 1;
                    speakers.insert(line.speaker.as_str());
                }
            }
        }

        let mut ranked: Vec<(usize, usize)> = analysis
            .characters
            .iter()
            .enumerate()
            .map(|(i, c)| (i, mentions.get(c.name.as_str()).copied().unwrap_or(0)))
            .collect();
        ranked.sort_by_key(|&(i, count)| (count, std::cmp::Reverse(i)));

        let mut to_drop: HashSet<usize> = HashSet::new();
        let excess = analysis.characters.len() - options.max_characters;
        for &(i, _) in &ranked {
            if to_drop.len() == excess {
                break;
            }
            if !speakers.contains(analysis.characters[i].name.as_str()) {
                to_drop.insert(i);
            }
        }

        if !to_drop.is_empty() {
            let dropped: Vec<String> = analysis
                .characters
                .iter()
                .enumerate()
                .filter(|(i, _)| to_drop.contains(i))
                .map(|(_, c)| c.name.clone())
                .collect();
            warnings.push(format!(
                "character cap {} exceeded; dropping {}",
                options.max_characters,
                dropped.join(", ")
            ));
            let mut index = 0;
            analysis.characters.retain(|_| {
                let keep = !to_drop.contains(&index);
                index += 1;
                keep
            });
        }
    }

    warnings
}

/// Fail fast on an unusable analysis.
fn validate_analysis(analysis: &AnalyzedText) -> Result<(), ValidationError> {
    if analysis.characters.is_empty() {
        return Err(ValidationError::new(ValidationErrorKind::NoCharacters));
    }
    if analysis.chapters.is_empty() || analysis.scene_count() == 0 {
        return Err(ValidationError::new(ValidationErrorKind::NoScenes));
    }
    for chapter in &analysis.chapters {
        if chapter.scenes.is_empty() {
            return Err(ValidationError::new(ValidationErrorKind::EmptyChapter(
                chapter.chapter_id,
            )));
        }
    }
    Ok(())
}
