//! Stage 3: per-scene image and speech synthesis.

use crate::retry::{retry, with_deadline};
use crate::voices::VoiceRegistry;
use fabula_core::{
    AudioKind, JobOptions, RenderedChapter, RenderedScene, RenderedStoryboard, Storyboard,
    StoryboardScene,
};
use fabula_error::{
    Cancelled, FabulaError, FabulaErrorKind, FabulaResult, ModelOutputError, ModelOutputErrorKind,
    RenderError, RenderErrorKind,
};
use fabula_interface::{ImageSynthesis, MediaMux, SpeechSynthesis};
use fabula_storage::JobScratch;
use futures_util::stream::{FuturesOrdered, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

const RETRY_BASE_DELAY: Duration = Duration::from_secs(2);

/// Stage-3 driver: renders every scene of a storyboard into an image and
/// an audio track inside the job scratch.
pub struct SceneRenderer {
    image: Arc<dyn ImageSynthesis>,
    speech: Arc<dyn SpeechSynthesis>,
    mux: Arc<dyn MediaMux>,
}

impl SceneRenderer {
    /// Create the renderer over the synthesis and mux capabilities.
    pub fn new(
        image: Arc<dyn ImageSynthesis>,
        speech: Arc<dyn SpeechSynthesis>,
        mux: Arc<dyn MediaMux>,
    ) -> Self {
        Self { image, speech, mux }
    }

    /// Fix every dialogue speaker's voice before any rendering starts, so
    /// scene ordering or parallel completion cannot shuffle assignments.
    pub fn preassign_voices(storyboard: &Storyboard, voices: &mut VoiceRegistry) {
        for scene in storyboard.scenes() {
            for unit in &scene.audio {
                if unit.kind != AudioKind::Dialogue {
                    continue;
                }
                let Some(speaker) = unit.speaker.as_deref() else {
                    continue;
                };
                let appearance = scene
                    .characters_resolved
                    .iter()
                    .find(|c| c.name == speaker)
                    .map(|c| c.appearance.clone())
                    .unwrap_or_default();
                voices.assign(speaker, &appearance);
            }
        }
        debug!(speakers = voices.assigned_count(), "voices pre-assigned");
    }

    /// Render all scenes in storyboard order.
    ///
    /// Per-scene work may run ahead up to `max_parallel_scenes`, but
    /// results fold back in input order, so `on_scene(done, total)` fires
    /// monotonically and the returned chapters match the storyboard.
    #[instrument(skip_all, fields(scenes = storyboard.scene_count()))]
    pub async fn render<F>(
        &self,
        storyboard: &Storyboard,
        scratch: &JobScratch,
        voices: &VoiceRegistry,
        options: &JobOptions,
        cancel: &CancellationToken,
        mut on_scene: F,
    ) -> FabulaResult<RenderedStoryboard>
    where
        F: FnMut(usize, usize),
    {
        let total = storyboard.scene_count();
        let mut ordered: Vec<RenderedScene> = Vec::with_capacity(total);

        {
            let scenes: Vec<&StoryboardScene> = storyboard.scenes().collect();
            let limit = options.max_parallel_scenes.max(1);
            let mut remaining = scenes.into_iter();
            let mut in_flight = FuturesOrdered::new();

            for scene in remaining.by_ref().take(limit) {
                in_flight.push_back(self.render_scene(scene, scratch, voices, options, cancel));
            }

            while let Some(result) = in_flight.next().await {
                let rendered = result?;
                ordered.push(rendered);
                on_scene(ordered.len(), total);
                if cancel.is_cancelled() {
                    return Err(Cancelled.into());
                }
                if let Some(scene) = remaining.next() {
                    in_flight
                        .push_back(self.render_scene(scene, scratch, voices, options, cancel));
                }
            }
        }

        // Regroup the flat ordered results by storyboard chapter.
        let mut iter = ordered.into_iter();
        let chapters = storyboard
            .chapters
            .iter()
            .map(|chapter| RenderedChapter {
                chapter_id: chapter.chapter_id,
                title: chapter.title.clone(),
                scenes: iter.by_ref().take(chapter.scenes.len()).collect(),
            })
            .collect();

        info!(scenes = total, "scene rendering complete");
        Ok(RenderedStoryboard { chapters })
    }

    async fn render_scene(
        &self,
        scene: &StoryboardScene,
        scratch: &JobScratch,
        voices: &VoiceRegistry,
        options: &JobOptions,
        cancel: &CancellationToken,
    ) -> FabulaResult<RenderedScene> {
        if cancel.is_cancelled() {
            return Err(Cancelled.into());
        }
        let scene_id = scene.scene_id;

        let image_fut = async {
            self.render_image(scene, scratch, options, cancel)
                .await
                .map_err(|e| tag_scene_error(scene_id, "image", e))
        };
        let audio_fut = async {
            self.render_audio(scene, scratch, voices, options, cancel)
                .await
                .map_err(|e| tag_scene_error(scene_id, "audio", e))
        };
        let (image_path, audio_path) = futures_util::try_join!(image_fut, audio_fut)?;

        let measured = self.mux.probe_duration(&audio_path).await.map_err(|e| {
            FabulaError::from(RenderError::new(
                scene_id,
                RenderErrorKind::Probe(e.detail()),
            ))
        })?;
        let final_duration = scene.estimated_duration.max(measured);

        debug!(
            scene = scene_id,
            measured, final_duration, "scene assets rendered"
        );
        Ok(RenderedScene {
            scene_id,
            chapter_id: scene.chapter_id,
            image_path,
            audio_path,
            measured_audio_duration: measured,
            final_duration,
        })
    }

    async fn render_image(
        &self,
        scene: &StoryboardScene,
        scratch: &JobScratch,
        options: &JobOptions,
        cancel: &CancellationToken,
    ) -> FabulaResult<PathBuf> {
        let info = &scene.image_info;
        let prompt = format!(
            "{}, {}, {}, {}, {}, {}",
            info.prompt,
            info.style_tags.join(", "),
            info.shot_type,
            info.camera_angle,
            info.composition,
            info.lighting,
        );
        let deadline = Duration::from_secs(options.request_timeout_secs);
        let image = Arc::clone(&self.image);
        let bytes = retry(
            || {
                let image = Arc::clone(&image);
                let prompt = prompt.clone();
                let size = options.image_size.clone();
                async move {
                    with_deadline(deadline, "image synthesis", async {
                        image.generate_image(&prompt, &size, options.image_seed).await
                    })
                    .await
                }
            },
            options.retry_attempts,
            RETRY_BASE_DELAY,
            cancel,
        )
        .await?;

        scratch
            .save_image(
                &bytes,
                &format!("scene_{}_{}", scene.chapter_id, scene.scene_id),
                "png",
            )
            .await
    }

    /// Synthesize every audio unit and collapse them into one scene track.
    async fn render_audio(
        &self,
        scene: &StoryboardScene,
        scratch: &JobScratch,
        voices: &VoiceRegistry,
        options: &JobOptions,
        cancel: &CancellationToken,
    ) -> FabulaResult<PathBuf> {
        let extension = options.audio_encoding.as_str();
        let mut unit_paths: Vec<PathBuf> = Vec::with_capacity(scene.audio.len());

        for (index, unit) in scene.audio.iter().enumerate() {
            let hint = format!("audio_{}_{}_{}", scene.chapter_id, scene.scene_id, index);
            // Units with nothing to say become quiet tracks of the
            // estimated length.
            if unit.kind == AudioKind::Silence || unit.text.trim().is_empty() {
                let out = scratch.audio_file(&hint, extension);
                self.mux
                    .make_silence(unit.estimated_duration, &out)
                    .await?;
                unit_paths.push(out);
                continue;
            }

            let voice = match unit.kind {
                AudioKind::Narration => voices.voice_for_narration().to_string(),
                AudioKind::Dialogue => {
                    let speaker = unit.speaker.as_deref().unwrap_or_default();
                    voices.assignment(speaker).map(str::to_string).ok_or_else(|| {
                        RenderError::new(
                            scene.scene_id,
                            RenderErrorKind::UnassignedSpeaker(speaker.to_string()),
                        )
                    })?
                }
                AudioKind::Silence => unreachable!("handled above"),
            };

            let deadline = Duration::from_secs(options.request_timeout_secs);
            let speech = Arc::clone(&self.speech);
            let bytes = retry(
                || {
                    let speech = Arc::clone(&speech);
                    let voice = voice.clone();
                    let text = unit.text.clone();
                    let encoding = options.audio_encoding.clone();
                    async move {
                        with_deadline(deadline, "speech synthesis", async {
                            speech
                                .synthesize(&text, &voice, options.speech_speed_ratio, &encoding)
                                .await
                        })
                        .await
                    }
                },
                options.retry_attempts,
                RETRY_BASE_DELAY,
                cancel,
            )
            .await?;

            unit_paths.push(scratch.save_audio(&bytes, &hint, extension).await?);
        }

        if unit_paths.len() == 1 {
            return Ok(unit_paths.remove(0));
        }

        // Per-line mode yields several blobs; collapse them so the scene
        // muxes against a single track.
        let track = scratch.audio_file(
            &format!("track_{}_{}", scene.chapter_id, scene.scene_id),
            extension,
        );
        let inputs: Vec<&std::path::Path> = unit_paths.iter().map(PathBuf::as_path).collect();
        self.mux.concat(&inputs, &track).await?;
        Ok(track)
    }
}

/// Preserve the error taxonomy while pointing the detail at the failing
/// scene: malformed payloads stay `ModelOutputError`, transport
/// exhaustion and mux failures become `RenderError{scene_id}`.
fn tag_scene_error(scene_id: u32, what: &str, err: FabulaError) -> FabulaError {
    match err.kind() {
        FabulaErrorKind::ModelOutput(e) => ModelOutputError::new(
            ModelOutputErrorKind::MalformedField {
                field: format!("scene {scene_id} {what}"),
                detail: e.kind.to_string(),
            },
        )
        .into(),
        FabulaErrorKind::External(e) => {
            let detail = e.kind.to_string();
            let kind = if what == "image" {
                RenderErrorKind::Image(detail)
            } else {
                RenderErrorKind::Speech(detail)
            };
            RenderError::new(scene_id, kind).into()
        }
        FabulaErrorKind::Composition(e) => {
            let detail = e.kind.to_string();
            let kind = if what == "image" {
                RenderErrorKind::Image(detail)
            } else {
                RenderErrorKind::Speech(detail)
            };
            RenderError::new(scene_id, kind).into()
        }
        _ => err,
    }
}
