//! Stage 4: clip muxing, concatenation and promotion.

use fabula_core::{FinalVideo, RenderedChapter, RenderedScene, RenderedStoryboard};
use fabula_error::{
    Cancelled, CompositionError, CompositionErrorKind, FabulaErrorKind, FabulaResult,
};
use fabula_interface::MediaMux;
use fabula_storage::JobScratch;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Stage-4 driver: turns rendered scenes into clips, clips into chapter
/// videos, chapter videos into the final artifact.
pub struct SceneComposer {
    mux: Arc<dyn MediaMux>,
}

impl SceneComposer {
    /// Create the composer over the mux capability.
    pub fn new(mux: Arc<dyn MediaMux>) -> Self {
        Self { mux }
    }

    /// Compose and promote the final video.
    ///
    /// Every concat is a stream copy; the clips are codec-compatible
    /// because they all come out of the same still-mux settings. A single
    /// chapter skips the final concat entirely.
    #[instrument(skip_all, fields(scenes = rendered.scene_count(), chapters = rendered.chapters.len()))]
    pub async fn compose(
        &self,
        rendered: &RenderedStoryboard,
        scratch: &JobScratch,
        cancel: &CancellationToken,
    ) -> FabulaResult<FinalVideo> {
        if rendered.chapters.is_empty() {
            return Err(CompositionError::new(CompositionErrorKind::MissingInput(
                "no rendered chapters".to_string(),
            ))
            .into());
        }

        let mut chapter_videos: Vec<PathBuf> = Vec::with_capacity(rendered.chapters.len());
        for chapter in &rendered.chapters {
            if cancel.is_cancelled() {
                return Err(Cancelled.into());
            }
            chapter_videos.push(self.compose_chapter(chapter, scratch, cancel).await?);
        }

        let final_path = if chapter_videos.len() == 1 {
            chapter_videos.remove(0)
        } else {
            let out = scratch.temp_file("final_video", "mp4");
            let inputs: Vec<&std::path::Path> =
                chapter_videos.iter().map(PathBuf::as_path).collect();
            retry_once_on_timeout(|| self.mux.concat(&inputs, &out)).await?;
            out
        };

        let promoted = scratch.promote(&final_path).await?;
        let duration = self.mux.probe_duration(&promoted).await?;
        let byte_size = scratch.file_size(&promoted).await?;

        let video = FinalVideo {
            path: promoted,
            duration_seconds: duration,
            byte_size,
            scene_count: rendered.scene_count(),
            chapter_count: rendered.chapters.len(),
        };
        info!(path = %video.path.display(), duration, byte_size, "final video composed");
        Ok(video)
    }

    /// Mux every scene of the chapter into a clip, then concatenate.
    async fn compose_chapter(
        &self,
        chapter: &RenderedChapter,
        scratch: &JobScratch,
        cancel: &CancellationToken,
    ) -> FabulaResult<PathBuf> {
        let mut clips: Vec<PathBuf> = Vec::with_capacity(chapter.scenes.len());
        for scene in &chapter.scenes {
            if cancel.is_cancelled() {
                return Err(Cancelled.into());
            }
            clips.push(self.compose_scene(scene, scratch).await?);
        }

        if clips.len() == 1 {
            return Ok(clips.remove(0));
        }

        let out = scratch.temp_file(&format!("chapter_{}", chapter.chapter_id), "mp4");
        {
            let inputs: Vec<&std::path::Path> = clips.iter().map(PathBuf::as_path).collect();
            retry_once_on_timeout(|| self.mux.concat(&inputs, &out)).await?;
        }
        debug!(chapter = chapter.chapter_id, clips = clips.len(), "chapter concatenated");

        // The per-scene clips are folded into the chapter video and are
        // no longer needed.
        for clip in &clips {
            let _ = tokio::fs::remove_file(clip).await;
        }
        Ok(out)
    }

    async fn compose_scene(
        &self,
        scene: &RenderedScene,
        scratch: &JobScratch,
    ) -> FabulaResult<PathBuf> {
        let out = scratch.temp_file(
            &format!("clip_{}_{}", scene.chapter_id, scene.scene_id),
            "mp4",
        );
        retry_once_on_timeout(|| {
            self.mux
                .mux_still(&scene.image_path, &scene.audio_path, scene.final_duration, &out)
        })
        .await?;
        debug!(scene = scene.scene_id, clip = %out.display(), "scene clip muxed");
        Ok(out)
    }
}

/// Subprocess timeouts are cheap to re-run; anything else is fatal here.
async fn retry_once_on_timeout<T, F, Fut>(mut op: F) -> FabulaResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = FabulaResult<T>>,
{
    match op().await {
        Err(e)
            if matches!(
                e.kind(),
                FabulaErrorKind::Composition(c)
                    if matches!(c.kind, CompositionErrorKind::Timeout(_))
            ) =>
        {
            warn!(error = %e, "media tool timed out; retrying once");
            op().await
        }
        other => other,
    }
}
