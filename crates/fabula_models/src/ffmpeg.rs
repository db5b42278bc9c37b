//! Media muxing through the `ffmpeg`/`ffprobe` command pair.

use async_trait::async_trait;
use fabula_error::{CompositionError, CompositionErrorKind, FabulaResult};
use fabula_interface::MediaMux;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

/// Codec and runtime settings for the media tool.
///
/// The still-mux step fixes the codec parameters so every clip produced by
/// one job is concat-compatible by stream copy.
#[derive(Debug, Clone)]
pub struct FfmpegConfig {
    /// Name or path of the ffmpeg binary
    pub ffmpeg_bin: String,
    /// Name or path of the ffprobe binary
    pub ffprobe_bin: String,
    /// Deadline for any single invocation
    pub timeout: Duration,
    /// Video codec for scene clips
    pub video_codec: String,
    /// Encoder preset
    pub preset: String,
    /// Audio codec for scene clips
    pub audio_codec: String,
    /// Audio bitrate for scene clips
    pub audio_bitrate: String,
    /// Pixel format for scene clips
    pub pixel_format: String,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            timeout: Duration::from_secs(600),
            video_codec: "libx264".to_string(),
            preset: "medium".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            pixel_format: "yuv420p".to_string(),
        }
    }
}

/// Media mux adapter backed by ffmpeg subprocesses.
#[derive(Debug, Clone, Default)]
pub struct FfmpegTool {
    config: FfmpegConfig,
}

impl FfmpegTool {
    /// Creates the tool with the given configuration.
    pub fn new(config: FfmpegConfig) -> Self {
        Self { config }
    }

    /// Run one subprocess to completion under the configured deadline.
    ///
    /// Returns captured stdout. A non-zero exit carries the captured
    /// stderr; a deadline overrun kills the child first.
    async fn run(&self, bin: &str, args: &[String], context: &str) -> FabulaResult<String> {
        debug!(bin, context, "running media tool");
        let child = Command::new(bin)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                CompositionError::new(CompositionErrorKind::Spawn(format!("{bin}: {e}")))
            })?;

        let waited = tokio::time::timeout(self.config.timeout, child.wait_with_output()).await;
        let output = match waited {
            Ok(result) => result.map_err(|e| {
                CompositionError::new(CompositionErrorKind::Spawn(format!("{bin}: {e}")))
            })?,
            Err(_) => {
                warn!(bin, context, "media tool ran past its deadline");
                return Err(CompositionError::new(CompositionErrorKind::Timeout(
                    context.to_string(),
                ))
                .into());
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr
                .lines()
                .rev()
                .take(8)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n");
            return Err(CompositionError::new(CompositionErrorKind::CommandFailed(
                format!("{context}: {tail}"),
            ))
            .into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Escape a path for the concat list's single-quote wrapper.
fn concat_escape(path: &Path) -> String {
    path.display().to_string().replace('\'', r"'\''")
}

#[async_trait]
impl MediaMux for FfmpegTool {
    #[instrument(skip(self), fields(out = %out_path.display()))]
    async fn mux_still(
        &self,
        image_path: &Path,
        audio_path: &Path,
        duration: f64,
        out_path: &Path,
    ) -> FabulaResult<()> {
        for input in [image_path, audio_path] {
            if !input.exists() {
                return Err(CompositionError::new(CompositionErrorKind::MissingInput(
                    input.display().to_string(),
                ))
                .into());
            }
        }
        let args = vec![
            "-y".to_string(),
            "-loop".to_string(),
            "1".to_string(),
            "-i".to_string(),
            image_path.display().to_string(),
            "-i".to_string(),
            audio_path.display().to_string(),
            "-c:v".to_string(),
            self.config.video_codec.clone(),
            "-preset".to_string(),
            self.config.preset.clone(),
            "-tune".to_string(),
            "stillimage".to_string(),
            "-c:a".to_string(),
            self.config.audio_codec.clone(),
            "-b:a".to_string(),
            self.config.audio_bitrate.clone(),
            "-pix_fmt".to_string(),
            self.config.pixel_format.clone(),
            "-shortest".to_string(),
            "-t".to_string(),
            format!("{duration:.3}"),
            out_path.display().to_string(),
        ];
        self.run(&self.config.ffmpeg_bin, &args, "mux still image")
            .await?;
        Ok(())
    }

    #[instrument(skip(self, inputs), fields(inputs = inputs.len(), out = %out_path.display()))]
    async fn concat(&self, inputs: &[&Path], out_path: &Path) -> FabulaResult<()> {
        let list_path = out_path.with_extension("concat.txt");
        let mut list = String::new();
        for input in inputs {
            list.push_str(&format!("file '{}'\n", concat_escape(input)));
        }
        tokio::fs::write(&list_path, list).await.map_err(|e| {
            CompositionError::new(CompositionErrorKind::Spawn(format!(
                "concat list {}: {e}",
                list_path.display()
            )))
        })?;

        let args = vec![
            "-y".to_string(),
            "-f".to_string(),
            "concat".to_string(),
            "-safe".to_string(),
            "0".to_string(),
            "-i".to_string(),
            list_path.display().to_string(),
            "-c".to_string(),
            "copy".to_string(),
            out_path.display().to_string(),
        ];
        let result = self
            .run(&self.config.ffmpeg_bin, &args, "concatenate clips")
            .await;
        let _ = tokio::fs::remove_file(&list_path).await;
        result.map(|_| ())
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn probe_duration(&self, path: &Path) -> FabulaResult<f64> {
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "format=duration".to_string(),
            "-of".to_string(),
            "default=noprint_wrappers=1:nokey=1".to_string(),
            path.display().to_string(),
        ];
        let stdout = self
            .run(&self.config.ffprobe_bin, &args, "probe duration")
            .await?;
        stdout.trim().parse::<f64>().map_err(|e| {
            CompositionError::new(CompositionErrorKind::Probe(format!(
                "{}: {e}",
                path.display()
            )))
            .into()
        })
    }

    #[instrument(skip(self), fields(out = %out_path.display()))]
    async fn make_silence(&self, duration: f64, out_path: &Path) -> FabulaResult<()> {
        let args = vec![
            "-y".to_string(),
            "-f".to_string(),
            "lavfi".to_string(),
            "-i".to_string(),
            "anullsrc=channel_layout=stereo:sample_rate=44100".to_string(),
            "-t".to_string(),
            format!("{duration:.3}"),
            "-q:a".to_string(),
            "9".to_string(),
            out_path.display().to_string(),
        ];
        self.run(&self.config.ffmpeg_bin, &args, "generate silence")
            .await?;
        Ok(())
    }
}
