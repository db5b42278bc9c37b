//! Command implementations.

use super::RenderArgs;
use fabula_core::{builtin_catalog, AnalyzerMode, DialogueMode, JobOptions};
use fabula_events::StreamItem;
use fabula_models::{
    FfmpegConfig, FfmpegTool, ImageModelClient, NarrativeModelClient, SpeechModelClient,
};
use fabula_pipeline::{Adapters, Engine, EngineSettings};
use fabula_storage::ScratchStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Render a text file and stream progress events to stdout.
pub async fn run_render(args: RenderArgs) -> Result<(), Box<dyn std::error::Error>> {
    let settings = EngineSettings::load_from(args.settings.as_deref())?;
    let input_text = tokio::fs::read_to_string(&args.input).await?;

    let mut options = JobOptions::default();
    if args.simple {
        options.analyzer_mode = AnalyzerMode::Simple;
    }
    if args.per_line {
        options.dialogue_mode = DialogueMode::PerLine;
    }
    if let Some(max_scenes) = args.max_scenes {
        options.max_scenes = max_scenes;
    }
    if let Some(max_characters) = args.max_characters {
        options.max_characters = max_characters;
    }
    if let Some(parallel) = args.parallel {
        options.max_parallel_scenes = parallel;
    }
    options.retain_scratch_on_failure = args.retain_scratch;
    options.job_timeout_secs = args.job_timeout;

    let engine = build_engine(&settings, &options);
    let id = engine.submit(input_text, options);
    info!(job_id = %id, "submitted");

    let mut stream = engine.subscribe(id);
    let mut failed = false;
    while let Some(item) = stream.next().await {
        match item {
            StreamItem::Event(event) => {
                println!("{}", serde_json::to_string(&event)?);
                if matches!(event.payload, fabula_core::EventPayload::Failed { .. }) {
                    failed = true;
                }
            }
            StreamItem::SlowConsumer { skipped } => {
                eprintln!("dropped from stream after missing {skipped} events");
                break;
            }
        }
    }
    engine.wait(id).await;

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Print the built-in voice catalog.
pub fn show_voices() {
    for voice in builtin_catalog() {
        println!(
            "{:<28} {:<8} {:?}",
            voice.voice_id,
            format!("{:?}", voice.gender).to_lowercase(),
            voice.age_stage
        );
    }
}

fn build_engine(settings: &EngineSettings, options: &JobOptions) -> Engine {
    let request_timeout = Duration::from_secs(options.request_timeout_secs);
    let adapters = Adapters {
        text: Arc::new(NarrativeModelClient::new(
            &settings.model_endpoint,
            &settings.api_key,
            &settings.analysis_model,
            request_timeout,
        )),
        image: Arc::new(ImageModelClient::new(
            &settings.model_endpoint,
            &settings.api_key,
            &settings.image_model,
            request_timeout,
        )),
        speech: Arc::new(SpeechModelClient::new(
            &settings.model_endpoint,
            &settings.api_key,
            request_timeout,
        )),
        mux: Arc::new(FfmpegTool::new(FfmpegConfig {
            ffmpeg_bin: settings.ffmpeg_bin.clone(),
            ffprobe_bin: settings.ffprobe_bin.clone(),
            timeout: Duration::from_secs(settings.mux_timeout_secs),
            video_codec: settings.video_codec.clone(),
            preset: settings.video_preset.clone(),
            audio_codec: settings.audio_codec.clone(),
            audio_bitrate: settings.audio_bitrate.clone(),
            pixel_format: settings.pixel_format.clone(),
        })),
    };
    let store = ScratchStore::new(&settings.scratch_base, &settings.videos_base);
    Engine::new(adapters, store, settings)
}
