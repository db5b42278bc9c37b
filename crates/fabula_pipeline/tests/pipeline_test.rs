//! End-to-end tests for the job orchestrator with scripted adapters.

mod common;

use common::{
    analysis_json, sample_text, two_chapter_json, MockImage, MockMux, MockSpeech, MockText,
};
use fabula_core::{
    DialogueMode, EventPayload, JobEvent, JobOptions, JobStatus,
};
use fabula_events::{EventStream, StreamItem};
use fabula_pipeline::{Adapters, Engine, EngineSettings};
use fabula_storage::ScratchStore;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Notify;

fn engine_with(
    dir: &TempDir,
    text: Arc<MockText>,
    image: Arc<MockImage>,
    speech: Arc<MockSpeech>,
    mux: Arc<MockMux>,
) -> Engine {
    let mut settings = EngineSettings::default();
    settings.scratch_base = dir.path().join("jobs");
    settings.videos_base = dir.path().join("videos");
    let store = ScratchStore::new(&settings.scratch_base, &settings.videos_base);
    Engine::new(
        Adapters {
            text,
            image,
            speech,
            mux,
        },
        store,
        &settings,
    )
}

async fn collect(stream: &mut EventStream) -> Vec<JobEvent> {
    let mut events = Vec::new();
    while let Some(item) = stream.next().await {
        match item {
            StreamItem::Event(event) => events.push(event),
            StreamItem::SlowConsumer { .. } => panic!("test subscriber lagged"),
        }
    }
    events
}

fn assert_ordered(events: &[JobEvent]) {
    let mut last_sequence = None;
    let mut last_progress = 0u8;
    for event in events {
        if let Some(previous) = last_sequence {
            assert!(event.sequence > previous, "sequences strictly increase");
        }
        last_sequence = Some(event.sequence);
        if let Some(pct) = event.payload.progress() {
            assert!(pct >= last_progress, "progress never decreases");
            last_progress = pct;
        }
    }
}

#[tokio::test]
async fn successful_job_emits_ordered_events_and_a_final_video() {
    let dir = TempDir::new().unwrap();
    let mux = MockMux::with_audio_duration(4.0);
    let engine = engine_with(
        &dir,
        MockText::answering(analysis_json(3)),
        MockImage::ok(),
        MockSpeech::ok(),
        mux.clone(),
    );

    let id = engine.submit(sample_text(), JobOptions::default());
    let mut stream = engine.subscribe(id);
    let events = collect(&mut stream).await;

    assert!(events.len() >= 6, "stage boundaries plus terminal: {events:#?}");
    assert_ordered(&events);

    let EventPayload::Completed { result } = &events.last().unwrap().payload else {
        panic!("expected completion, got {:?}", events.last());
    };
    assert_eq!(result.scene_count, 3);
    assert_eq!(result.chapter_count, 1);
    assert!(result.path.ends_with(format!("{id}/final.mp4")));
    assert!(result.path.exists(), "promoted video exists on disk");
    assert!(result.byte_size > 0);

    // Every scene estimate clamps to 10s and outlasts the 4s measured
    // audio, so the container duration is their sum.
    assert!((result.duration_seconds - 30.0).abs() < 0.2);

    // One chapter: per-chapter concat happens, the final concat is skipped.
    assert_eq!(mux.counters.mux_still.load(Ordering::SeqCst), 3);
    assert_eq!(mux.counters.concat.load(Ordering::SeqCst), 1);

    let job = engine.wait(id).await.unwrap();
    assert_eq!(*job.status(), JobStatus::Completed);
    assert_eq!(*job.progress_pct(), 100);
    assert!(job.result().is_some());

    // Scratch is destroyed after promotion.
    assert!(!dir.path().join("jobs").join(id.to_string()).exists());
}

#[tokio::test]
async fn short_input_fails_validation_and_leaves_no_scratch() {
    let dir = TempDir::new().unwrap();
    let engine = engine_with(
        &dir,
        MockText::answering(analysis_json(1)),
        MockImage::ok(),
        MockSpeech::ok(),
        MockMux::with_audio_duration(4.0),
    );

    let id = engine.submit("far too short".to_string(), JobOptions::default());
    let mut stream = engine.subscribe(id);
    let events = collect(&mut stream).await;

    let EventPayload::Failed { kind, .. } = &events.last().unwrap().payload else {
        panic!("expected failure");
    };
    assert_eq!(kind, "ValidationError");

    let job = engine.wait(id).await.unwrap();
    assert_eq!(*job.status(), JobStatus::Failed);
    assert!(job.result().is_none());
    assert!(!dir.path().join("jobs").join(id.to_string()).exists());
}

#[tokio::test(start_paused = true)]
async fn transient_image_failures_are_absorbed_by_retry() {
    let dir = TempDir::new().unwrap();
    let image = MockImage::flaky(2);
    let engine = engine_with(
        &dir,
        MockText::answering(analysis_json(3)),
        image.clone(),
        MockSpeech::ok(),
        MockMux::with_audio_duration(4.0),
    );

    let id = engine.submit(sample_text(), JobOptions::default());
    let mut stream = engine.subscribe(id);
    let events = collect(&mut stream).await;

    assert_ordered(&events);
    assert!(matches!(
        events.last().unwrap().payload,
        EventPayload::Completed { .. }
    ));
    // Two transient failures and one success per scene.
    assert_eq!(image.calls.load(Ordering::SeqCst), 9);
}

#[tokio::test(start_paused = true)]
async fn exhausted_image_retries_fail_the_scene() {
    let dir = TempDir::new().unwrap();
    let engine = engine_with(
        &dir,
        MockText::answering(analysis_json(2)),
        MockImage::flaky(3),
        MockSpeech::ok(),
        MockMux::with_audio_duration(4.0),
    );

    let id = engine.submit(sample_text(), JobOptions::default());
    let mut stream = engine.subscribe(id);
    let events = collect(&mut stream).await;

    let EventPayload::Failed { kind, detail } = &events.last().unwrap().payload else {
        panic!("expected failure");
    };
    assert_eq!(kind, "RenderError");
    assert!(detail.contains("scene 1"), "detail names the scene: {detail}");
}

#[tokio::test]
async fn malformed_speech_payload_is_fatal_before_any_muxing() {
    let dir = TempDir::new().unwrap();
    let mux = MockMux::with_audio_duration(4.0);
    let engine = engine_with(
        &dir,
        MockText::answering(analysis_json(3)),
        MockImage::ok(),
        MockSpeech::malformed_on(2),
        mux.clone(),
    );

    let id = engine.submit(sample_text(), JobOptions::default());
    let mut stream = engine.subscribe(id);
    let events = collect(&mut stream).await;

    let EventPayload::Failed { kind, detail } = &events.last().unwrap().payload else {
        panic!("expected failure");
    };
    assert_eq!(kind, "ModelOutputError");
    assert!(detail.contains("scene 2"), "detail references scene 2: {detail}");

    // Composition never starts.
    assert_eq!(mux.counters.mux_still.load(Ordering::SeqCst), 0);
    assert_eq!(mux.counters.concat.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn late_and_post_completion_subscribers_agree_on_the_terminal_event() {
    let dir = TempDir::new().unwrap();
    let midway = Arc::new(Notify::new());
    let engine = engine_with(
        &dir,
        MockText::answering(analysis_json(4)),
        MockImage::notifying_at(2, midway.clone()),
        MockSpeech::ok(),
        MockMux::with_audio_duration(4.0),
    );

    let id = engine.submit(sample_text(), JobOptions::default());
    let mut first = engine.subscribe(id);

    midway.notified().await;
    let mut second = engine.subscribe(id);

    let first_events = collect(&mut first).await;
    let second_events = collect(&mut second).await;
    engine.wait(id).await;
    let mut third = engine.subscribe(id);
    let third_events = collect(&mut third).await;

    let terminal = first_events.last().unwrap();
    assert!(terminal.payload.is_terminal());
    assert_eq!(terminal, second_events.last().unwrap());
    assert_eq!(terminal, third_events.last().unwrap());
    assert_eq!(third_events.len(), 1, "post-completion replay is terminal only");

    let (EventPayload::Completed { result: a }, EventPayload::Completed { result: b }) =
        (&terminal.payload, &third_events[0].payload)
    else {
        panic!("expected completions");
    };
    assert_eq!(a.path, b.path);
}

#[tokio::test]
async fn cancel_mid_render_stops_the_job_and_cleans_up() {
    let dir = TempDir::new().unwrap();
    let at_fourth_image = Arc::new(Notify::new());
    let image = MockImage::notifying_at(4, at_fourth_image.clone());
    let engine = engine_with(
        &dir,
        MockText::answering(analysis_json(10)),
        image.clone(),
        MockSpeech::ok(),
        MockMux::with_audio_duration(4.0),
    );

    let id = engine.submit(sample_text(), JobOptions::default());
    let mut stream = engine.subscribe(id);

    at_fourth_image.notified().await;
    assert!(engine.cancel(id));

    let events = collect(&mut stream).await;
    let EventPayload::Failed { kind, .. } = &events.last().unwrap().payload else {
        panic!("expected a failed-class terminal event");
    };
    assert_eq!(kind, "Cancelled");

    let job = engine.wait(id).await.unwrap();
    assert_eq!(*job.status(), JobStatus::Cancelled);
    assert!(job.result().is_none());
    assert!(
        image.calls.load(Ordering::SeqCst) <= 5,
        "rendering stopped promptly"
    );
    assert!(!dir.path().join("jobs").join(id.to_string()).exists());
    assert!(!dir
        .path()
        .join("videos")
        .join(id.to_string())
        .join("final.mp4")
        .exists());
}

#[tokio::test]
async fn two_chapter_job_concatenates_chapters_then_the_final_video() {
    let dir = TempDir::new().unwrap();
    let mux = MockMux::with_audio_duration(4.0);
    let engine = engine_with(
        &dir,
        MockText::answering(two_chapter_json(2)),
        MockImage::ok(),
        MockSpeech::ok(),
        mux.clone(),
    );

    let id = engine.submit(sample_text(), JobOptions::default());
    let job = engine.wait(id).await.unwrap();
    assert_eq!(*job.status(), JobStatus::Completed);

    let result = job.result().as_ref().unwrap();
    assert_eq!(result.scene_count, 4);
    assert_eq!(result.chapter_count, 2);

    // Two chapter concats plus the final concat.
    assert_eq!(mux.counters.mux_still.load(Ordering::SeqCst), 4);
    assert_eq!(mux.counters.concat.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn per_line_dialogue_synthesizes_each_line_and_concatenates_the_scene_track() {
    let dir = TempDir::new().unwrap();
    let mux = MockMux::with_audio_duration(4.0);
    let speech = MockSpeech::ok();
    let engine = engine_with(
        &dir,
        MockText::answering(analysis_json(2)),
        MockImage::ok(),
        speech.clone(),
        mux.clone(),
    );

    let options = JobOptions {
        dialogue_mode: DialogueMode::PerLine,
        ..JobOptions::default()
    };
    let id = engine.submit(sample_text(), options);
    let job = engine.wait(id).await.unwrap();
    assert_eq!(*job.status(), JobStatus::Completed);

    // Two dialogue lines per scene.
    assert_eq!(speech.calls.load(Ordering::SeqCst), 4);
    // One audio concat per scene plus the chapter concat.
    assert_eq!(mux.counters.concat.load(Ordering::SeqCst), 3);

    // The same speaker keeps the same voice across scenes and lines.
    let voices = speech.voices_seen.lock().unwrap();
    assert_eq!(voices[0], voices[2], "Mara's voice is stable");
    assert_eq!(voices[1], voices[3], "Wen's voice is stable");
    assert_ne!(voices[0], voices[1], "distinct speakers get distinct voices");
}

#[tokio::test]
async fn retained_scratch_survives_a_failed_job() {
    let dir = TempDir::new().unwrap();
    let engine = engine_with(
        &dir,
        MockText::answering(analysis_json(2)),
        MockImage::ok(),
        MockSpeech::malformed_on(1),
        MockMux::with_audio_duration(4.0),
    );

    let options = JobOptions {
        retain_scratch_on_failure: true,
        ..JobOptions::default()
    };
    let id = engine.submit(sample_text(), options);
    let job = engine.wait(id).await.unwrap();

    assert_eq!(*job.status(), JobStatus::Failed);
    assert!(
        dir.path().join("jobs").join(id.to_string()).exists(),
        "scratch retained for inspection"
    );
}
