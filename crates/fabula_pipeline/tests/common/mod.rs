//! Scripted adapter fakes shared by the pipeline tests.
#![allow(dead_code)]
//!
//! No network and no ffmpeg: the mux fake writes marker files whose
//! content encodes a duration (`clip:<seconds>`), so probing a muxed or
//! concatenated artifact behaves like the real tool without it.

use async_trait::async_trait;
use fabula_error::{
    ExternalServiceError, ExternalServiceErrorKind, FabulaResult, ModelOutputError,
    ModelOutputErrorKind,
};
use fabula_interface::{ImageSynthesis, MediaMux, SpeechSynthesis, TextUnderstanding};
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// A retryable transport failure.
pub fn transient() -> fabula_error::FabulaError {
    ExternalServiceError::new(ExternalServiceErrorKind::Status {
        status_code: 503,
        message: "service unavailable".to_string(),
    })
    .into()
}

/// Analysis payload with `scenes` scenes in one chapter and two speaking
/// characters.
pub fn analysis_json(scenes: usize) -> serde_json::Value {
    let scene_values: Vec<serde_json::Value> = (1..=scenes)
        .map(|i| {
            json!({
                "scene_id": i,
                "location": format!("location {i}"),
                "time": "morning",
                "description": format!("scene {i} of the story"),
                "atmosphere": "calm",
                "lighting": "soft daylight",
                "characters": ["Mara", "Wen"],
                "narration": "",
                "dialogue": [
                    {"speaker": "Mara", "text": format!("line one of scene {i}")},
                    {"speaker": "Wen", "text": "a reply"}
                ],
                "actions": ["walks to the window"],
                "character_appearances": {}
            })
        })
        .collect();
    json!({
        "characters": [
            {
                "name": "Mara",
                "appearance": {"gender": "female", "age": 22, "hair": "long red hair"},
                "personality": "curious",
                "role": "protagonist"
            },
            {
                "name": "Wen",
                "appearance": {"gender": "male", "age": 67},
                "personality": "patient",
                "role": "mentor"
            }
        ],
        "chapters": [
            {"chapter_id": 1, "title": "Opening", "scenes": scene_values}
        ],
        "plot_points": [
            {"scene_ref": 1, "kind": "normal", "description": "introduction"}
        ]
    })
}

/// A paragraph-heavy input comfortably past the minimum length.
pub fn sample_text() -> String {
    "The harbor town woke slowly, gulls wheeling over the grey water. "
        .repeat(8)
}

/// Analysis payload with two chapters of `scenes_per` scenes each.
pub fn two_chapter_json(scenes_per: usize) -> serde_json::Value {
    let chapter = |chapter_id: u32| {
        let scene_values: Vec<serde_json::Value> = (1..=scenes_per)
            .map(|i| {
                json!({
                    "scene_id": i,
                    "description": format!("chapter {chapter_id} scene {i}"),
                    "characters": ["Mara"],
                    "narration": format!("narration for chapter {chapter_id} scene {i}"),
                    "dialogue": [],
                    "actions": []
                })
            })
            .collect();
        json!({"chapter_id": chapter_id, "title": format!("Chapter {chapter_id}"), "scenes": scene_values})
    };
    json!({
        "characters": [{"name": "Mara", "appearance": {"gender": "female", "age": 22}}],
        "chapters": [chapter(1), chapter(2)],
        "plot_points": []
    })
}

// ─── Text understanding ─────────────────────────────────────────────────

/// Scripted text adapter: optionally fails N times first, then answers
/// from a fixed queue (the last payload repeats).
pub struct MockText {
    payloads: Mutex<Vec<serde_json::Value>>,
    failures_left: AtomicUsize,
    pub calls: AtomicUsize,
}

impl MockText {
    pub fn answering(payload: serde_json::Value) -> Arc<Self> {
        Arc::new(Self {
            payloads: Mutex::new(vec![payload]),
            failures_left: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn answering_sequence(payloads: Vec<serde_json::Value>) -> Arc<Self> {
        Arc::new(Self {
            payloads: Mutex::new(payloads),
            failures_left: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn flaky(failures: usize, payload: serde_json::Value) -> Arc<Self> {
        Arc::new(Self {
            payloads: Mutex::new(vec![payload]),
            failures_left: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl TextUnderstanding for MockText {
    async fn analyze(&self, _prompt: &str, _text: &str) -> FabulaResult<serde_json::Value> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(transient());
        }
        let payloads = self.payloads.lock().unwrap();
        let index = call.min(payloads.len().saturating_sub(1));
        Ok(payloads[index].clone())
    }
}

// ─── Image synthesis ────────────────────────────────────────────────────

/// Scripted image adapter with per-prompt transient failures and an
/// optional cancellation hook after a call count.
pub struct MockImage {
    failures_per_prompt: usize,
    seen: Mutex<HashMap<String, usize>>,
    pub calls: AtomicUsize,
    notify_at: Option<(usize, Arc<Notify>)>,
}

impl MockImage {
    pub fn ok() -> Arc<Self> {
        Self::flaky(0)
    }

    /// Fail `failures` times per distinct prompt, then succeed.
    pub fn flaky(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            failures_per_prompt: failures,
            seen: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            notify_at: None,
        })
    }

    /// Notify once the adapter has been invoked `count` times.
    pub fn notifying_at(count: usize, notify: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            failures_per_prompt: 0,
            seen: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            notify_at: Some((count, notify)),
        })
    }
}

#[async_trait]
impl ImageSynthesis for MockImage {
    async fn generate_image(
        &self,
        prompt: &str,
        _size: &str,
        _seed: Option<u64>,
    ) -> FabulaResult<Vec<u8>> {
        let calls = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((at, notify)) = &self.notify_at {
            if calls == *at {
                notify.notify_one();
            }
        }
        let mut seen = self.seen.lock().unwrap();
        let attempts = seen.entry(prompt.to_string()).or_insert(0);
        *attempts += 1;
        if *attempts <= self.failures_per_prompt {
            return Err(transient());
        }
        Ok(b"png-bytes".to_vec())
    }
}

// ─── Speech synthesis ───────────────────────────────────────────────────

/// Scripted speech adapter; records the voice used per call and can
/// return a malformed payload on one call.
pub struct MockSpeech {
    pub calls: AtomicUsize,
    pub voices_seen: Mutex<Vec<String>>,
    malformed_on_call: Option<usize>,
}

impl MockSpeech {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            voices_seen: Mutex::new(Vec::new()),
            malformed_on_call: None,
        })
    }

    /// The `call`-th invocation (1-based) answers with undecodable base64.
    pub fn malformed_on(call: usize) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            voices_seen: Mutex::new(Vec::new()),
            malformed_on_call: Some(call),
        })
    }
}

#[async_trait]
impl SpeechSynthesis for MockSpeech {
    async fn synthesize(
        &self,
        _text: &str,
        voice_id: &str,
        _speed_ratio: f64,
        _encoding: &str,
    ) -> FabulaResult<Vec<u8>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.voices_seen.lock().unwrap().push(voice_id.to_string());
        if self.malformed_on_call == Some(call) {
            return Err(ModelOutputError::new(ModelOutputErrorKind::Base64Decode(
                "invalid padding".to_string(),
            ))
            .into());
        }
        Ok(b"mp3-bytes".to_vec())
    }
}

// ─── Media mux ──────────────────────────────────────────────────────────

/// Operation counters for the mux fake.
#[derive(Debug, Default)]
pub struct MuxCounters {
    pub mux_still: AtomicUsize,
    pub concat: AtomicUsize,
    pub probe: AtomicUsize,
    pub silence: AtomicUsize,
}

/// Media tool fake: artifacts are text files `clip:<duration>`, so
/// durations survive concatenation and promotion by travelling inside the
/// file content.
pub struct MockMux {
    /// Duration reported for files the fake did not write (synthesized audio)
    pub audio_duration: f64,
    pub counters: MuxCounters,
}

impl MockMux {
    pub fn with_audio_duration(audio_duration: f64) -> Arc<Self> {
        Arc::new(Self {
            audio_duration,
            counters: MuxCounters::default(),
        })
    }

    async fn duration_of(&self, path: &Path) -> f64 {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => content
                .strip_prefix("clip:")
                .and_then(|d| d.trim().parse().ok())
                .unwrap_or(self.audio_duration),
            Err(_) => self.audio_duration,
        }
    }
}

#[async_trait]
impl MediaMux for MockMux {
    async fn mux_still(
        &self,
        _image_path: &Path,
        _audio_path: &Path,
        duration: f64,
        out_path: &Path,
    ) -> FabulaResult<()> {
        self.counters.mux_still.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(out_path, format!("clip:{duration}"))
            .await
            .expect("mock mux write");
        Ok(())
    }

    async fn concat(&self, inputs: &[&Path], out_path: &Path) -> FabulaResult<()> {
        self.counters.concat.fetch_add(1, Ordering::SeqCst);
        let mut total = 0.0;
        for input in inputs {
            total += self.duration_of(input).await;
        }
        tokio::fs::write(out_path, format!("clip:{total}"))
            .await
            .expect("mock concat write");
        Ok(())
    }

    async fn probe_duration(&self, path: &Path) -> FabulaResult<f64> {
        self.counters.probe.fetch_add(1, Ordering::SeqCst);
        Ok(self.duration_of(path).await)
    }

    async fn make_silence(&self, duration: f64, out_path: &Path) -> FabulaResult<()> {
        self.counters.silence.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(out_path, format!("clip:{duration}"))
            .await
            .expect("mock silence write");
        Ok(())
    }
}
