//! The job orchestrator.

use crate::analyzer::TextAnalyzer;
use crate::composer::SceneComposer;
use crate::renderer::SceneRenderer;
use crate::settings::EngineSettings;
use crate::storyboard::StoryboardBuilder;
use crate::voices::VoiceRegistry;
use fabula_core::{EventPayload, FinalVideo, Job, JobId, JobOptions, Stage};
use fabula_error::{ExternalServiceError, ExternalServiceErrorKind, FabulaResult};
use fabula_events::{EventBus, EventStream};
use fabula_interface::{ImageSynthesis, MediaMux, SpeechSynthesis, TextUnderstanding};
use fabula_storage::{JobScratch, ScratchStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

/// The four external capabilities a job needs.
#[derive(Clone)]
pub struct Adapters {
    /// Text understanding for stage 1
    pub text: Arc<dyn TextUnderstanding>,
    /// Image synthesis for stage 3
    pub image: Arc<dyn ImageSynthesis>,
    /// Speech synthesis for stage 3
    pub speech: Arc<dyn SpeechSynthesis>,
    /// Media muxing for stages 3 and 4
    pub mux: Arc<dyn MediaMux>,
}

struct JobEntry {
    job: Job,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

struct EngineInner {
    adapters: Adapters,
    store: ScratchStore,
    bus: EventBus,
    pause_marker: String,
    jobs: Mutex<HashMap<JobId, JobEntry>>,
}

/// Top-level driver: accepts jobs, runs each through the four stages in
/// its own task, and publishes progress on the event bus.
///
/// Jobs are independent; they share nothing but the bus and the
/// filesystem roots. Cloning the engine shares the underlying state.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Create an engine over the given adapters and storage roots.
    pub fn new(adapters: Adapters, store: ScratchStore, settings: &EngineSettings) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                adapters,
                store,
                bus: EventBus::new(settings.event_capacity),
                pause_marker: settings.dialogue_pause_marker.clone(),
                jobs: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The event bus carrying all job progress streams.
    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Accept a job and start executing it asynchronously.
    ///
    /// Returns the job id immediately; every outcome, including input
    /// validation failures, is reported through the event stream.
    #[instrument(skip(self, input_text, options), fields(text_len = input_text.len()))]
    pub fn submit(&self, input_text: String, options: JobOptions) -> JobId {
        let id = JobId::new();
        let job = Job::new(id, input_text.clone(), options.clone());
        let cancel = CancellationToken::new();

        // Register before spawning so the task always finds its entry.
        {
            let mut jobs = self.inner.jobs.lock().expect("job registry lock poisoned");
            jobs.insert(
                id,
                JobEntry {
                    job,
                    cancel: cancel.clone(),
                    handle: None,
                },
            );
        }

        let engine = self.clone();
        let handle = tokio::spawn(async move {
            engine.run_job(id, input_text, options, cancel).await;
        });
        {
            let mut jobs = self.inner.jobs.lock().expect("job registry lock poisoned");
            if let Some(entry) = jobs.get_mut(&id) {
                entry.handle = Some(handle);
            }
        }
        info!(job_id = %id, "job submitted");
        id
    }

    /// Request cooperative cancellation. Returns false for unknown or
    /// already-terminal jobs.
    pub fn cancel(&self, id: JobId) -> bool {
        let jobs = self.inner.jobs.lock().expect("job registry lock poisoned");
        match jobs.get(&id) {
            Some(entry) if !entry.job.status().is_terminal() => {
                entry.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Snapshot of the job record.
    pub fn status(&self, id: JobId) -> Option<Job> {
        let jobs = self.inner.jobs.lock().expect("job registry lock poisoned");
        jobs.get(&id).map(|entry| entry.job.clone())
    }

    /// Subscribe to a job's progress stream; late joiners get the most
    /// recent event replayed first.
    pub fn subscribe(&self, id: JobId) -> EventStream {
        self.inner.bus.subscribe(id)
    }

    /// Wait for a job's task to finish and return the final record.
    pub async fn wait(&self, id: JobId) -> Option<Job> {
        let handle = {
            let mut jobs = self.inner.jobs.lock().expect("job registry lock poisoned");
            jobs.get_mut(&id).and_then(|entry| entry.handle.take())
        };
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.status(id)
    }

    /// Release per-job bus state once no observer needs the stream.
    pub fn forget(&self, id: JobId) {
        self.inner.bus.forget(id);
        let mut jobs = self.inner.jobs.lock().expect("job registry lock poisoned");
        if let Some(entry) = jobs.get(&id) {
            if entry.job.status().is_terminal() {
                jobs.remove(&id);
            }
        }
    }

    /// Advance the job record and publish the matching progress event.
    ///
    /// The record clamps regressions, and the event carries the clamped
    /// value, so the stream's percentages never decrease either.
    fn publish_progress(&self, id: JobId, stage: Stage, pct: u8, message: impl Into<String>) {
        let message = message.into();
        let clamped = {
            let mut jobs = self.inner.jobs.lock().expect("job registry lock poisoned");
            match jobs.get_mut(&id) {
                Some(entry) => {
                    entry.job.advance(stage, pct, message.clone());
                    *entry.job.progress_pct()
                }
                None => pct,
            }
        };
        self.inner.bus.publish(
            id,
            EventPayload::Progress {
                stage,
                progress: clamped,
                message,
            },
        );
    }

    #[instrument(skip_all, fields(job_id = %id))]
    async fn run_job(
        &self,
        id: JobId,
        input_text: String,
        options: JobOptions,
        cancel: CancellationToken,
    ) {
        {
            let mut jobs = self.inner.jobs.lock().expect("job registry lock poisoned");
            if let Some(entry) = jobs.get_mut(&id) {
                entry.job.start();
            }
        }
        self.publish_progress(id, Stage::Init, 0, "job started");

        let mut scratch_slot: Option<JobScratch> = None;
        let drive = self.drive(id, &input_text, &options, &cancel, &mut scratch_slot);
        let outcome = match options.job_timeout_secs {
            Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), drive).await {
                Ok(result) => result,
                Err(_) => Err(ExternalServiceError::new(ExternalServiceErrorKind::Timeout(
                    format!("job exceeded its {secs}s deadline"),
                ))
                .into()),
            },
            None => drive.await,
        };

        let retain_on_failure = options.retain_scratch_on_failure;
        match outcome {
            Ok(video) => {
                {
                    let mut jobs = self.inner.jobs.lock().expect("job registry lock poisoned");
                    if let Some(entry) = jobs.get_mut(&id) {
                        entry.job.complete(video.clone());
                    }
                }
                self.inner
                    .bus
                    .publish(id, EventPayload::Completed { result: video });
                self.cleanup_scratch(scratch_slot, true).await;
                info!(job_id = %id, "job completed");
            }
            Err(e) if e.kind().is_cancellation() => {
                {
                    let mut jobs = self.inner.jobs.lock().expect("job registry lock poisoned");
                    if let Some(entry) = jobs.get_mut(&id) {
                        entry.job.cancel();
                    }
                }
                self.inner.bus.publish(
                    id,
                    EventPayload::Failed {
                        kind: "Cancelled".to_string(),
                        detail: e.detail(),
                    },
                );
                self.cleanup_scratch(scratch_slot, !retain_on_failure).await;
                info!(job_id = %id, "job cancelled");
            }
            Err(e) => {
                let kind = e.kind().label().to_string();
                let detail = e.detail();
                {
                    let mut jobs = self.inner.jobs.lock().expect("job registry lock poisoned");
                    if let Some(entry) = jobs.get_mut(&id) {
                        entry.job.fail(kind.clone(), detail.clone());
                    }
                }
                self.inner
                    .bus
                    .publish(id, EventPayload::Failed { kind, detail });
                self.cleanup_scratch(scratch_slot, !retain_on_failure).await;
                warn!(job_id = %id, error = %e, "job failed");
            }
        }
    }

    /// The four stages in order with the fixed progress bands:
    /// analyze 0-20, storyboard 20-30, render 30-70 linear in scenes,
    /// compose 70-100.
    async fn drive(
        &self,
        id: JobId,
        input_text: &str,
        options: &JobOptions,
        cancel: &CancellationToken,
        scratch_slot: &mut Option<JobScratch>,
    ) -> FabulaResult<FinalVideo> {
        self.publish_progress(id, Stage::Analyze, 0, "analyzing text");
        let analyzer = TextAnalyzer::new(Arc::clone(&self.inner.adapters.text));
        let (analysis, warnings) = analyzer.analyze(input_text, options, cancel).await?;
        for warning in warnings {
            self.publish_progress(id, Stage::Analyze, 20, warning);
        }
        self.publish_progress(
            id,
            Stage::Analyze,
            20,
            format!(
                "analysis complete: {} characters, {} scenes",
                analysis.characters.len(),
                analysis.scene_count()
            ),
        );

        self.publish_progress(id, Stage::Storyboard, 20, "building storyboard");
        let builder = StoryboardBuilder::new(options, &self.inner.pause_marker);
        let storyboard = builder.build(&analysis);
        self.publish_progress(
            id,
            Stage::Storyboard,
            30,
            format!("storyboard ready: {} scenes", storyboard.scene_count()),
        );

        let scratch = self.inner.store.open(id).await?;
        let scratch = scratch_slot.insert(scratch);

        let mut voices = VoiceRegistry::new(options);
        SceneRenderer::preassign_voices(&storyboard, &mut voices);

        self.publish_progress(id, Stage::Render, 30, "rendering scenes");
        let renderer = SceneRenderer::new(
            Arc::clone(&self.inner.adapters.image),
            Arc::clone(&self.inner.adapters.speech),
            Arc::clone(&self.inner.adapters.mux),
        );
        let total = storyboard.scene_count();
        let rendered = renderer
            .render(&storyboard, scratch, &voices, options, cancel, |done, _| {
                let pct = 30 + ((done as f64 / total.max(1) as f64) * 40.0) as u8;
                self.publish_progress(
                    id,
                    Stage::Render,
                    pct.min(70),
                    format!("rendered {done}/{total} scenes"),
                );
            })
            .await?;

        self.publish_progress(id, Stage::Compose, 70, "composing video");
        let composer = SceneComposer::new(Arc::clone(&self.inner.adapters.mux));
        let video = composer.compose(&rendered, scratch, cancel).await?;
        Ok(video)
    }

    async fn cleanup_scratch(&self, scratch: Option<JobScratch>, should_clean: bool) {
        if let Some(scratch) = scratch {
            if should_clean {
                if let Err(e) = scratch.cleanup().await {
                    error!(error = %e, "scratch cleanup failed");
                }
            }
        }
    }
}
