//! The job record and its lifecycle.

use crate::{FinalVideo, JobOptions};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable unique identifier for one end-to-end job.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    derive_more::Display,
)]
#[display("{}", _0)]
pub struct JobId(Uuid);

impl JobId {
    /// Mint a fresh job id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle status of a job.
///
/// Transitions are total-ordered: `Pending → Running` followed by exactly
/// one of the terminal states.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Submitted, not yet picked up
    #[display("pending")]
    Pending,
    /// Being driven through the stages
    #[display("running")]
    Running,
    /// Finished with a final video
    #[display("completed")]
    Completed,
    /// Finished with an error
    #[display("failed")]
    Failed,
    /// Stopped by cooperative cancellation
    #[display("cancelled")]
    Cancelled,
}

impl JobStatus {
    /// True for `Completed`, `Failed` and `Cancelled`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// Pipeline stage a job is currently in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Before stage 1 starts
    #[display("init")]
    Init,
    /// Stage 1: text understanding
    #[display("analyze")]
    Analyze,
    /// Stage 2: storyboard construction
    #[display("storyboard")]
    Storyboard,
    /// Stage 3: per-scene asset rendering
    #[display("render")]
    Render,
    /// Stage 4: video muxing
    #[display("compose")]
    Compose,
    /// After the final video is promoted
    #[display("done")]
    Done,
}

/// Error surfaced on a failed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    /// Wire label of the error kind
    pub kind: String,
    /// Best-effort human detail
    pub detail: String,
}

/// The root entity tying together all per-job state.
///
/// Mutable by its single owner (the orchestrator). `progress_pct` never
/// decreases; mutation goes through the methods here so that invariant
/// holds by construction.
#[derive(Debug, Clone, Serialize, Deserialize, derive_getters::Getters)]
pub struct Job {
    /// Stable identifier
    id: JobId,
    /// The original prose
    input_text: String,
    /// Per-job configuration
    options: JobOptions,
    /// Lifecycle status
    status: JobStatus,
    /// Current stage label
    stage: Stage,
    /// Progress percentage, 0..=100, monotonic non-decreasing
    progress_pct: u8,
    /// Short human-readable status
    message: String,
    /// Populated only on completion
    result: Option<FinalVideo>,
    /// Populated only on failure
    error: Option<JobError>,
    /// Submission time
    created_at: DateTime<Utc>,
    /// Last mutation time
    updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a pending job at submission time.
    pub fn new(id: JobId, input_text: String, options: JobOptions) -> Self {
        let now = Utc::now();
        Self {
            id,
            input_text,
            options,
            status: JobStatus::Pending,
            stage: Stage::Init,
            progress_pct: 0,
            message: "queued".to_string(),
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark the job as picked up by the orchestrator.
    pub fn start(&mut self) {
        self.status = JobStatus::Running;
        self.touch();
    }

    /// Record progress within a stage. Regressing percentages are clamped
    /// to the current value so `progress_pct` stays monotonic.
    pub fn advance(&mut self, stage: Stage, pct: u8, message: impl Into<String>) {
        self.stage = stage;
        self.progress_pct = self.progress_pct.max(pct.min(100));
        self.message = message.into();
        self.touch();
    }

    /// Terminal success.
    pub fn complete(&mut self, result: FinalVideo) {
        self.status = JobStatus::Completed;
        self.stage = Stage::Done;
        self.progress_pct = 100;
        self.message = "video ready".to_string();
        self.result = Some(result);
        self.touch();
    }

    /// Terminal failure.
    pub fn fail(&mut self, kind: impl Into<String>, detail: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.error = Some(JobError {
            kind: kind.into(),
            detail: detail.into(),
        });
        self.touch();
    }

    /// Terminal cancellation.
    pub fn cancel(&mut self) {
        self.status = JobStatus::Cancelled;
        self.error = Some(JobError {
            kind: "Cancelled".to_string(),
            detail: "job cancelled".to_string(),
        });
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
