//! Progress events delivered to job observers.

use crate::{FinalVideo, JobId, Stage};
use serde::{Deserialize, Serialize};

/// The observable payload of a job event.
///
/// Serialization matches the wire contract of the progress stream:
///
/// ```json
/// { "type":"progress",  "stage":"render", "progress":45, "message":"..." }
/// { "type":"completed", "result": { "video_path":"...", "duration":12.5, ... } }
/// { "type":"failed",    "kind":"RenderError", "detail":"..." }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EventPayload {
    /// Forward progress within a stage
    Progress {
        /// Current stage
        stage: Stage,
        /// Progress percentage, 0..=100
        progress: u8,
        /// Short human-readable status
        message: String,
    },
    /// Terminal success
    Completed {
        /// The promoted final video
        result: FinalVideo,
    },
    /// Terminal failure or cancellation
    Failed {
        /// Wire label of the error kind
        kind: String,
        /// Best-effort detail string
        detail: String,
    },
}

impl EventPayload {
    /// True for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EventPayload::Completed { .. } | EventPayload::Failed { .. }
        )
    }

    /// Progress percentage implied by the payload, when it carries one.
    pub fn progress(&self) -> Option<u8> {
        match self {
            EventPayload::Progress { progress, .. } => Some(*progress),
            EventPayload::Completed { .. } => Some(100),
            EventPayload::Failed { .. } => None,
        }
    }
}

/// One event on a job's progress stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    /// Job the event belongs to
    pub job_id: JobId,
    /// Strictly monotonic per-job sequence number
    pub sequence: u64,
    /// The observable payload
    #[serde(flatten)]
    pub payload: EventPayload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_wire_shape() {
        let event = JobEvent {
            job_id: JobId::new(),
            sequence: 3,
            payload: EventPayload::Progress {
                stage: Stage::Render,
                progress: 45,
                message: "rendered 4/10 scenes".to_string(),
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["stage"], "render");
        assert_eq!(json["progress"], 45);
    }

    #[test]
    fn failed_wire_shape() {
        let event = JobEvent {
            job_id: JobId::new(),
            sequence: 9,
            payload: EventPayload::Failed {
                kind: "ValidationError".to_string(),
                detail: "too short".to_string(),
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "failed");
        assert_eq!(json["kind"], "ValidationError");
    }
}
