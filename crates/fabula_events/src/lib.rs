//! In-process fan-out of job progress events.
//!
//! The bus keys event channels by job id. Publishing never blocks on
//! subscriber throughput: each subscriber reads from its own bounded
//! broadcast queue and a subscriber that falls too far behind is cut off
//! with a [`StreamItem::SlowConsumer`] marker instead of slowing anyone
//! down. The most recent event per job is retained so a late-joining
//! subscriber starts with a replay rather than a blank stream.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use fabula_core::{EventPayload, JobEvent, JobId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// Default per-subscriber queue depth.
const DEFAULT_CAPACITY: usize = 256;

struct JobChannel {
    sender: broadcast::Sender<JobEvent>,
    latest: Option<JobEvent>,
    next_sequence: u64,
}

impl JobChannel {
    fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            latest: None,
            next_sequence: 0,
        }
    }
}

/// Multi-subscriber event fan-out keyed by job id.
///
/// Cloning shares the underlying state; the bus is the one piece of
/// process-wide mutable state in the engine.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<HashMap<JobId, JobChannel>>>,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    /// Create a bus with the given per-subscriber queue depth.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Append an event for a job, assigning the next sequence number.
    ///
    /// The event is retained for replay and fanned out to live
    /// subscribers; subscribers that lag are never waited on.
    pub fn publish(&self, job_id: JobId, payload: EventPayload) -> JobEvent {
        let mut channels = self.inner.lock().expect("event bus lock poisoned");
        let channel = channels
            .entry(job_id)
            .or_insert_with(|| JobChannel::new(self.capacity));
        let event = JobEvent {
            job_id,
            sequence: channel.next_sequence,
            payload,
        };
        channel.next_sequence += 1;
        channel.latest = Some(event.clone());
        // Send fails only when there is no live receiver; replay covers
        // subscribers that arrive later.
        let _ = channel.sender.send(event.clone());
        tracing::trace!(job_id = %job_id, sequence = event.sequence, "published event");
        event
    }

    /// Subscribe to a job's event stream.
    ///
    /// The stream yields the latest retained event first (if any), then
    /// live events, and completes after a terminal event is delivered.
    pub fn subscribe(&self, job_id: JobId) -> EventStream {
        let mut channels = self.inner.lock().expect("event bus lock poisoned");
        let channel = channels
            .entry(job_id)
            .or_insert_with(|| JobChannel::new(self.capacity));
        // Replay snapshot and receiver are taken under the same lock as
        // publish, so the live stream starts exactly after the replayed
        // event with no gap and no duplicate.
        EventStream {
            replay: channel.latest.clone(),
            receiver: channel.sender.subscribe(),
            done: false,
        }
    }

    /// Drop the retained state for a job once no observer needs it.
    pub fn forget(&self, job_id: JobId) {
        let mut channels = self.inner.lock().expect("event bus lock poisoned");
        channels.remove(&job_id);
    }
}

/// One delivery on an event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    /// An ordinary event
    Event(JobEvent),
    /// The subscriber fell behind and was cut off; `skipped` events were
    /// dropped for it. The stream ends after this item.
    SlowConsumer {
        /// How many events this subscriber missed
        skipped: u64,
    },
}

/// A lazy per-subscriber sequence of job events.
pub struct EventStream {
    replay: Option<JobEvent>,
    receiver: broadcast::Receiver<JobEvent>,
    done: bool,
}

impl EventStream {
    /// Await the next delivery. Returns `None` once the stream completed:
    /// after a terminal event, after a slow-consumer cutoff, or when the
    /// job's channel is gone.
    pub async fn next(&mut self) -> Option<StreamItem> {
        if self.done {
            return None;
        }
        if let Some(event) = self.replay.take() {
            if event.payload.is_terminal() {
                self.done = true;
            }
            return Some(StreamItem::Event(event));
        }
        match self.receiver.recv().await {
            Ok(event) => {
                if event.payload.is_terminal() {
                    self.done = true;
                }
                Some(StreamItem::Event(event))
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                self.done = true;
                tracing::warn!(skipped, "subscriber dropped as slow consumer");
                Some(StreamItem::SlowConsumer { skipped })
            }
            Err(broadcast::error::RecvError::Closed) => {
                self.done = true;
                None
            }
        }
    }
}
