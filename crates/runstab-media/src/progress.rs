//! Progress reporting for stabilization runs.
//!
//! The pipeline emits [`ProgressEvent`]s through a [`ProgressSender`] without
//! knowing where they end up (terminal, logs, a UI). Delivery never blocks
//! the frame loop and never drops an event.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Progress event emitted during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Source opened; `total_frames` is the up-front estimate
    Started { total_frames: u64 },

    /// A frame index was consumed
    Frame { frames_done: u64, fraction: f64 },

    /// Frame loop done, flushing the encoder
    Finalizing,

    /// Output file complete
    Complete { frames_written: u64 },

    /// Run failed
    Failed { error: String },

    /// Run abandoned on request
    Cancelled,
}

impl ProgressEvent {
    /// Completion fraction carried by the event, if any.
    pub fn fraction(&self) -> Option<f64> {
        match self {
            ProgressEvent::Started { .. } => Some(0.0),
            ProgressEvent::Frame { fraction, .. } => Some(*fraction),
            ProgressEvent::Complete { .. } => Some(1.0),
            _ => None,
        }
    }
}

/// Progress callback type.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Progress sender for async contexts.
///
/// Backed by an unbounded channel: sends never block the producer and
/// events are never discarded.
#[derive(Clone)]
pub struct ProgressSender {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressSender {
    pub fn new(tx: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self { tx }
    }

    /// Send a progress event (non-blocking).
    pub fn send(&self, event: ProgressEvent) {
        // A dropped receiver just means nobody is listening.
        let _ = self.tx.send(event);
    }

    pub fn started(&self, total_frames: u64) {
        self.send(ProgressEvent::Started { total_frames });
    }

    /// Report `frames_done` of `total_frames`, capped at 1.0.
    pub fn frame(&self, frames_done: u64, total_frames: u64) {
        let fraction = if total_frames == 0 {
            1.0
        } else {
            (frames_done as f64 / total_frames as f64).min(1.0)
        };
        self.send(ProgressEvent::Frame {
            frames_done,
            fraction,
        });
    }

    pub fn finalizing(&self) {
        self.send(ProgressEvent::Finalizing);
    }

    pub fn complete(&self, frames_written: u64) {
        self.send(ProgressEvent::Complete { frames_written });
    }

    pub fn failed(&self, error: impl Into<String>) {
        self.send(ProgressEvent::Failed {
            error: error.into(),
        });
    }

    pub fn cancelled(&self) {
        self.send(ProgressEvent::Cancelled);
    }
}

/// Progress receiver for collecting events.
pub struct ProgressReceiver {
    rx: mpsc::UnboundedReceiver<ProgressEvent>,
}

impl ProgressReceiver {
    /// Receive the next progress event.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }

    /// Try to receive a progress event without blocking.
    pub fn try_recv(&mut self) -> Option<ProgressEvent> {
        self.rx.try_recv().ok()
    }

    /// Drain every event into `callback` on a background task.
    ///
    /// The task ends once all senders are dropped.
    pub fn forward_to(mut self, callback: ProgressCallback) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = self.rx.recv().await {
                callback(event);
            }
        })
    }
}

/// Create a progress channel pair.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ProgressSender::new(tx), ProgressReceiver { rx })
}

/// A no-op progress sender for when progress reporting is not needed.
pub fn noop_sender() -> ProgressSender {
    let (tx, _rx) = mpsc::unbounded_channel();
    ProgressSender::new(tx)
}
