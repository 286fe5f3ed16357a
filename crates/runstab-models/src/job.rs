//! Stabilization job definitions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::geometry::{CanvasSize, OUTPUT_CANVAS};
use crate::trajectory::Trajectory;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of one stabilization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Created, not started
    #[default]
    Pending,
    /// Frames are being processed
    Running,
    /// Output finalized
    Succeeded,
    /// Aborted with an error
    Failed,
    /// Abandoned by the caller
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::Cancelled
        )
    }

    /// Whether moving to `next` is a legal transition.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Pending, JobState::Running)
                | (JobState::Pending, JobState::Failed)
                | (JobState::Pending, JobState::Cancelled)
                | (JobState::Running, JobState::Succeeded)
                | (JobState::Running, JobState::Failed)
                | (JobState::Running, JobState::Cancelled)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stabilization run: source, trajectory, output target and progress.
///
/// Lives only for the duration of a single run; it is never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StabilizationJob {
    /// Unique job ID
    pub id: JobId,

    /// Source video path
    pub source: PathBuf,

    /// Output target; must not exist when the run starts
    pub output: PathBuf,

    /// Runner trajectory
    pub trajectory: Trajectory,

    /// Output canvas
    #[serde(default)]
    pub canvas: CanvasSize,

    /// Current state
    #[serde(default)]
    pub state: JobState,

    /// Frames decoded so far
    #[serde(default)]
    pub frames_processed: u64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last state change
    pub updated_at: DateTime<Utc>,

    /// Failure reason for failed jobs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StabilizationJob {
    /// Create a pending job.
    pub fn new(source: impl Into<PathBuf>, output: impl Into<PathBuf>, trajectory: Trajectory) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            source: source.into(),
            output: output.into(),
            trajectory,
            canvas: OUTPUT_CANVAS,
            state: JobState::Pending,
            frames_processed: 0,
            created_at: now,
            updated_at: now,
            error: None,
        }
    }

    /// Move to `next`, returning false (and leaving the job untouched) for
    /// an illegal transition.
    pub fn transition(&mut self, next: JobState) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        self.state = next;
        self.updated_at = Utc::now();
        true
    }

    /// Mark the job failed with a reason.
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if self.transition(JobState::Failed) {
            self.error = Some(error.into());
            true
        } else {
            false
        }
    }
}
