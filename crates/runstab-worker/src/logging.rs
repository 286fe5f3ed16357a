//! Structured job logging.

use runstab_models::JobId;
use tracing::{error, info, warn, Span};

/// Logs a stabilization job's lifecycle with its id attached.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job started: {}", message
        );
    }

    /// Log progress as a whole percentage.
    pub fn log_progress(&self, frames_done: u64, fraction: f64) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            frames_done,
            "Job progress: {:.0}%", fraction * 100.0
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span carrying the job id for everything the run logs.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = %self.operation
        )
    }
}

/// Tracks which 10% progress steps have been logged.
#[derive(Debug, Default)]
pub struct ProgressMilestones {
    last_decile: Option<u32>,
}

impl ProgressMilestones {
    /// Returns true the first time `fraction` reaches a new 10% step.
    pub fn reached(&mut self, fraction: f64) -> bool {
        let decile = (fraction.clamp(0.0, 1.0) * 10.0).floor() as u32;
        if self.last_decile.map_or(true, |last| decile > last) {
            self.last_decile = Some(decile);
            true
        } else {
            false
        }
    }
}
