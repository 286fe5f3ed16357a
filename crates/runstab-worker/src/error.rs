//! Worker error types.

use runstab_media::{MediaError, StabilizeError};
use std::path::PathBuf;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Persistence collaborator failure.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Saving {path} to the library failed: {source}")]
    SaveFailed {
        path: PathBuf,
        #[source]
        source: MediaError,
    },

    #[error("Library directory unavailable: {0}")]
    Unavailable(PathBuf),
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error(transparent)]
    Stabilize(#[from] StabilizeError),

    #[error("Save failed: {0}")]
    SaveFailed(#[from] LibraryError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn invalid_arguments(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    /// Check if the run was cancelled by the operator.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WorkerError::Stabilize(e) if e.is_cancelled())
    }

    /// Check if only the library step failed; the output file is intact.
    pub fn is_save_failure(&self) -> bool {
        matches!(self, WorkerError::SaveFailed(_))
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            _ if self.is_cancelled() => 130,
            WorkerError::InvalidArguments(_) => 2,
            WorkerError::SaveFailed(_) => 3,
            _ => 1,
        }
    }
}
