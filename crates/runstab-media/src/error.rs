//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors raised by the FFmpeg/FFprobe adapters and frame buffers.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Output already exists: {0}")]
    OutputExists(PathBuf),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("Decode failed: {0}")]
    DecodeFailed(String),

    #[error("Encode failed: {0}")]
    EncodeFailed(String),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a decode failure error.
    pub fn decode_failed(message: impl Into<String>) -> Self {
        Self::DecodeFailed(message.into())
    }

    /// Create an encode failure error.
    pub fn encode_failed(message: impl Into<String>) -> Self {
        Self::EncodeFailed(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

/// Terminal failure of one stabilization run.
///
/// Exactly one of these is reported per failed run; the caller decides how
/// to present it and whether to start over.
#[derive(Debug, Error)]
pub enum StabilizeError {
    #[error("No video track found in source")]
    NoVideoTrack,

    #[error("Invalid source: {0}")]
    InvalidSource(String),

    #[error("Output already exists: {0}")]
    OutputExists(PathBuf),

    #[error("Reading source failed: {0}")]
    ReadFailed(#[source] MediaError),

    #[error("Writing output failed{}", .0.as_ref().map(|e| format!(": {}", e)).unwrap_or_default())]
    WriteFailed(#[source] Option<MediaError>),

    #[error("Stabilization cancelled")]
    Cancelled,
}

impl StabilizeError {
    /// Create a write failure wrapping the encoder error.
    pub fn write_failed(source: MediaError) -> Self {
        Self::WriteFailed(Some(source))
    }

    /// Check if the run was abandoned rather than failed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StabilizeError::Cancelled)
    }

    /// Check if the encoder or container reported the failure.
    pub fn is_write_failure(&self) -> bool {
        matches!(self, StabilizeError::WriteFailed(_))
    }

    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            StabilizeError::NoVideoTrack => "no_video_track",
            StabilizeError::InvalidSource(_) => "invalid_source",
            StabilizeError::OutputExists(_) => "output_exists",
            StabilizeError::ReadFailed(_) => "read_failed",
            StabilizeError::WriteFailed(_) => "write_failed",
            StabilizeError::Cancelled => "cancelled",
        }
    }
}
