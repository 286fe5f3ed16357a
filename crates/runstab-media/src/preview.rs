//! Low-resolution frame access for picking anchors.
//!
//! Unlike the pipeline source, preview frames come out of FFmpeg already
//! display-oriented, so coordinates picked on them are in the same space as
//! the trajectory.

use image::RgbaImage;
use runstab_models::encoding::PREVIEW_MAX_EDGE;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner, PIPE_STDOUT};
use crate::error::{MediaError, MediaResult};
use crate::probe::{probe_video, VideoInfo};

/// Seconds allowed for extracting one preview frame.
const PREVIEW_TIMEOUT_SECS: u64 = 30;

/// Scrubbable view of one video.
#[derive(Debug, Clone)]
pub struct FramePreview {
    path: PathBuf,
    info: VideoInfo,
}

impl FramePreview {
    /// Probe `path`; fails with [`MediaError::InvalidVideo`] without a video track.
    pub async fn open(path: impl AsRef<Path>) -> MediaResult<Self> {
        let path = path.as_ref();
        let info = probe_video(path).await?;
        Ok(Self::from_info(path, info))
    }

    pub fn from_info(path: impl Into<PathBuf>, info: VideoInfo) -> Self {
        Self {
            path: path.into(),
            info,
        }
    }

    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    /// Number of addressable frames, `floor(duration * fps)`.
    pub fn frame_count(&self) -> u64 {
        let count = (self.info.duration * self.info.fps).floor();
        if count.is_finite() && count > 0.0 {
            count as u64
        } else {
            0
        }
    }

    /// Orientation-corrected size in pixels.
    pub fn video_size(&self) -> (u32, u32) {
        self.info.oriented_size()
    }

    /// Size of the images returned by [`FramePreview::image_at`].
    pub fn preview_size(&self) -> (u32, u32) {
        fit_within(self.video_size(), PREVIEW_MAX_EDGE)
    }

    /// Oriented, downscaled frame at `frame_index`, within one frame of the
    /// requested position.
    pub async fn image_at(&self, frame_index: u64) -> MediaResult<RgbaImage> {
        let count = self.frame_count();
        if frame_index >= count.max(1) {
            return Err(MediaError::decode_failed(format!(
                "frame {} is past the end ({} frames)",
                frame_index, count
            )));
        }

        let (width, height) = self.preview_size();
        let seconds = frame_index as f64 / self.info.fps;

        let cmd = FfmpegCommand::new(&self.path, PIPE_STDOUT)
            .seek(seconds)
            .first_video_stream()
            .video_filter(format!("scale={}:{}", width, height))
            .single_frame()
            .raw_rgba_output();

        debug!(
            path = %self.path.display(),
            frame = frame_index,
            seconds,
            "Extracting preview frame"
        );

        let bytes = FfmpegRunner::new()
            .with_timeout(PREVIEW_TIMEOUT_SECS)
            .capture_stdout(&cmd)
            .await?;

        let expected = width as usize * height as usize * 4;
        if bytes.len() < expected {
            return Err(MediaError::decode_failed(format!(
                "no picture at frame {} ({} of {} bytes)",
                frame_index,
                bytes.len(),
                expected
            )));
        }

        RgbaImage::from_raw(width, height, bytes[..expected].to_vec())
            .ok_or_else(|| MediaError::decode_failed("preview buffer size mismatch"))
    }
}

/// Scale `size` to fit within `max_edge` x `max_edge`, never enlarging.
pub fn fit_within(size: (u32, u32), max_edge: u32) -> (u32, u32) {
    let (w, h) = size;
    if w == 0 || h == 0 {
        return (w, h);
    }
    let scale = (max_edge as f64 / w as f64)
        .min(max_edge as f64 / h as f64)
        .min(1.0);
    (
        ((w as f64 * scale).round() as u32).max(1),
        ((h as f64 * scale).round() as u32).max(1),
    )
}
