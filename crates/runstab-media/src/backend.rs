//! Media backends: where probing, decoding and encoding come from.

use async_trait::async_trait;
use runstab_models::{CanvasSize, EncodingConfig};
use std::path::Path;

use crate::error::MediaResult;
use crate::probe::{probe_media, MediaInfo, VideoInfo};
use crate::sink::{FfmpegFrameSink, FrameSink};
use crate::source::{FfmpegFrameSource, FrameSource};

/// Opens the collaborators of one stabilization run.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Describe the tracks of `path`.
    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo>;

    /// Start decoding the video track described by `video`.
    async fn open_source(&self, path: &Path, video: &VideoInfo) -> MediaResult<Box<dyn FrameSource>>;

    /// Start an encoder writing `output`. Must fail if `output` exists.
    async fn open_sink(
        &self,
        output: &Path,
        canvas: CanvasSize,
        fps: f64,
        encoding: &EncodingConfig,
        queue_depth: usize,
    ) -> MediaResult<Box<dyn FrameSink>>;
}

/// Backend driving the `ffmpeg` and `ffprobe` binaries.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegBackend;

#[async_trait]
impl MediaBackend for FfmpegBackend {
    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo> {
        probe_media(path).await
    }

    async fn open_source(&self, path: &Path, video: &VideoInfo) -> MediaResult<Box<dyn FrameSource>> {
        Ok(Box::new(FfmpegFrameSource::open(path, video)?))
    }

    async fn open_sink(
        &self,
        output: &Path,
        canvas: CanvasSize,
        fps: f64,
        encoding: &EncodingConfig,
        queue_depth: usize,
    ) -> MediaResult<Box<dyn FrameSink>> {
        Ok(Box::new(FfmpegFrameSink::open(
            output,
            canvas,
            fps,
            encoding,
            queue_depth,
        )?))
    }
}
