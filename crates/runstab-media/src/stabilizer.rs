//! Stabilization pipeline.
//!
//! One run pulls frames from a [`FrameSource`], composites each around the
//! runner trajectory and pushes it into a [`FrameSink`], strictly one frame
//! at a time. The only suspension per frame is the wait for encoder
//! readiness; compositing itself runs on the blocking pool so the runtime
//! stays free for other runs.

use image::Rgba;
use runstab_models::{CanvasSize, EncodingConfig, Trajectory};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::backend::{FfmpegBackend, MediaBackend};
use crate::compositor::{Compositor, SampleFilter, DEFAULT_PADDING};
use crate::error::{MediaError, StabilizeError};
use crate::metrics::{record_composite, record_run, record_skipped};
use crate::orientation::Orientation;
use crate::progress::ProgressSender;
use crate::sink::{FrameSink, DEFAULT_QUEUE_DEPTH};
use crate::source::FrameSource;

/// Settings shared by every run of a [`Stabilizer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilizerConfig {
    /// Output canvas size
    pub canvas: CanvasSize,
    /// Encoder parameters
    pub encoding: EncodingConfig,
    /// Frames buffered between compositor and encoder
    pub sink_queue_depth: usize,
    /// Resampling filter
    pub sample_filter: SampleFilter,
    /// Colour for canvas areas outside the source frame
    pub padding: [u8; 4],
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            canvas: CanvasSize::default(),
            encoding: EncodingConfig::default(),
            sink_queue_depth: DEFAULT_QUEUE_DEPTH,
            sample_filter: SampleFilter::default(),
            padding: DEFAULT_PADDING.0,
        }
    }
}

/// Inputs of a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilizeRequest {
    pub source: PathBuf,
    pub output: PathBuf,
    pub trajectory: Trajectory,
}

impl StabilizeRequest {
    pub fn new(source: impl Into<PathBuf>, output: impl Into<PathBuf>, trajectory: Trajectory) -> Self {
        Self {
            source: source.into(),
            output: output.into(),
            trajectory,
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilizeReport {
    /// Samples pulled from the source
    pub frames_decoded: u64,
    /// Frames handed to the encoder
    pub frames_written: u64,
    /// Samples without a picture
    pub frames_skipped: u64,
    /// Up-front estimate used for progress
    pub total_frames_estimate: u64,
    /// Orientation-corrected source size
    pub source_size: (u32, u32),
    pub output: PathBuf,
}

/// How the frame loop ended.
struct LoopOutcome {
    frames_decoded: u64,
    frames_written: u64,
    frames_skipped: u64,
    cancelled: bool,
}

/// Runs stabilization jobs against a media backend.
///
/// Each call to [`Stabilizer::stabilize`] opens its own decoder, encoder
/// and compositor; nothing mutable is shared between runs.
#[derive(Debug, Clone)]
pub struct Stabilizer<B = FfmpegBackend> {
    backend: B,
    config: StabilizerConfig,
}

impl Stabilizer<FfmpegBackend> {
    /// Stabilizer backed by the FFmpeg binaries.
    pub fn new(config: StabilizerConfig) -> Self {
        Self::with_backend(FfmpegBackend, config)
    }
}

impl<B: MediaBackend> Stabilizer<B> {
    pub fn with_backend(backend: B, config: StabilizerConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &StabilizerConfig {
        &self.config
    }

    /// Run on a background task.
    pub fn spawn(
        self,
        request: StabilizeRequest,
        progress: ProgressSender,
        cancel: watch::Receiver<bool>,
    ) -> JoinHandle<Result<StabilizeReport, StabilizeError>>
    where
        B: 'static,
    {
        tokio::spawn(async move { self.stabilize(&request, &progress, &cancel).await })
    }

    /// Stabilize `request.source` into `request.output`.
    ///
    /// `request.output` must not exist. Setting `cancel` to `true` abandons
    /// the run after the current frame; the partial file is finalized and
    /// [`StabilizeError::Cancelled`] is returned.
    pub async fn stabilize(
        &self,
        request: &StabilizeRequest,
        progress: &ProgressSender,
        cancel: &watch::Receiver<bool>,
    ) -> Result<StabilizeReport, StabilizeError> {
        let started = Instant::now();
        let result = self.run(request, progress, cancel).await;

        match &result {
            Ok(report) => {
                record_run("ok");
                progress.complete(report.frames_written);
                info!(
                    output = %report.output.display(),
                    frames = report.frames_written,
                    skipped = report.frames_skipped,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Stabilization complete"
                );
            }
            Err(StabilizeError::Cancelled) => {
                record_run("cancelled");
                progress.cancelled();
                info!(output = %request.output.display(), "Stabilization cancelled");
            }
            Err(e) => {
                record_run(e.kind());
                progress.failed(e.to_string());
                warn!(
                    source = %request.source.display(),
                    kind = e.kind(),
                    "Stabilization failed: {}",
                    e
                );
            }
        }

        result
    }

    async fn run(
        &self,
        request: &StabilizeRequest,
        progress: &ProgressSender,
        cancel: &watch::Receiver<bool>,
    ) -> Result<StabilizeReport, StabilizeError> {
        let info = self
            .backend
            .probe(&request.source)
            .await
            .map_err(StabilizeError::ReadFailed)?;
        let video = info.video.ok_or(StabilizeError::NoVideoTrack)?;

        if video.width == 0 || video.height == 0 {
            return Err(StabilizeError::InvalidSource(format!(
                "video track is {}x{}",
                video.width, video.height
            )));
        }
        if !(video.fps.is_finite() && video.fps > 0.0) {
            return Err(StabilizeError::InvalidSource(format!(
                "frame rate {} is not positive",
                video.fps
            )));
        }
        if request.output.exists() {
            return Err(StabilizeError::OutputExists(request.output.clone()));
        }

        let source_size = video.oriented_size();
        let total_frames = video.estimated_frames();

        let mut source = self
            .backend
            .open_source(&request.source, &video)
            .await
            .map_err(StabilizeError::ReadFailed)?;

        let (frame_size, orientation) = if source.delivers_oriented_frames() {
            (source_size, Orientation::Identity)
        } else {
            (video.natural_size(), video.orientation)
        };

        let compositor = match Compositor::new(
            request.trajectory,
            frame_size,
            orientation,
            self.config.canvas,
        ) {
            Ok(c) => Arc::new(
                c.with_filter(self.config.sample_filter)
                    .with_padding(Rgba(self.config.padding)),
            ),
            Err(e) => {
                close_source(source.as_mut()).await;
                return Err(StabilizeError::InvalidSource(e.to_string()));
            }
        };

        let mut sink = match self
            .backend
            .open_sink(
                &request.output,
                self.config.canvas,
                video.fps,
                &self.config.encoding,
                self.config.sink_queue_depth,
            )
            .await
        {
            Ok(sink) => sink,
            Err(e) => {
                close_source(source.as_mut()).await;
                return Err(match e {
                    MediaError::OutputExists(path) => StabilizeError::OutputExists(path),
                    other => StabilizeError::write_failed(other),
                });
            }
        };

        info!(
            source = %request.source.display(),
            output = %request.output.display(),
            source_size = format!("{}x{}", source_size.0, source_size.1),
            orientation = ?video.orientation,
            fps = video.fps,
            total_frames,
            crop = %compositor.crop_rect(0),
            "Stabilization started"
        );
        progress.started(total_frames);

        let outcome = frame_loop(
            source.as_mut(),
            sink.as_mut(),
            &compositor,
            total_frames,
            progress,
            cancel,
        )
        .await;
        close_source(source.as_mut()).await;

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                let encoder_failure = sink.abort().await;
                return Err(match (e, encoder_failure) {
                    (StabilizeError::WriteFailed(_), Some(cause)) => {
                        StabilizeError::write_failed(cause)
                    }
                    (e, _) => e,
                });
            }
        };

        if outcome.cancelled {
            if let Err(e) = sink.finalize().await {
                warn!("Finalizing partial output after cancellation failed: {}", e);
            }
            return Err(StabilizeError::Cancelled);
        }

        progress.finalizing();
        sink.finalize().await.map_err(StabilizeError::write_failed)?;

        Ok(StabilizeReport {
            frames_decoded: outcome.frames_decoded,
            frames_written: outcome.frames_written,
            frames_skipped: outcome.frames_skipped,
            total_frames_estimate: total_frames,
            source_size,
            output: request.output.clone(),
        })
    }
}

/// Pull, composite and push until the source is exhausted.
async fn frame_loop(
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    compositor: &Arc<Compositor>,
    total_frames: u64,
    progress: &ProgressSender,
    cancel: &watch::Receiver<bool>,
) -> Result<LoopOutcome, StabilizeError> {
    let mut outcome = LoopOutcome {
        frames_decoded: 0,
        frames_written: 0,
        frames_skipped: 0,
        cancelled: false,
    };
    let mut frame_index: u64 = 0;

    loop {
        let Some(decoded) = source
            .decode_next()
            .await
            .map_err(StabilizeError::ReadFailed)?
        else {
            break;
        };
        outcome.frames_decoded += 1;

        let cancelled = *cancel.borrow();
        if cancelled {
            debug!(frame = frame_index, "Cancellation observed");
            outcome.cancelled = true;
            break;
        }

        match decoded.image {
            Some(image) => {
                let compositor = Arc::clone(compositor);
                let index = frame_index;
                let started = Instant::now();
                let canvas = tokio::task::spawn_blocking(move || compositor.composite(&image, index))
                    .await
                    .map_err(|e| {
                        StabilizeError::ReadFailed(MediaError::internal(format!(
                            "compositing task failed: {}",
                            e
                        )))
                    })?
                    .map_err(StabilizeError::ReadFailed)?;
                record_composite(started.elapsed().as_secs_f64());

                sink.ready().await.map_err(StabilizeError::write_failed)?;
                sink.append(canvas, decoded.pts)
                    .map_err(StabilizeError::write_failed)?;
                outcome.frames_written += 1;
                trace!(frame = frame_index, pts = %decoded.pts, "Frame written");
            }
            None => {
                record_skipped();
                outcome.frames_skipped += 1;
                debug!(frame = frame_index, "Sample has no picture, skipping");
            }
        }

        frame_index += 1;
        progress.frame(frame_index, total_frames);
    }

    Ok(outcome)
}

async fn close_source(source: &mut dyn FrameSource) {
    if let Err(e) = source.close().await {
        warn!("Closing frame source failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StabilizerConfig::default();
        assert_eq!(config.canvas, CanvasSize::new(1080, 1920));
        assert_eq!(config.sink_queue_depth, DEFAULT_QUEUE_DEPTH);
        assert_eq!(config.sample_filter, SampleFilter::Bilinear);
        assert_eq!(config.padding, [0, 0, 0, 255]);
    }
}
