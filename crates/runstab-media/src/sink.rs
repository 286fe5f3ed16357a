//! Sequential frame encoding.
//!
//! [`FfmpegFrameSink`] feeds RGBA canvases to an FFmpeg child through a
//! bounded queue. The queue depth is the backpressure signal: the producer
//! awaits [`FrameSink::ready`] before every append and is parked while the
//! encoder catches up. Frames travel as a Matroska stream so each one keeps
//! its presentation timestamp.

use async_trait::async_trait;
use image::RgbaImage;
use runstab_models::{CanvasSize, EncodingConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::command::{collect_stderr, FfmpegCommand, PIPE_STDIN};
use crate::error::{MediaError, MediaResult};
use crate::frame::Timestamp;
use crate::mkv::{self, TickClock};

/// Default number of frames buffered between compositor and encoder.
pub const DEFAULT_QUEUE_DEPTH: usize = 4;

/// How long an encoder that stopped reading gets to exit before it is killed.
const EXIT_GRACE: Duration = Duration::from_secs(5);

/// Sequential encoder writing one video track.
#[async_trait]
pub trait FrameSink: Send {
    /// Whether an append would be accepted right now.
    fn is_ready_for_more_data(&self) -> bool;

    /// Wait until the sink can accept another frame.
    async fn ready(&mut self) -> MediaResult<()>;

    /// Append one frame. Timestamps must be strictly increasing.
    fn append(&mut self, frame: RgbaImage, pts: Timestamp) -> MediaResult<()>;

    /// Mark the input finished and wait for the container to be complete.
    async fn finalize(&mut self) -> MediaResult<()>;

    /// Stop encoding and release resources without completing the file.
    ///
    /// Returns the encoder's own failure when it had already stopped.
    async fn abort(&mut self) -> Option<MediaError> {
        None
    }
}

/// Frame sink encoding through an FFmpeg child process.
pub struct FfmpegFrameSink {
    output: PathBuf,
    canvas: CanvasSize,
    tx: Option<mpsc::Sender<(RgbaImage, u64)>>,
    writer: Option<JoinHandle<std::io::Result<u64>>>,
    child: Child,
    stderr: Option<JoinHandle<String>>,
    clock: TickClock,
    last_pts: Option<Timestamp>,
    appended: u64,
    exited: bool,
}

impl FfmpegFrameSink {
    /// Start an encoder writing `output`.
    ///
    /// Refuses to touch a file that already exists.
    pub fn open(
        output: &Path,
        canvas: CanvasSize,
        fps: f64,
        encoding: &EncodingConfig,
        queue_depth: usize,
    ) -> MediaResult<Self> {
        if output.exists() {
            return Err(MediaError::OutputExists(output.to_path_buf()));
        }
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let cmd = FfmpegCommand::new(PIPE_STDIN, output)
            .matroska_input()
            .passthrough_timing()
            .output_args(encoding.to_ffmpeg_args())
            .overwrite(false);

        let sink = Self::from_child(cmd.spawn()?, output, canvas, fps, queue_depth)?;

        info!(
            output = %output.display(),
            canvas = %canvas,
            codec = %encoding.codec,
            bitrate = %encoding.bitrate,
            "Opened frame sink"
        );
        Ok(sink)
    }

    /// Stream frames into an already running encoder's stdin.
    pub(crate) fn from_child(
        mut child: Child,
        output: &Path,
        canvas: CanvasSize,
        fps: f64,
        queue_depth: usize,
    ) -> MediaResult<Self> {
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| MediaError::internal("ffmpeg stdin not captured"))?;
        let stderr = collect_stderr(&mut child);

        let header = mkv::stream_header(canvas.width, canvas.height, fps);
        let (tx, mut rx) = mpsc::channel::<(RgbaImage, u64)>(queue_depth.max(1));
        let writer = tokio::spawn(async move {
            stdin.write_all(&header).await?;
            let mut written = 0u64;
            while let Some((frame, ticks)) = rx.recv().await {
                let pixels = frame.as_raw();
                stdin
                    .write_all(&mkv::frame_prefix(ticks, pixels.len()))
                    .await?;
                stdin.write_all(pixels).await?;
                written += 1;
            }
            stdin.shutdown().await?;
            Ok(written)
        });

        Ok(Self {
            output: output.to_path_buf(),
            canvas,
            tx: Some(tx),
            writer: Some(writer),
            child,
            stderr: Some(stderr),
            clock: TickClock::default(),
            last_pts: None,
            appended: 0,
            exited: false,
        })
    }

    fn closed_error(&self) -> MediaError {
        MediaError::encode_failed(format!(
            "encoder for {} stopped accepting frames",
            self.output.display()
        ))
    }

    async fn take_stderr(&mut self) -> String {
        match self.stderr.take() {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        }
    }

    /// Collect the exit status and stderr of an encoder whose queue closed.
    /// Only the first call reports the failure.
    async fn exit_failure(&mut self) -> Option<MediaError> {
        if self.exited {
            return None;
        }
        self.exited = true;
        self.tx = None;
        if let Some(handle) = self.writer.take() {
            if let Ok(Err(e)) = handle.await {
                debug!("Encoder pipe closed: {}", e);
            }
        }

        let status = match tokio::time::timeout(EXIT_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                warn!("Failed to wait for encoder: {}", e);
                return None;
            }
            Err(_) => {
                warn!(
                    "Encoder for {} stopped reading but did not exit, killing it",
                    self.output.display()
                );
                let _ = self.child.kill().await;
                return None;
            }
        };

        let stderr = self.take_stderr().await;
        if status.success() {
            return None;
        }
        Some(MediaError::ffmpeg_failed(
            "FFmpeg encoder exited with non-zero status",
            Some(stderr),
            status.code(),
        ))
    }
}

#[async_trait]
impl FrameSink for FfmpegFrameSink {
    fn is_ready_for_more_data(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| tx.capacity() > 0)
    }

    async fn ready(&mut self) -> MediaResult<()> {
        // Reserving and releasing a slot parks us until the writer drains one.
        let accepting = match self.tx.as_ref() {
            Some(tx) => tx.reserve().await.is_ok(),
            None => false,
        };
        if accepting {
            return Ok(());
        }
        match self.exit_failure().await {
            Some(e) => Err(e),
            None => Err(self.closed_error()),
        }
    }

    fn append(&mut self, frame: RgbaImage, pts: Timestamp) -> MediaResult<()> {
        if frame.dimensions() != (self.canvas.width, self.canvas.height) {
            return Err(MediaError::encode_failed(format!(
                "frame is {}x{}, encoder expects {}",
                frame.width(),
                frame.height(),
                self.canvas
            )));
        }
        if let Some(last) = self.last_pts {
            if pts <= last {
                return Err(MediaError::encode_failed(format!(
                    "timestamp {} does not follow {}",
                    pts, last
                )));
            }
        }

        let Some(tx) = self.tx.as_ref() else {
            return Err(self.closed_error());
        };
        let permit = match tx.try_reserve() {
            Ok(permit) => permit,
            Err(mpsc::error::TrySendError::Full(())) => {
                return Err(MediaError::encode_failed(
                    "append called while the encoder was not ready",
                ))
            }
            Err(mpsc::error::TrySendError::Closed(())) => return Err(self.closed_error()),
        };
        permit.send((frame, self.clock.ticks(pts)));
        self.last_pts = Some(pts);
        self.appended += 1;
        Ok(())
    }

    async fn finalize(&mut self) -> MediaResult<()> {
        // Closing the queue lets the writer drain and close stdin.
        self.tx = None;

        let written = match self.writer.take() {
            Some(handle) => handle
                .await
                .map_err(|e| MediaError::internal(format!("encoder writer task failed: {}", e)))?,
            None => return Err(self.closed_error()),
        };

        let status = self.child.wait().await?;
        let stderr = self.take_stderr().await;

        if !status.success() {
            return Err(MediaError::ffmpeg_failed(
                "FFmpeg encoder exited with non-zero status",
                Some(stderr),
                status.code(),
            ));
        }

        let written = written.map_err(|e| {
            MediaError::encode_failed(format!("writing frames to encoder failed: {}", e))
        })?;
        if written != self.appended {
            return Err(MediaError::encode_failed(format!(
                "encoder received {} of {} frames",
                written, self.appended
            )));
        }

        debug!(
            output = %self.output.display(),
            frames = written,
            "Frame sink finalized"
        );
        Ok(())
    }

    async fn abort(&mut self) -> Option<MediaError> {
        if self.tx.as_ref().map_or(true, |tx| tx.is_closed()) {
            return self.exit_failure().await;
        }

        self.tx = None;
        if let Some(handle) = self.writer.take() {
            handle.abort();
        }
        if let Err(e) = self.child.kill().await {
            warn!("Failed to stop encoder for {}: {}", self.output.display(), e);
        }
        if let Some(handle) = self.stderr.take() {
            handle.abort();
        }
        None
    }
}
