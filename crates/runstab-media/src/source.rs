//! Sequential frame decoding.
//!
//! [`FfmpegFrameSource`] runs two child processes against the source file:
//! FFmpeg writing raw RGBA frames to a pipe, and FFprobe listing the
//! presentation timestamp of every decoded frame. Both are consumed strictly
//! in step, one frame at a time, so memory stays bounded to a single frame.

use async_trait::async_trait;
use image::RgbaImage;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::command::{check_ffprobe, collect_stderr, FfmpegCommand, PIPE_STDOUT};
use crate::error::{MediaError, MediaResult};
use crate::frame::{DecodedFrame, Timestamp};
use crate::probe::VideoInfo;

/// Sequential decoder of one video track.
#[async_trait]
pub trait FrameSource: Send {
    /// Whether frames arrive already display-oriented. When false the
    /// consumer applies the track's orientation itself.
    fn delivers_oriented_frames(&self) -> bool;

    /// Decode the next frame in presentation order; `None` once exhausted.
    async fn decode_next(&mut self) -> MediaResult<Option<DecodedFrame>>;

    /// Release decoder resources. Safe to call more than once.
    async fn close(&mut self) -> MediaResult<()> {
        Ok(())
    }
}

/// FFprobe child listing one timestamp per decoded frame.
struct TimestampStream {
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
}

impl TimestampStream {
    fn spawn(path: &Path) -> MediaResult<Self> {
        check_ffprobe()?;

        let mut child = Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "frame=best_effort_timestamp_time",
                "-of",
                "csv=p=0",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("ffprobe stdout not captured"))?;

        Ok(Self {
            child,
            lines: BufReader::new(stdout).lines(),
        })
    }

    /// Next frame timestamp; `None` when unavailable for this frame.
    async fn next(&mut self) -> Option<f64> {
        loop {
            match self.lines.next_line().await {
                Ok(Some(line)) => {
                    let value = line.split(',').next().unwrap_or("").trim();
                    if value.is_empty() {
                        continue;
                    }
                    return value.parse::<f64>().ok();
                }
                _ => return None,
            }
        }
    }
}

/// Keeps delivered timestamps strictly increasing.
///
/// A frame without a usable reported timestamp, or one that does not move
/// past the previous frame, is placed one nominal interval after the
/// previous frame.
#[derive(Debug, Clone, Copy)]
struct TimestampClock {
    interval: f64,
    last: Option<f64>,
}

impl TimestampClock {
    fn new(fps: f64) -> Self {
        let fps = if fps.is_finite() && fps > 0.0 { fps } else { 30.0 };
        Self {
            interval: 1.0 / fps,
            last: None,
        }
    }

    fn next(&mut self, reported: Option<f64>) -> Timestamp {
        let reported = reported.filter(|t| t.is_finite());
        let seconds = match (self.last, reported) {
            (Some(last), Some(t)) if t > last => t,
            (Some(last), _) => last + self.interval,
            (None, Some(t)) => t,
            (None, None) => 0.0,
        };
        self.last = Some(seconds);
        Timestamp::from_seconds(seconds)
    }
}

/// Frame source decoding through an FFmpeg child process.
pub struct FfmpegFrameSource {
    child: Child,
    stdout: Option<ChildStdout>,
    stderr: Option<JoinHandle<String>>,
    timestamps: Option<TimestampStream>,
    clock: TimestampClock,
    width: u32,
    height: u32,
    index: u64,
    finished: bool,
}

impl FfmpegFrameSource {
    /// Start decoding the first video track of `path`.
    ///
    /// Frames are delivered in stored orientation (`-noautorotate`).
    pub fn open(path: &Path, video: &VideoInfo) -> MediaResult<Self> {
        if video.width == 0 || video.height == 0 {
            return Err(MediaError::InvalidVideo(format!(
                "video track has no dimensions ({}x{})",
                video.width, video.height
            )));
        }

        let cmd = FfmpegCommand::new(path, PIPE_STDOUT)
            .no_autorotate()
            .first_video_stream()
            .raw_rgba_output();

        let mut child = cmd.spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("ffmpeg stdout not captured"))?;
        let stderr = collect_stderr(&mut child);

        let timestamps = match TimestampStream::spawn(path) {
            Ok(stream) => Some(stream),
            Err(e) => {
                warn!("Frame timestamps unavailable, using nominal rate: {}", e);
                None
            }
        };

        debug!(
            path = %path.display(),
            size = format!("{}x{}", video.width, video.height),
            fps = video.fps,
            "Opened frame source"
        );

        Ok(Self {
            child,
            stdout: Some(stdout),
            stderr: Some(stderr),
            timestamps,
            clock: TimestampClock::new(video.fps),
            width: video.width,
            height: video.height,
            index: 0,
            finished: false,
        })
    }

    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    async fn next_timestamp(&mut self) -> Timestamp {
        let reported = match self.timestamps.as_mut() {
            Some(stream) => stream.next().await,
            None => None,
        };
        self.clock.next(reported)
    }

    /// Check FFmpeg's exit status once the pipe is drained.
    async fn finish(&mut self) -> MediaResult<()> {
        self.finished = true;
        self.stdout = None;
        let status = self.child.wait().await?;
        let stderr = match self.stderr.take() {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };

        if status.success() {
            debug!(frames = self.index, "Frame source exhausted");
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg decoder exited with non-zero status",
                Some(stderr),
                status.code(),
            ))
        }
    }
}

#[async_trait]
impl FrameSource for FfmpegFrameSource {
    fn delivers_oriented_frames(&self) -> bool {
        false
    }

    async fn decode_next(&mut self) -> MediaResult<Option<DecodedFrame>> {
        if self.finished {
            return Ok(None);
        }

        let frame_len = self.frame_len();
        let mut buf = vec![0u8; frame_len];
        let read = match self.stdout.as_mut() {
            Some(stdout) => read_full(stdout, &mut buf).await?,
            None => 0,
        };

        if read == 0 {
            self.finish().await?;
            return Ok(None);
        }
        if read < frame_len {
            self.finish().await?;
            return Err(MediaError::decode_failed(format!(
                "truncated frame {}: got {} of {} bytes",
                self.index, read, frame_len
            )));
        }

        let pts = self.next_timestamp().await;
        let image = RgbaImage::from_raw(self.width, self.height, buf)
            .ok_or_else(|| MediaError::decode_failed("frame buffer size mismatch"))?;
        self.index += 1;

        Ok(Some(DecodedFrame::new(image, pts)))
    }

    async fn close(&mut self) -> MediaResult<()> {
        self.stdout = None;
        if !self.finished {
            self.finished = true;
            let _ = self.child.kill().await;
        }
        if let Some(mut stream) = self.timestamps.take() {
            let _ = stream.child.kill().await;
        }
        if let Some(handle) = self.stderr.take() {
            handle.abort();
        }
        Ok(())
    }
}

/// Fill `buf` from `reader`, returning the bytes read; short only at EOF.
async fn read_full<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
