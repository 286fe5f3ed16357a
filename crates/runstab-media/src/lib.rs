//! Frame-accurate runner stabilization on top of FFmpeg.
//!
//! This crate provides:
//! - FFprobe metadata with display orientation
//! - Sequential frame decoding over a raw RGBA pipe and encoding over a
//!   timestamped Matroska pipe
//! - The geometric compositor cropping each frame around the runner
//! - The stabilization pipeline with backpressure, progress and cancellation
//! - Low-resolution preview frames for picking anchors

pub mod backend;
pub mod command;
pub mod compositor;
pub mod error;
pub mod frame;
pub mod fs_utils;
pub mod metrics;
mod mkv;
pub mod orientation;
pub mod preview;
pub mod probe;
pub mod progress;
pub mod sink;
pub mod source;
pub mod stabilizer;

pub use backend::{FfmpegBackend, MediaBackend};
pub use command::{FfmpegCommand, FfmpegRunner};
pub use compositor::{Compositor, SampleFilter};
pub use error::{MediaError, MediaResult, StabilizeError};
pub use frame::{DecodedFrame, Timestamp};
pub use orientation::Orientation;
pub use preview::FramePreview;
pub use probe::{probe_media, probe_video, MediaInfo, VideoInfo};
pub use progress::{ProgressEvent, ProgressReceiver, ProgressSender};
pub use sink::{FfmpegFrameSink, FrameSink};
pub use source::{FfmpegFrameSource, FrameSource};
pub use stabilizer::{StabilizeReport, StabilizeRequest, Stabilizer, StabilizerConfig};
