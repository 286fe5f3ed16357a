//! Decoded frames and presentation timestamps.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Presentation timestamp in seconds, as reported by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(f64);

impl Timestamp {
    pub fn from_seconds(seconds: f64) -> Self {
        Self(seconds)
    }

    /// Nominal timestamp of frame `index` at a constant `fps`.
    pub fn from_frame(index: u64, fps: f64) -> Self {
        if fps > 0.0 {
            Self(index as f64 / fps)
        } else {
            Self(0.0)
        }
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}s", self.0)
    }
}

/// One sample pulled from a frame source.
///
/// `image` is `None` when the decoder produced no picture for the sample;
/// the frame index still advances for it.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub image: Option<RgbaImage>,
    pub pts: Timestamp,
}

impl DecodedFrame {
    pub fn new(image: RgbaImage, pts: Timestamp) -> Self {
        Self {
            image: Some(image),
            pts,
        }
    }

    /// A sample without a picture.
    pub fn empty(pts: Timestamp) -> Self {
        Self { image: None, pts }
    }
}
