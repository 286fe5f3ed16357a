//! Two-anchor runner trajectory.
//!
//! The operator marks the runner once near the start of the clip and once
//! near the end. Horizontal position is linearly interpolated between the two
//! anchors and held constant outside them; vertical framing is fixed at the
//! midpoint of the two anchor heights.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::geometry::CropSize;

/// Fraction of the source height covered by the crop window.
pub const CROP_HEIGHT_RATIO: f64 = 0.35;

/// An operator-picked sample of the runner's position.
///
/// Coordinates are in source pixel space, raster convention (origin top-left,
/// Y down), after orientation correction. They are not bounds-checked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnchorPoint {
    /// Frame index the sample was taken on
    pub frame: i64,
    /// Horizontal position in pixels
    pub x: f64,
    /// Vertical position in pixels
    pub y: f64,
}

impl AnchorPoint {
    /// Create a new anchor point.
    pub fn new(frame: i64, x: f64, y: f64) -> Self {
        Self { frame, x, y }
    }
}

impl fmt::Display for AnchorPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.frame, self.x, self.y)
    }
}

/// Error parsing an anchor from its `frame,x,y` text form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnchorParseError {
    #[error("expected `frame,x,y`, got {0:?}")]
    WrongArity(String),

    #[error("invalid frame number {0:?}")]
    InvalidFrame(String),

    #[error("invalid coordinate {0:?}")]
    InvalidCoordinate(String),
}

impl FromStr for AnchorPoint {
    type Err = AnchorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [frame, x, y] = parts.as_slice() else {
            return Err(AnchorParseError::WrongArity(s.to_string()));
        };

        let frame = frame
            .parse::<i64>()
            .map_err(|_| AnchorParseError::InvalidFrame(frame.to_string()))?;
        let parse_coord = |v: &str| {
            v.parse::<f64>()
                .ok()
                .filter(|c| c.is_finite())
                .ok_or_else(|| AnchorParseError::InvalidCoordinate(v.to_string()))
        };

        Ok(Self {
            frame,
            x: parse_coord(x)?,
            y: parse_coord(y)?,
        })
    }
}

/// Immutable runner trajectory built from two anchors.
///
/// `start.frame <= end.frame` is expected but not enforced; a reversed or
/// degenerate pair still yields finite, clamped positions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Trajectory {
    start: AnchorPoint,
    end: AnchorPoint,
    /// Orientation-corrected pixel height of the source video
    source_video_height: f64,
}

impl Trajectory {
    /// Create a trajectory from the two anchors and the oriented source height.
    pub fn new(start: AnchorPoint, end: AnchorPoint, source_video_height: f64) -> Self {
        Self {
            start,
            end,
            source_video_height,
        }
    }

    pub fn start(&self) -> AnchorPoint {
        self.start
    }

    pub fn end(&self) -> AnchorPoint {
        self.end
    }

    pub fn source_video_height(&self) -> f64 {
        self.source_video_height
    }

    /// Horizontal runner position at `frame`, clamped outside the anchors.
    pub fn x(&self, frame: i64) -> f64 {
        // Checked first so start == end never reaches the division.
        if frame <= self.start.frame {
            return self.start.x;
        }
        if frame >= self.end.frame {
            return self.end.x;
        }

        let span = (self.end.frame - self.start.frame) as f64;
        let t = (frame - self.start.frame) as f64 / span;
        self.start.x + (self.end.x - self.start.x) * t
    }

    /// Vertical framing position; the same for every frame.
    pub fn y(&self, _frame: i64) -> f64 {
        (self.start.y + self.end.y) / 2.0
    }

    /// 9:16 crop window sized from the source height.
    pub fn crop_size(&self) -> CropSize {
        let height = self.source_video_height * CROP_HEIGHT_RATIO;
        CropSize {
            width: height * 9.0 / 16.0,
            height,
        }
    }
}
