//! Display orientation of decoded frames.
//!
//! Containers store frames in sensor orientation plus a display matrix. An
//! [`Orientation`] is one of the eight axis-aligned rotations/mirrors and maps
//! pixel coordinates between the displayed (oriented) raster and the stored
//! (natural) buffer.

use serde::{Deserialize, Serialize};

/// Axis-aligned display orientation.
///
/// Rotations are clockwise, as applied to the stored frame to display it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Identity,
    Rotate90,
    Rotate180,
    Rotate270,
    /// Mirror left-right
    FlipHorizontal,
    /// Mirror top-bottom
    FlipVertical,
    /// Mirror across the main diagonal
    Transpose,
    /// Mirror across the anti-diagonal
    Transverse,
}

impl Orientation {
    /// Orientation for a clockwise display rotation, optionally mirrored
    /// left-right after rotating. Angles snap to the nearest quarter turn.
    pub fn from_rotation(clockwise_degrees: f64, mirrored: bool) -> Self {
        let quarter_turns = if clockwise_degrees.is_finite() {
            ((clockwise_degrees / 90.0).round() as i64).rem_euclid(4)
        } else {
            0
        };

        match (quarter_turns, mirrored) {
            (0, false) => Orientation::Identity,
            (1, false) => Orientation::Rotate90,
            (2, false) => Orientation::Rotate180,
            (3, false) => Orientation::Rotate270,
            (0, true) => Orientation::FlipHorizontal,
            (1, true) => Orientation::Transpose,
            (2, true) => Orientation::FlipVertical,
            _ => Orientation::Transverse,
        }
    }

    /// Whether the displayed raster swaps width and height.
    pub fn swaps_axes(&self) -> bool {
        matches!(
            self,
            Orientation::Rotate90
                | Orientation::Rotate270
                | Orientation::Transpose
                | Orientation::Transverse
        )
    }

    /// Displayed size of a stored frame of `natural` size.
    pub fn oriented_size(&self, natural: (u32, u32)) -> (u32, u32) {
        let (w, h) = natural;
        if self.swaps_axes() {
            (h, w)
        } else {
            (w, h)
        }
    }

    /// Map an integer pixel of the displayed raster back to the stored buffer.
    ///
    /// `natural` is the stored buffer size; `(x, y)` must lie inside the
    /// oriented size.
    #[inline]
    pub fn to_natural(&self, x: u32, y: u32, natural: (u32, u32)) -> (u32, u32) {
        let (w, h) = natural;
        match self {
            Orientation::Identity => (x, y),
            Orientation::Rotate90 => (y, h - 1 - x),
            Orientation::Rotate180 => (w - 1 - x, h - 1 - y),
            Orientation::Rotate270 => (w - 1 - y, x),
            Orientation::FlipHorizontal => (w - 1 - x, y),
            Orientation::FlipVertical => (x, h - 1 - y),
            Orientation::Transpose => (y, x),
            Orientation::Transverse => (w - 1 - y, h - 1 - x),
        }
    }
}

/// Parse FFprobe's textual display matrix and report whether it mirrors.
///
/// The text is three rows of `index: a b u` style values; only the 2x2
/// linear part matters here.
pub(crate) fn display_matrix_is_mirrored(matrix: &str) -> Option<bool> {
    let rows: Vec<Vec<f64>> = matrix
        .lines()
        .filter_map(|line| line.split_once(':').map(|(_, values)| values))
        .map(|values| {
            values
                .split_whitespace()
                .filter_map(|v| v.parse::<f64>().ok())
                .collect()
        })
        .collect();

    let (a, b) = (*rows.first()?.first()?, *rows.first()?.get(1)?);
    let (c, d) = (*rows.get(1)?.first()?, *rows.get(1)?.get(1)?);
    Some(a * d - b * c < 0.0)
}
