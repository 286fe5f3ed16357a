//! Crop and canvas geometry in raster convention (origin top-left, Y down).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Output canvas every composited frame is rescaled into (9:16 portrait).
pub const OUTPUT_CANVAS: CanvasSize = CanvasSize {
    width: 1080,
    height: 1920,
};

/// Pixel dimensions of an output canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Bytes in one tightly packed RGBA frame of this size.
    pub fn rgba_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

impl Default for CanvasSize {
    fn default() -> Self {
        OUTPUT_CANVAS
    }
}

impl fmt::Display for CanvasSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Size of the crop window in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CropSize {
    pub width: f64,
    pub height: f64,
}

/// Crop window in source pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CropRect {
    /// Left edge x-coordinate
    pub x: f64,
    /// Top edge y-coordinate
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CropRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Crop window centred on `(cx, cy)`, kept inside a `frame_width` x
    /// `frame_height` frame.
    ///
    /// When the window is larger than the frame on an axis the clamp range
    /// would be inverted; the origin is pinned to 0 on that axis instead and
    /// the window overhangs the far edge.
    pub fn centered_within(
        cx: f64,
        cy: f64,
        size: CropSize,
        frame_width: f64,
        frame_height: f64,
    ) -> Self {
        Self {
            x: clamp_origin(cx - size.width / 2.0, frame_width - size.width),
            y: clamp_origin(cy - size.height / 2.0, frame_height - size.height),
            width: size.width,
            height: size.height,
        }
    }

    /// Center x-coordinate.
    #[inline]
    pub fn cx(&self) -> f64 {
        self.x + self.width / 2.0
    }

    /// Center y-coordinate.
    #[inline]
    pub fn cy(&self) -> f64 {
        self.y + self.height / 2.0
    }

    /// Right edge x-coordinate.
    #[inline]
    pub fn x2(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge y-coordinate.
    #[inline]
    pub fn y2(&self) -> f64 {
        self.y + self.height
    }

    /// Per-axis scale factors mapping this window onto `canvas`.
    pub fn scale_to(&self, canvas: CanvasSize) -> (f64, f64) {
        (
            canvas.width as f64 / self.width,
            canvas.height as f64 / self.height,
        )
    }
}

impl fmt::Display for CropRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.1}x{:.1}+{:.1}+{:.1}",
            self.width, self.height, self.x, self.y
        )
    }
}

/// Clamp an origin to `[0, upper]`, pinning to 0 when `upper < 0` or the
/// input is NaN.
fn clamp_origin(origin: f64, upper: f64) -> f64 {
    if !(upper > 0.0) {
        return 0.0;
    }
    if !(origin > 0.0) {
        return 0.0;
    }
    origin.min(upper)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZE: CropSize = CropSize {
        width: 212.625,
        height: 378.0,
    };

    #[test]
    fn test_centered_inside_frame() {
        let rect = CropRect::centered_within(960.0, 540.0, SIZE, 1920.0, 1080.0);
        assert!((rect.cx() - 960.0).abs() < 1e-9);
        assert!((rect.cy() - 540.0).abs() < 1e-9);
    }

    #[test]
    fn test_clamped_at_edges() {
        let left = CropRect::centered_within(10.0, 540.0, SIZE, 1920.0, 1080.0);
        assert_eq!(left.x, 0.0);

        let right = CropRect::centered_within(1915.0, 1079.0, SIZE, 1920.0, 1080.0);
        assert!((right.x2() - 1920.0).abs() < 1e-9);
        assert!((right.y2() - 1080.0).abs() < 1e-9);
    }

    #[test]
    fn test_oversized_crop_pins_to_zero() {
        let size = CropSize {
            width: 450.0,
            height: 800.0,
        };
        for cx in [-100.0, 0.0, 200.0, 399.0, 5000.0] {
            let rect = CropRect::centered_within(cx, 300.0, size, 400.0, 600.0);
            assert_eq!(rect.x, 0.0);
            assert_eq!(rect.y, 0.0);
        }
    }

    #[test]
    fn test_origin_always_in_range() {
        let size = CropSize {
            width: 450.0,
            height: 378.0,
        };
        for src_width in [300.0, 400.0, 450.0, 451.0, 1920.0] {
            for cx in [-1e6, -1.0, 0.0, 225.0, 1000.0, 1e6] {
                let rect = CropRect::centered_within(cx, 0.0, size, src_width, 1080.0);
                let upper = (src_width - size.width).max(0.0);
                assert!(rect.x >= 0.0 && rect.x <= upper, "x={} upper={}", rect.x, upper);
            }
        }
    }

    #[test]
    fn test_nan_center_pins_to_zero() {
        let rect = CropRect::centered_within(f64::NAN, f64::NAN, SIZE, 1920.0, 1080.0);
        assert_eq!(rect.x, 0.0);
        assert_eq!(rect.y, 0.0);
    }

    #[test]
    fn test_scale_to_canvas() {
        let rect = CropRect::new(0.0, 0.0, 212.625, 378.0);
        let (sx, sy) = rect.scale_to(OUTPUT_CANVAS);
        assert!((sx - 1080.0 / 212.625).abs() < 1e-9);
        assert!((sy - 1920.0 / 378.0).abs() < 1e-9);
        assert!((sx - sy).abs() < 1e-9, "9:16 crop scales uniformly");
    }

    #[test]
    fn test_canvas_rgba_len() {
        assert_eq!(OUTPUT_CANVAS.rgba_len(), 1080 * 1920 * 4);
        assert_eq!(OUTPUT_CANVAS.to_string(), "1080x1920");
    }
}
