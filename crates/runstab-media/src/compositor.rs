//! Geometric compositor: one decoded frame in, one output canvas out.
//!
//! Each canvas pixel is inverse-mapped back into the stored frame:
//!
//! 1. canvas `(u, v)` scales into the crop window,
//! 2. the crop window is offset by its clamped origin in display space,
//! 3. display space maps onto the stored buffer through the track
//!    [`Orientation`].
//!
//! All three steps use the raster convention (origin top-left, y down), the
//! same convention the anchor coordinates are picked in, so no vertical flip
//! is involved. Samples falling outside the frame take the padding colour.

use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use runstab_models::{CanvasSize, CropRect, Trajectory};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{MediaError, MediaResult};
use crate::orientation::Orientation;

/// Opaque black.
pub const DEFAULT_PADDING: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Resampling filter used when scaling the crop window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleFilter {
    Nearest,
    #[default]
    Bilinear,
}

impl SampleFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleFilter::Nearest => "nearest",
            SampleFilter::Bilinear => "bilinear",
        }
    }
}

impl fmt::Display for SampleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SampleFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(SampleFilter::Nearest),
            "bilinear" | "linear" => Ok(SampleFilter::Bilinear),
            other => Err(format!("unknown sample filter: {}", other)),
        }
    }
}

/// Per-run compositor. Stateless across frames; output depends only on the
/// frame content and its index.
#[derive(Debug, Clone)]
pub struct Compositor {
    trajectory: Trajectory,
    natural_size: (u32, u32),
    oriented_size: (u32, u32),
    orientation: Orientation,
    canvas: CanvasSize,
    filter: SampleFilter,
    padding: Rgba<u8>,
}

impl Compositor {
    /// Build a compositor for frames stored at `natural_size` and displayed
    /// with `orientation`.
    pub fn new(
        trajectory: Trajectory,
        natural_size: (u32, u32),
        orientation: Orientation,
        canvas: CanvasSize,
    ) -> MediaResult<Self> {
        if natural_size.0 == 0 || natural_size.1 == 0 {
            return Err(MediaError::InvalidVideo(format!(
                "frame size {}x{} has no pixels",
                natural_size.0, natural_size.1
            )));
        }
        if canvas.width == 0 || canvas.height == 0 {
            return Err(MediaError::InvalidVideo(format!("canvas {} has no pixels", canvas)));
        }
        let crop = trajectory.crop_size();
        if !(crop.width > 0.0 && crop.height > 0.0) || !crop.width.is_finite() {
            return Err(MediaError::InvalidVideo(format!(
                "crop window {:.1}x{:.1} is empty",
                crop.width, crop.height
            )));
        }

        Ok(Self {
            trajectory,
            natural_size,
            oriented_size: orientation.oriented_size(natural_size),
            orientation,
            canvas,
            filter: SampleFilter::default(),
            padding: DEFAULT_PADDING,
        })
    }

    pub fn with_filter(mut self, filter: SampleFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_padding(mut self, padding: Rgba<u8>) -> Self {
        self.padding = padding;
        self
    }

    pub fn canvas(&self) -> CanvasSize {
        self.canvas
    }

    /// Display-space frame size.
    pub fn oriented_size(&self) -> (u32, u32) {
        self.oriented_size
    }

    /// Crop window for `frame_index`, in display space.
    pub fn crop_rect(&self, frame_index: u64) -> CropRect {
        let index = i64::try_from(frame_index).unwrap_or(i64::MAX);
        CropRect::centered_within(
            self.trajectory.x(index),
            self.trajectory.y(index),
            self.trajectory.crop_size(),
            self.oriented_size.0 as f64,
            self.oriented_size.1 as f64,
        )
    }

    /// Render frame `frame_index` onto a fresh canvas.
    pub fn composite(&self, frame: &RgbaImage, frame_index: u64) -> MediaResult<RgbaImage> {
        if frame.dimensions() != self.natural_size {
            return Err(MediaError::decode_failed(format!(
                "frame {} is {}x{}, expected {}x{}",
                frame_index,
                frame.width(),
                frame.height(),
                self.natural_size.0,
                self.natural_size.1
            )));
        }

        let rect = self.crop_rect(frame_index);
        let (scale_x, scale_y) = rect.scale_to(self.canvas);
        let (cw, ch) = (self.canvas.width as usize, self.canvas.height as usize);

        // Sample positions at pixel centres.
        let xs: Vec<f64> = (0..cw)
            .map(|u| rect.x + (u as f64 + 0.5) / scale_x)
            .collect();

        let mut out = RgbaImage::new(self.canvas.width, self.canvas.height);
        let buf: &mut [u8] = &mut out;
        buf.par_chunks_mut(cw * 4).enumerate().for_each(|(v, row)| {
            let sy = rect.y + (v as f64 + 0.5) / scale_y;
            for (px, &sx) in row.chunks_exact_mut(4).zip(&xs) {
                px.copy_from_slice(&self.sample(frame, sx, sy));
            }
        });
        debug_assert_eq!(out.len(), ch * cw * 4);

        Ok(out)
    }

    fn sample(&self, frame: &RgbaImage, x: f64, y: f64) -> [u8; 4] {
        let (ow, oh) = (self.oriented_size.0 as f64, self.oriented_size.1 as f64);
        if !(x >= 0.0 && x < ow && y >= 0.0 && y < oh) {
            return self.padding.0;
        }

        match self.filter {
            SampleFilter::Nearest => self.fetch(frame, x.floor() as i64, y.floor() as i64),
            SampleFilter::Bilinear => {
                let fx = x - 0.5;
                let fy = y - 0.5;
                let x0 = fx.floor();
                let y0 = fy.floor();
                let tx = fx - x0;
                let ty = fy - y0;
                let (x0, y0) = (x0 as i64, y0 as i64);

                let p00 = self.fetch(frame, x0, y0);
                let p10 = self.fetch(frame, x0 + 1, y0);
                let p01 = self.fetch(frame, x0, y0 + 1);
                let p11 = self.fetch(frame, x0 + 1, y0 + 1);

                let mut px = [0u8; 4];
                for c in 0..4 {
                    let top = p00[c] as f64 * (1.0 - tx) + p10[c] as f64 * tx;
                    let bottom = p01[c] as f64 * (1.0 - tx) + p11[c] as f64 * tx;
                    px[c] = (top * (1.0 - ty) + bottom * ty).round().clamp(0.0, 255.0) as u8;
                }
                px
            }
        }
    }

    /// Read a display-space pixel, clamping neighbours at the frame edge.
    #[inline]
    fn fetch(&self, frame: &RgbaImage, x: i64, y: i64) -> [u8; 4] {
        let x = x.clamp(0, self.oriented_size.0 as i64 - 1) as u32;
        let y = y.clamp(0, self.oriented_size.1 as i64 - 1) as u32;
        let (nx, ny) = self.orientation.to_natural(x, y, self.natural_size);
        let idx = (ny as usize * self.natural_size.0 as usize + nx as usize) * 4;
        let raw = frame.as_raw();
        [raw[idx], raw[idx + 1], raw[idx + 2], raw[idx + 3]]
    }
}
