//! Output encoding configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "fast";
/// Default average bitrate (8 Mbit/s)
pub const DEFAULT_VIDEO_BITRATE: &str = "8M";
/// Default H.264 profile
pub const DEFAULT_PROFILE: &str = "high";
/// Pixel format handed to players
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";

/// Preview extraction bound (longest edge, pixels)
pub const PREVIEW_MAX_EDGE: u32 = 400;

/// Video encoding configuration for the stabilized output.
///
/// Audio is never carried; the output has a single video track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset (e.g., "fast", "medium", "slow")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Average bitrate in FFmpeg notation (e.g., "8M")
    #[serde(default = "default_bitrate")]
    pub bitrate: String,

    /// Codec profile
    #[serde(default = "default_profile")]
    pub profile: String,

    /// Output pixel format
    #[serde(default = "default_pixel_format")]
    pub pixel_format: String,

    /// Additional FFmpeg output arguments
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_bitrate() -> String {
    DEFAULT_VIDEO_BITRATE.to_string()
}
fn default_profile() -> String {
    DEFAULT_PROFILE.to_string()
}
fn default_pixel_format() -> String {
    DEFAULT_PIXEL_FORMAT.to_string()
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            bitrate: DEFAULT_VIDEO_BITRATE.to_string(),
            profile: DEFAULT_PROFILE.to_string(),
            pixel_format: DEFAULT_PIXEL_FORMAT.to_string(),
            extra_args: Vec::new(),
        }
    }
}

impl EncodingConfig {
    /// Create a new encoding configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new config with a different codec.
    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = codec.into();
        self
    }

    /// Returns a new config with a different bitrate.
    pub fn with_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.bitrate = bitrate.into();
        self
    }

    /// Returns a new config with a different preset.
    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    /// Convert to FFmpeg output arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = vec![
            "-an".to_string(),
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-b:v".to_string(),
            self.bitrate.clone(),
        ];

        // Profiles are codec specific; only pass one for H.264 encoders.
        if self.codec.contains("264") {
            args.extend_from_slice(&["-profile:v".to_string(), self.profile.clone()]);
        }

        args.extend_from_slice(&[
            "-pix_fmt".to_string(),
            self.pixel_format.clone(),
            "-movflags".to_string(),
            "+faststart".to_string(),
        ]);

        args.extend(self.extra_args.clone());

        args
    }
}
