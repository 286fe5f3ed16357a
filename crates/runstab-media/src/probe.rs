//! FFprobe video information.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};
use crate::orientation::{display_matrix_is_mirrored, Orientation};

/// Metadata of a video track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Duration in seconds
    pub duration: f64,
    /// Stored width in pixels, before orientation
    pub width: u32,
    /// Stored height in pixels, before orientation
    pub height: u32,
    /// Nominal frame rate (fps)
    pub fps: f64,
    /// Video codec
    pub codec: String,
    /// Display orientation
    pub orientation: Orientation,
}

impl VideoInfo {
    /// Natural (stored) size.
    pub fn natural_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Size after orientation correction.
    pub fn oriented_size(&self) -> (u32, u32) {
        self.orientation.oriented_size(self.natural_size())
    }

    /// Estimated frame count, at least 1.
    pub fn estimated_frames(&self) -> u64 {
        estimate_frames(self.duration, self.fps)
    }
}

/// Everything the pipeline needs to know about a source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// First video track, if any
    pub video: Option<VideoInfo>,
    /// Whether any audio track is present (never carried to the output)
    pub has_audio: bool,
    /// Container duration in seconds
    pub duration: f64,
}

/// `max(1, round(duration * fps))`.
pub fn estimate_frames(duration: f64, fps: f64) -> u64 {
    let estimate = (duration * fps).round();
    if estimate.is_finite() && estimate >= 1.0 {
        estimate as u64
    } else {
        1
    }
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default)]
    disposition: HashMap<String, i64>,
    #[serde(default)]
    side_data_list: Vec<FfprobeSideData>,
}

#[derive(Debug, Deserialize)]
struct FfprobeSideData {
    side_data_type: Option<String>,
    displaymatrix: Option<String>,
    rotation: Option<f64>,
}

/// Probe a media file for its tracks.
pub async fn probe_media(path: impl AsRef<Path>) -> MediaResult<MediaInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: "FFprobe failed".to_string(),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}

/// Probe a file that must contain a video track.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    probe_media(path)
        .await?
        .video
        .ok_or_else(|| MediaError::InvalidVideo("No video stream found".to_string()))
}

fn parse_probe_output(json: &[u8]) -> MediaResult<MediaInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(json)?;

    let container_duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_ref())
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let has_audio = probe.streams.iter().any(|s| s.codec_type == "audio");

    // Cover art is reported as a one-frame video stream; skip it.
    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video" && s.disposition.get("attached_pic") != Some(&1))
        .map(|stream| {
            let duration = stream
                .duration
                .as_ref()
                .and_then(|d| d.parse::<f64>().ok())
                .filter(|d| *d > 0.0)
                .unwrap_or(container_duration);

            let fps = stream
                .avg_frame_rate
                .as_deref()
                .and_then(parse_frame_rate)
                .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
                .unwrap_or(30.0);

            VideoInfo {
                duration,
                width: stream.width.unwrap_or(0),
                height: stream.height.unwrap_or(0),
                fps,
                codec: stream.codec_name.clone().unwrap_or_default(),
                orientation: stream_orientation(stream),
            }
        });

    Ok(MediaInfo {
        video,
        has_audio,
        duration: container_duration,
    })
}

/// Orientation from the display matrix side data, falling back to the
/// legacy `rotate` tag.
fn stream_orientation(stream: &FfprobeStream) -> Orientation {
    let display_matrix = stream
        .side_data_list
        .iter()
        .find(|sd| sd.side_data_type.as_deref() == Some("Display Matrix"));

    if let Some(sd) = display_matrix {
        let mirrored = sd
            .displaymatrix
            .as_deref()
            .and_then(display_matrix_is_mirrored)
            .unwrap_or(false);
        // Side data reports the counter-clockwise angle.
        let clockwise = -sd.rotation.unwrap_or(0.0);
        return Orientation::from_rotation(clockwise, mirrored);
    }

    stream
        .tags
        .get("rotate")
        .and_then(|r| r.parse::<f64>().ok())
        .map(|r| Orientation::from_rotation(r, false))
        .unwrap_or_default()
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 && num > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok().filter(|r: &f64| *r > 0.0)
}
