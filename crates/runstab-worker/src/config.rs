//! Worker configuration.

use chrono::{DateTime, TimeZone};
use runstab_media::{SampleFilter, StabilizerConfig};
use runstab_models::EncodingConfig;
use std::path::{Path, PathBuf};

/// Worker configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Directory for outputs when no path is given
    pub work_dir: PathBuf,
    /// Album directory finished videos are saved to
    pub library_dir: PathBuf,
    /// Frames buffered between compositor and encoder
    pub sink_queue_depth: usize,
    /// Compositor resampling filter
    pub sample_filter: SampleFilter,
    /// Encoder
    pub video_codec: String,
    /// Average video bitrate
    pub video_bitrate: String,
    /// Encoder preset
    pub preset: String,
    /// Save finished videos to the library
    pub save_to_library: bool,
    /// Emit JSON logs
    pub log_json: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let encoding = EncodingConfig::default();
        Self {
            work_dir: PathBuf::from("/tmp/runstab"),
            library_dir: default_library_dir(None),
            sink_queue_depth: runstab_media::sink::DEFAULT_QUEUE_DEPTH,
            sample_filter: SampleFilter::default(),
            video_codec: encoding.codec,
            video_bitrate: encoding.bitrate,
            preset: encoding.preset,
            save_to_library: true,
            log_json: false,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from any key lookup; unset or unparsable values fall
    /// back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            work_dir: lookup("RUNSTAB_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            library_dir: lookup("RUNSTAB_LIBRARY_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| default_library_dir(lookup("HOME"))),
            sink_queue_depth: lookup("RUNSTAB_SINK_QUEUE_DEPTH")
                .and_then(|s| s.parse().ok())
                .filter(|depth: &usize| *depth > 0)
                .unwrap_or(defaults.sink_queue_depth),
            sample_filter: lookup("RUNSTAB_SAMPLE_FILTER")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.sample_filter),
            video_codec: lookup("RUNSTAB_VIDEO_CODEC").unwrap_or(defaults.video_codec),
            video_bitrate: lookup("RUNSTAB_VIDEO_BITRATE").unwrap_or(defaults.video_bitrate),
            preset: lookup("RUNSTAB_PRESET").unwrap_or(defaults.preset),
            save_to_library: lookup("RUNSTAB_SAVE_TO_LIBRARY")
                .and_then(|s| parse_bool(&s))
                .unwrap_or(defaults.save_to_library),
            log_json: lookup("LOG_FORMAT")
                .map(|v| v.to_lowercase() == "json")
                .unwrap_or(false),
        }
    }

    /// Encoder parameters for this configuration.
    pub fn encoding(&self) -> EncodingConfig {
        EncodingConfig::default()
            .with_codec(self.video_codec.clone())
            .with_bitrate(self.video_bitrate.clone())
            .with_preset(self.preset.clone())
    }

    /// Pipeline settings for this configuration.
    pub fn stabilizer_config(&self) -> StabilizerConfig {
        StabilizerConfig {
            encoding: self.encoding(),
            sink_queue_depth: self.sink_queue_depth,
            sample_filter: self.sample_filter,
            ..StabilizerConfig::default()
        }
    }

    /// `<work_dir>/<stem>_<yyMMddHHmm>.mp4`.
    pub fn default_output_path<Tz>(&self, source: &Path, now: DateTime<Tz>) -> PathBuf
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        self.work_dir
            .join(format!("{}_{}.mp4", stem, now.format("%y%m%d%H%M")))
    }
}

fn default_library_dir(home: Option<String>) -> PathBuf {
    match home {
        Some(home) if !home.is_empty() => PathBuf::from(home).join("Movies").join("RunStab"),
        _ => PathBuf::from("RunStab"),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
