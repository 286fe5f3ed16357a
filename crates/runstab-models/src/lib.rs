//! Shared data models for RunStab.
//!
//! This crate provides Serde-serializable types for:
//! - The two-anchor runner trajectory
//! - Crop and canvas geometry
//! - Encoding configuration
//! - Stabilization jobs and their lifecycle

pub mod encoding;
pub mod geometry;
pub mod job;
pub mod trajectory;

// Re-export common types
pub use encoding::EncodingConfig;
pub use geometry::{CanvasSize, CropRect, CropSize, OUTPUT_CANVAS};
pub use job::{JobId, JobState, StabilizationJob};
pub use trajectory::{AnchorParseError, AnchorPoint, Trajectory};
