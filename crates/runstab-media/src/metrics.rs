//! Stabilization metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! embedding binary installs a recorder.

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Frames composited and handed to the encoder.
    pub const FRAMES_COMPOSITED_TOTAL: &str = "runstab_frames_composited_total";

    /// Decoded samples that carried no picture.
    pub const FRAMES_SKIPPED_TOTAL: &str = "runstab_frames_skipped_total";

    /// Finished runs by outcome.
    pub const RUNS_TOTAL: &str = "runstab_stabilize_runs_total";

    /// Per-frame compositing time in seconds.
    pub const COMPOSITE_SECONDS: &str = "runstab_composite_seconds";
}

/// Record one composited frame.
pub fn record_composite(seconds: f64) {
    counter!(names::FRAMES_COMPOSITED_TOTAL).increment(1);
    histogram!(names::COMPOSITE_SECONDS).record(seconds);
}

/// Record a sample without a picture.
pub fn record_skipped() {
    counter!(names::FRAMES_SKIPPED_TOTAL).increment(1);
}

/// Record the end of a run; `outcome` is `"ok"` or an error kind.
pub fn record_run(outcome: &'static str) {
    counter!(names::RUNS_TOTAL, "outcome" => outcome).increment(1);
}
