//! Subcommand implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use runstab_media::fs_utils::remove_if_exists;
use runstab_media::{probe_media, FramePreview, StabilizeError};
use runstab_models::{AnchorPoint, StabilizationJob, Trajectory};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::{PreviewArgs, StabilizeArgs};
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::executor::{JobExecutor, JobOutcome};

/// Stabilize one video end to end.
///
/// The trajectory is sized against the display-oriented source height. An
/// existing output file is replaced. On Ctrl-C the run is cancelled and the
/// partial output removed.
pub async fn stabilize_command(
    mut config: WorkerConfig,
    args: StabilizeArgs,
) -> WorkerResult<JobOutcome> {
    check_anchors(&args.start, &args.end)?;

    let info = probe_media(&args.input)
        .await
        .map_err(StabilizeError::ReadFailed)?;
    let video = info.video.ok_or(StabilizeError::NoVideoTrack)?;
    let (_, display_height) = video.oriented_size();

    let trajectory = Trajectory::new(args.start, args.end, display_height as f64);
    let output = args
        .output
        .unwrap_or_else(|| config.default_output_path(&args.input, Local::now()));
    prepare_output(&output).await?;

    if args.no_save {
        config.save_to_library = false;
    }
    let executor = Arc::new(JobExecutor::new(config));

    let signal_executor = Arc::clone(&executor);
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_executor.shutdown();
        }
    });

    let mut job = StabilizationJob::new(&args.input, &output, trajectory);
    let result = executor.execute(&mut job).await;
    ctrl_c.abort();

    if let Err(e) = &result {
        if e.is_cancelled() && remove_if_exists(&job.output).await? {
            info!(output = %job.output.display(), "Removed partial output");
        }
    }
    result
}

/// Anchors must have finite coordinates and come in frame order.
fn check_anchors(start: &AnchorPoint, end: &AnchorPoint) -> WorkerResult<()> {
    for anchor in [start, end] {
        if !anchor.x.is_finite() || !anchor.y.is_finite() {
            return Err(WorkerError::invalid_arguments(format!(
                "anchor {} has a non-finite coordinate",
                anchor
            )));
        }
    }
    if start.frame > end.frame {
        return Err(WorkerError::invalid_arguments(format!(
            "start anchor frame {} is after end anchor frame {}",
            start.frame, end.frame
        )));
    }
    Ok(())
}

/// Make sure the output's directory exists and nothing occupies the path.
async fn prepare_output(output: &Path) -> WorkerResult<()> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    if remove_if_exists(output).await? {
        warn!(output = %output.display(), "Replacing existing output");
    }
    Ok(())
}

/// What `preview` reports about a source.
#[derive(Debug, Clone, Serialize)]
pub struct PreviewSummary {
    pub frame_count: u64,
    pub video_size: (u32, u32),
    pub preview_size: (u32, u32),
    pub frame: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_to: Option<PathBuf>,
}

/// Describe a source and optionally save one preview frame as PNG.
pub async fn preview_command(args: PreviewArgs) -> WorkerResult<PreviewSummary> {
    let preview = FramePreview::open(&args.input).await?;

    let saved_to = match args.out {
        Some(path) => {
            let image = preview.image_at(args.frame).await?;
            let target = path.clone();
            tokio::task::spawn_blocking(move || image.save(&target))
                .await
                .map_err(|e| WorkerError::job_failed(e.to_string()))??;
            info!(frame = args.frame, path = %path.display(), "Saved preview frame");
            Some(path)
        }
        None => None,
    };

    Ok(PreviewSummary {
        frame_count: preview.frame_count(),
        video_size: preview.video_size(),
        preview_size: preview.preview_size(),
        frame: args.frame,
        saved_to,
    })
}
