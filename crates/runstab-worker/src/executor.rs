//! Job executor.

use std::sync::Arc;

use runstab_media::{
    progress, FfmpegBackend, MediaBackend, ProgressEvent, StabilizeError, StabilizeReport,
    StabilizeRequest, Stabilizer,
};
use runstab_models::{JobState, StabilizationJob};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, Instrument};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::library::{DirectoryLibrary, MediaLibrary};
use crate::logging::{JobLogger, ProgressMilestones};

/// Result of a successful job.
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub job: StabilizationJob,
    pub report: StabilizeReport,
    /// Library identifier, when the output was saved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_as: Option<String>,
}

/// Runs stabilization jobs and saves their outputs.
pub struct JobExecutor<B = FfmpegBackend> {
    config: WorkerConfig,
    stabilizer: Stabilizer<B>,
    library: Option<Arc<dyn MediaLibrary>>,
    shutdown: watch::Sender<bool>,
}

impl JobExecutor<FfmpegBackend> {
    /// Executor backed by FFmpeg, saving to the configured library directory.
    pub fn new(config: WorkerConfig) -> Self {
        let library: Option<Arc<dyn MediaLibrary>> = if config.save_to_library {
            Some(Arc::new(DirectoryLibrary::new(config.library_dir.clone())))
        } else {
            None
        };
        Self::with_parts(config, FfmpegBackend, library)
    }
}

impl<B> JobExecutor<B>
where
    B: MediaBackend + Clone + 'static,
{
    pub fn with_parts(
        config: WorkerConfig,
        backend: B,
        library: Option<Arc<dyn MediaLibrary>>,
    ) -> Self {
        let stabilizer = Stabilizer::with_backend(backend, config.stabilizer_config());
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            stabilizer,
            library,
            shutdown,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Request cancellation of running and future jobs.
    pub fn shutdown(&self) {
        info!("Shutdown requested");
        self.shutdown.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Run `job` to a terminal state.
    ///
    /// A library failure leaves the job `Succeeded` and the output in place,
    /// and is reported as [`WorkerError::SaveFailed`].
    pub async fn execute(&self, job: &mut StabilizationJob) -> WorkerResult<JobOutcome> {
        let logger = JobLogger::new(&job.id, "stabilize");
        let span = logger.create_span();
        self.execute_inner(job, &logger).instrument(span).await
    }

    async fn execute_inner(
        &self,
        job: &mut StabilizationJob,
        logger: &JobLogger,
    ) -> WorkerResult<JobOutcome> {
        if !job.transition(JobState::Running) {
            return Err(WorkerError::job_failed(format!(
                "job {} cannot start from state {}",
                job.id, job.state
            )));
        }
        logger.log_start(&format!(
            "{} -> {}",
            job.source.display(),
            job.output.display()
        ));

        let request = StabilizeRequest::new(&job.source, &job.output, job.trajectory);
        let (tx, mut rx) = progress::channel();
        let handle = self
            .stabilizer
            .clone()
            .spawn(request, tx, self.shutdown.subscribe());

        let mut milestones = ProgressMilestones::default();
        while let Some(event) = rx.recv().await {
            match event {
                ProgressEvent::Started { total_frames } => {
                    info!(total_frames, "Decoding started");
                }
                ProgressEvent::Frame {
                    frames_done,
                    fraction,
                } => {
                    job.frames_processed = frames_done;
                    if milestones.reached(fraction) {
                        logger.log_progress(frames_done, fraction);
                    }
                }
                ProgressEvent::Finalizing => info!("Finalizing output"),
                ProgressEvent::Complete { .. }
                | ProgressEvent::Failed { .. }
                | ProgressEvent::Cancelled => {}
            }
        }

        let result = match handle.await {
            Ok(result) => result,
            Err(e) => {
                let message = format!("stabilizer task ended abnormally: {}", e);
                logger.log_error(&message);
                job.fail(message.clone());
                return Err(WorkerError::job_failed(message));
            }
        };

        let report = match result {
            Ok(report) => report,
            Err(StabilizeError::Cancelled) => {
                job.transition(JobState::Cancelled);
                logger.log_warning("cancelled");
                return Err(StabilizeError::Cancelled.into());
            }
            Err(e) => {
                logger.log_error(&e.to_string());
                job.fail(e.to_string());
                return Err(e.into());
            }
        };

        job.frames_processed = report.frames_decoded;
        job.transition(JobState::Succeeded);
        logger.log_completion(&format!(
            "{} frames written to {}",
            report.frames_written,
            report.output.display()
        ));

        let stored_as = match &self.library {
            Some(library) => match library.store(&report.output).await {
                Ok(id) => Some(id),
                Err(e) => {
                    logger.log_warning(&e.to_string());
                    return Err(e.into());
                }
            },
            None => None,
        };

        Ok(JobOutcome {
            job: job.clone(),
            report,
            stored_as,
        })
    }
}
