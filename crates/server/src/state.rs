use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use facemark_core::annotation::infrastructure::corner_mark_annotator::CornerMarkAnnotator;
use facemark_core::delivery::live_channel::LiveChannel;
use facemark_core::delivery::subscriber_registry::SubscriberRegistry;
use facemark_core::detection::domain::face_detector::DetectorFactory;
use facemark_core::pipeline::job_state::JobState;
use facemark_core::pipeline::pipeline_config::PipelineConfig;
use facemark_core::pipeline::process_video_use_case::{JobOutcome, ProcessVideoUseCase};
use facemark_core::pipeline::video_job::VideoJob;
use facemark_core::shared::error::PipelineError;
use facemark_core::shared::job_id::JobId;
use facemark_core::video::infrastructure::ffmpeg_frame_extractor::FfmpegFrameExtractor;
use facemark_core::video::infrastructure::ffmpeg_frame_remuxer::FfmpegFrameRemuxer;

use crate::config::ServerConfig;
use crate::job_registry::{JobRegistry, RegistryLogger};

/// Shared state handed to every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub pipeline: Arc<PipelineConfig>,
    /// Loads one detector per job; the model file is resolved once at startup.
    pub detectors: Arc<dyn DetectorFactory>,
    /// Job id → live channel, for `GET /live/{job_id}`.
    pub live: SubscriberRegistry,
    pub jobs: JobRegistry,
}

impl AppState {
    pub fn new(config: ServerConfig, detectors: Arc<dyn DetectorFactory>) -> Self {
        let pipeline = config.pipeline_config();
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            detectors,
            live: SubscriberRegistry::new(),
            jobs: JobRegistry::new(),
        }
    }

    /// Runs `job` to completion on the calling thread. Blocking.
    ///
    /// The registry entry follows the job through its states; on failure
    /// it also records the error message. Setting `cancel` stops the job
    /// at its next checkpoint.
    fn run_job(
        &self,
        job: &mut VideoJob,
        live: Option<Arc<LiveChannel>>,
        cancel: Arc<AtomicBool>,
    ) -> Result<JobOutcome, PipelineError> {
        let quality = self.pipeline.jpeg_quality;
        let mut use_case = ProcessVideoUseCase::new(
            Box::new(FfmpegFrameExtractor::new(quality)),
            Arc::clone(&self.detectors),
            Box::new(CornerMarkAnnotator::new(quality)),
            Box::new(FfmpegFrameRemuxer),
            (*self.pipeline).clone(),
        )
        .with_logger(Box::new(RegistryLogger::new(job.id(), self.jobs.clone())))
        .with_cancel_flag(cancel);
        if let Some(live) = live {
            use_case = use_case.with_live_channel(live);
        }

        let result = use_case.execute(job);
        if let Err(e) = &result {
            self.jobs.set_error(job.id(), e.to_string());
        }
        result
    }

    /// Stores `upload` as the job's source and runs the job on the blocking
    /// pool.
    ///
    /// The worker owns the job: it removes the job's files and schedules
    /// the status for removal itself, so dropping the handle loses only
    /// the result. A batch job yields the remuxed video bytes.
    pub fn spawn_job(
        &self,
        job: VideoJob,
        upload: Vec<u8>,
        live: Option<Arc<LiveChannel>>,
        cancel: Arc<AtomicBool>,
    ) -> JoinHandle<Result<Option<Vec<u8>>, PipelineError>> {
        let state = self.clone();
        let runtime = Handle::current();
        tokio::task::spawn_blocking(move || {
            let id = job.id();
            let result = state.run_to_end(job, &upload, live, cancel);
            let _runtime = runtime.enter();
            state.forget_later(id);
            result
        })
    }

    fn run_to_end(
        &self,
        mut job: VideoJob,
        upload: &[u8],
        live: Option<Arc<LiveChannel>>,
        cancel: Arc<AtomicBool>,
    ) -> Result<Option<Vec<u8>>, PipelineError> {
        let id = job.id();
        let result = match write_upload(job.source_path(), upload) {
            Ok(()) => self
                .run_job(&mut job, live, cancel)
                .and_then(|outcome| match outcome {
                    JobOutcome::Video(path) => std::fs::read(&path)
                        .map(Some)
                        .map_err(|e| PipelineError::io(&path, e)),
                    JobOutcome::Streamed { frames } => {
                        log::info!("Live job {id} streamed {frames} frames");
                        Ok(None)
                    }
                }),
            Err(e) => {
                self.jobs.set_state(id, JobState::Failed);
                self.jobs.set_error(id, e.to_string());
                if let Some(live) = &live {
                    live.fail(e.to_string());
                }
                Err(e)
            }
        };

        // A failed run already cleaned up, or kept its files on purpose.
        if job.state() != JobState::Failed {
            job.cleanup();
        }
        result
    }

    /// Drops the job's status and live channel once the retention period
    /// has passed. Must be called from within the runtime.
    pub fn forget_later(&self, id: JobId) {
        let state = self.clone();
        let ttl = self.config.finished_job_ttl();
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            state.jobs.remove(id);
            state.live.remove(&id);
            log::debug!("Forgot job {id}");
        });
    }
}

fn write_upload(path: &Path, data: &[u8]) -> Result<(), PipelineError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| PipelineError::io(dir, e))?;
    }
    std::fs::write(path, data).map_err(|e| PipelineError::io(path, e))
}
