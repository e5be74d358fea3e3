use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::delivery::live_channel::LiveChannel;
use crate::detection::domain::face_detector::DetectorFactory;
use crate::shared::error::PipelineError;
use crate::shared::frame_name::list_frames;
use crate::shared::stage_control::StageControl;
use crate::video::domain::frame_extractor::FrameExtractor;
use crate::video::domain::frame_remuxer::FrameRemuxer;

use super::frame_loop::FrameLoop;
use super::job_state::JobState;
use super::pipeline_config::PipelineConfig;
use super::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use super::video_job::{DeliveryMode, VideoJob};

/// What a successful job produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    /// Batch mode: the remuxed video, inside the job's working directory.
    Video(PathBuf),
    /// Live mode: how many annotated frames were delivered.
    Streamed { frames: u32 },
}

/// Orchestrates one video job: extract, detect and annotate each frame,
/// then remux (batch) or stream (live).
///
/// On failure the job ends in `Failed`, a live subscriber receives the
/// error, and the working directory is removed unless `keep_workdir` is
/// set. On success the caller removes it with [`VideoJob::cleanup`] once
/// the result has been handed over.
pub struct ProcessVideoUseCase {
    extractor: Box<dyn FrameExtractor>,
    detectors: Arc<dyn DetectorFactory>,
    annotator: Box<dyn FrameAnnotator>,
    remuxer: Box<dyn FrameRemuxer>,
    config: PipelineConfig,
    live: Option<Arc<LiveChannel>>,
    logger: Box<dyn PipelineLogger>,
    control: StageControl,
}

impl ProcessVideoUseCase {
    pub fn new(
        extractor: Box<dyn FrameExtractor>,
        detectors: Arc<dyn DetectorFactory>,
        annotator: Box<dyn FrameAnnotator>,
        remuxer: Box<dyn FrameRemuxer>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            extractor,
            detectors,
            annotator,
            remuxer,
            config,
            live: None,
            logger: Box::new(NullPipelineLogger),
            control: StageControl::new(),
        }
    }

    /// Channel that live-mode frames are pushed to.
    pub fn with_live_channel(mut self, live: Arc<LiveChannel>) -> Self {
        self.live = Some(live);
        self
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Flag that aborts the job at the next stage checkpoint once set.
    pub fn with_cancel_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.control = StageControl::with_flag(cancelled);
        self
    }

    pub fn execute(&mut self, job: &mut VideoJob) -> Result<JobOutcome, PipelineError> {
        log::info!(
            "Job {} started: {} mode at {} fps",
            job.id(),
            job.mode().as_str(),
            job.fps()
        );

        let result = self.run(job);
        match &result {
            Ok(outcome) => log::info!("Job {} completed: {outcome:?}", job.id()),
            Err(e) => self.fail(job, e),
        }
        self.logger.summary();
        result
    }

    fn run(&mut self, job: &mut VideoJob) -> Result<JobOutcome, PipelineError> {
        self.advance(job, JobState::Extracting)?;
        std::fs::create_dir_all(job.working_dir())
            .map_err(|e| PipelineError::io(job.working_dir(), e))?;

        let t0 = Instant::now();
        let frames_dir = self.extractor.extract(
            job.source_path(),
            &job.frames_dir(),
            job.fps(),
            &self.control.for_stage(self.config.stage_timeout),
        )?;
        self.logger.timing("extract", ms_since(t0));

        let frames = list_frames(&frames_dir).map_err(|e| PipelineError::io(&frames_dir, e))?;
        if frames.is_empty() {
            return Err(PipelineError::Extraction(format!(
                "no frames extracted into {}",
                frames_dir.display()
            )));
        }
        self.logger
            .info(&format!("Extracted {} frames at {} fps", frames.len(), job.fps()));

        self.advance(job, JobState::ProcessingFrames)?;
        let mut detector = self
            .detectors
            .create()
            .map_err(|e| PipelineError::ModelLoad(e.to_string()))?;

        let delivery = self.config.delivery_for(job.mode());
        let processed_dir = job.processed_frames_dir();
        if delivery.persists() {
            std::fs::create_dir_all(&processed_dir)
                .map_err(|e| PipelineError::io(&processed_dir, e))?;
        }

        let live = match job.mode() {
            DeliveryMode::Live => self.live.clone(),
            DeliveryMode::Batch => None,
        };
        if let Some(live) = &live {
            self.await_subscriber(live);
        }

        let summary = FrameLoop {
            detector: &mut *detector,
            annotator: &*self.annotator,
            delivery,
            retention: self.config.retention,
            processed_dir: &processed_dir,
            live: live.as_deref(),
            control: &self.control.for_stage(self.config.stage_timeout),
            logger: &mut *self.logger,
        }
        .run(frames)?;
        drop(detector);

        self.logger.info(&format!(
            "Frames: {} seen, {} with faces, {} delivered, {} detection errors",
            summary.frames_seen,
            summary.frames_with_faces,
            summary.frames_delivered,
            summary.detection_errors
        ));

        match job.mode() {
            DeliveryMode::Batch => {
                self.advance(job, JobState::Remuxing)?;
                let t0 = Instant::now();
                let video = self.remuxer.remux(
                    &processed_dir,
                    &job.output_path(),
                    job.fps(),
                    &self.control.for_stage(self.config.stage_timeout),
                )?;
                self.logger.timing("remux", ms_since(t0));
                self.advance(job, JobState::Completed)?;
                Ok(JobOutcome::Video(video))
            }
            DeliveryMode::Live => {
                self.advance(job, JobState::Completed)?;
                if let Some(live) = &live {
                    live.complete();
                }
                Ok(JobOutcome::Streamed {
                    frames: summary.frames_delivered,
                })
            }
        }
    }

    fn await_subscriber(&mut self, live: &LiveChannel) {
        if live.has_subscriber() || self.config.live_attach_timeout.is_zero() {
            return;
        }
        if live.wait_for_subscriber(self.config.live_attach_timeout) {
            self.logger.info("Live subscriber attached");
        } else {
            log::warn!(
                "No live subscriber after {:?}; frames will be dropped until one attaches",
                self.config.live_attach_timeout
            );
        }
    }

    fn advance(&mut self, job: &mut VideoJob, next: JobState) -> Result<(), PipelineError> {
        let prev = job.advance(next)?;
        self.logger.state(job.id(), prev, next);
        Ok(())
    }

    fn fail(&mut self, job: &mut VideoJob, error: &PipelineError) {
        let prev = job.state();
        log::error!("Job {} failed: {error}", job.id());
        // A job that already finished keeps its state and its files.
        if prev.is_terminal() {
            return;
        }
        job.mark_failed();
        self.logger.state(job.id(), prev, JobState::Failed);

        if job.mode() == DeliveryMode::Live {
            if let Some(live) = &self.live {
                live.fail(error.to_string());
            }
        }

        if self.config.keep_workdir {
            log::info!("Keeping working dir {}", job.working_dir().display());
        } else {
            job.cleanup();
        }
    }
}

fn ms_since(t0: Instant) -> f64 {
    t0.elapsed().as_secs_f64() * 1000.0
}
