use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::shared::constants::{FRAMES_DIR_NAME, OUTPUT_VIDEO_NAME, PROCESSED_FRAMES_DIR_NAME};
use crate::shared::error::PipelineError;
use crate::shared::job_id::JobId;

use super::job_state::JobState;

/// How results leave the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Remux all annotated frames into one video.
    #[default]
    Batch,
    /// Push each annotated frame to a live subscriber as it is produced.
    Live,
}

impl DeliveryMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Batch => "batch",
            Self::Live => "live",
        }
    }
}

impl FromStr for DeliveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "batch" => Ok(Self::Batch),
            "live" | "stream" => Ok(Self::Live),
            other => Err(format!("unknown delivery mode '{other}' (expected batch or live)")),
        }
    }
}

/// One uploaded video moving through the pipeline.
///
/// The job owns `working_dir`; [`VideoJob::cleanup`] removes it, and the
/// source file too when the job owns it (server uploads do, CLI inputs
/// do not).
#[derive(Debug)]
pub struct VideoJob {
    id: JobId,
    source_path: PathBuf,
    working_dir: PathBuf,
    fps: u32,
    mode: DeliveryMode,
    state: JobState,
    owns_source: bool,
}

impl VideoJob {
    pub fn new(
        id: JobId,
        source_path: PathBuf,
        working_dir: PathBuf,
        fps: u32,
        mode: DeliveryMode,
    ) -> Self {
        Self {
            id,
            source_path,
            working_dir,
            fps: fps.max(1),
            mode,
            state: JobState::Idle,
            owns_source: false,
        }
    }

    /// Marks the source file as belonging to the job, so cleanup deletes it.
    pub fn with_owned_source(mut self, owned: bool) -> Self {
        self.owns_source = owned;
        self
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.working_dir.join(FRAMES_DIR_NAME)
    }

    pub fn processed_frames_dir(&self) -> PathBuf {
        self.working_dir.join(PROCESSED_FRAMES_DIR_NAME)
    }

    pub fn output_path(&self) -> PathBuf {
        self.working_dir.join(OUTPUT_VIDEO_NAME)
    }

    /// Moves to `next`, rejecting transitions the lifecycle does not allow.
    pub fn advance(&mut self, next: JobState) -> Result<JobState, PipelineError> {
        let prev = self.state;
        if !prev.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition {
                from: prev.as_str(),
                to: next.as_str(),
            });
        }
        self.state = next;
        Ok(prev)
    }

    /// Moves to `Failed` unless the job already reached a terminal state.
    pub fn mark_failed(&mut self) {
        if !self.state.is_terminal() {
            self.state = JobState::Failed;
        }
    }

    /// Removes the working directory and, if owned, the source file.
    /// Missing paths are not an error.
    pub fn cleanup(&self) {
        match std::fs::remove_dir_all(&self.working_dir) {
            Ok(()) => log::debug!("Removed working dir {}", self.working_dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!(
                "Failed to remove working dir {}: {e}",
                self.working_dir.display()
            ),
        }
        if !self.owns_source {
            return;
        }
        match std::fs::remove_file(&self.source_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!(
                "Failed to remove upload {}: {e}",
                self.source_path.display()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn job_in(dir: &Path, mode: DeliveryMode) -> VideoJob {
        let id = JobId::new();
        VideoJob::new(
            id,
            dir.join(format!("{id}.mp4")),
            dir.join(id.to_string()),
            24,
            mode,
        )
    }

    #[test]
    fn test_layout_under_working_dir() {
        let job = VideoJob::new(
            JobId::new(),
            PathBuf::from("/uploads/a.mp4"),
            PathBuf::from("/output/a"),
            24,
            DeliveryMode::Batch,
        );
        assert_eq!(job.frames_dir(), PathBuf::from("/output/a/frames"));
        assert_eq!(job.processed_frames_dir(), PathBuf::from("/output/a/processed_frames"));
        assert_eq!(job.output_path(), PathBuf::from("/output/a/processed_video.mp4"));
        assert_eq!(job.state(), JobState::Idle);
    }

    #[test]
    fn test_advance_follows_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = job_in(dir.path(), DeliveryMode::Live);
        assert_eq!(job.advance(JobState::Extracting).unwrap(), JobState::Idle);
        job.advance(JobState::ProcessingFrames).unwrap();
        job.advance(JobState::Completed).unwrap();

        let err = job.advance(JobState::Failed).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidTransition { from: "completed", to: "failed" }
        ));
    }

    #[test]
    fn test_mark_failed_keeps_terminal_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = job_in(dir.path(), DeliveryMode::Batch);
        job.advance(JobState::Extracting).unwrap();
        job.mark_failed();
        assert_eq!(job.state(), JobState::Failed);
        job.mark_failed();
        assert_eq!(job.state(), JobState::Failed);
    }

    #[test]
    fn test_cleanup_removes_working_dir_and_owned_source() {
        let dir = tempfile::tempdir().unwrap();
        let job = job_in(dir.path(), DeliveryMode::Batch).with_owned_source(true);
        std::fs::create_dir_all(job.frames_dir()).unwrap();
        std::fs::write(job.frames_dir().join("frame-0001.jpg"), b"x").unwrap();
        std::fs::write(job.source_path(), b"video").unwrap();

        job.cleanup();
        assert!(!job.working_dir().exists());
        assert!(!job.source_path().exists());
        // Second cleanup is harmless.
        job.cleanup();
    }

    #[test]
    fn test_cleanup_leaves_unowned_source() {
        let dir = tempfile::tempdir().unwrap();
        let job = job_in(dir.path(), DeliveryMode::Batch);
        std::fs::create_dir_all(job.working_dir()).unwrap();
        std::fs::write(job.source_path(), b"video").unwrap();

        job.cleanup();
        assert!(!job.working_dir().exists());
        assert!(job.source_path().exists());
    }

    #[rstest]
    #[case("batch", Ok(DeliveryMode::Batch))]
    #[case("LIVE", Ok(DeliveryMode::Live))]
    #[case(" stream ", Ok(DeliveryMode::Live))]
    fn test_delivery_mode_parse(#[case] input: &str, #[case] expected: Result<DeliveryMode, String>) {
        assert_eq!(input.parse::<DeliveryMode>(), expected);
    }

    #[test]
    fn test_unknown_delivery_mode_is_rejected() {
        assert!("carrier-pigeon".parse::<DeliveryMode>().is_err());
    }
}
