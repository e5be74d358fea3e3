use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use facemark_core::pipeline::job_state::JobState;
use facemark_core::pipeline::pipeline_logger::{LogPipelineLogger, PipelineLogger};
use facemark_core::pipeline::video_job::DeliveryMode;
use facemark_core::shared::job_id::JobId;

/// What `GET /jobs/{job_id}` reports.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct JobStatus {
    pub job_id: String,
    pub mode: &'static str,
    pub state: &'static str,
    pub frames_processed: u32,
    pub error: Option<String>,
}

#[derive(Clone, Debug)]
struct JobRecord {
    mode: DeliveryMode,
    state: JobState,
    frames_processed: u32,
    error: Option<String>,
}

/// Status of every job the server knows about, keyed by job id.
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<Mutex<HashMap<JobId, JobRecord>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, JobRecord>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, id: JobId, mode: DeliveryMode) {
        self.lock().insert(
            id,
            JobRecord {
                mode,
                state: JobState::Idle,
                frames_processed: 0,
                error: None,
            },
        );
    }

    pub fn set_state(&self, id: JobId, state: JobState) {
        if let Some(record) = self.lock().get_mut(&id) {
            record.state = state;
        }
    }

    pub fn set_progress(&self, id: JobId, frames_processed: u32) {
        if let Some(record) = self.lock().get_mut(&id) {
            record.frames_processed = frames_processed;
        }
    }

    /// Records why the job failed. The state itself arrives through
    /// [`set_state`](Self::set_state).
    pub fn set_error(&self, id: JobId, error: String) {
        if let Some(record) = self.lock().get_mut(&id) {
            record.error = Some(error);
        }
    }

    pub fn status(&self, id: JobId) -> Option<JobStatus> {
        self.lock().get(&id).map(|r| JobStatus {
            job_id: id.to_string(),
            mode: r.mode.as_str(),
            state: r.state.as_str(),
            frames_processed: r.frames_processed,
            error: r.error.clone(),
        })
    }

    pub fn remove(&self, id: JobId) -> bool {
        self.lock().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Pipeline logger that mirrors state changes and progress into the
/// registry and forwards everything to a [`LogPipelineLogger`].
pub struct RegistryLogger {
    id: JobId,
    jobs: JobRegistry,
    inner: LogPipelineLogger,
}

impl RegistryLogger {
    pub fn new(id: JobId, jobs: JobRegistry) -> Self {
        Self {
            id,
            jobs,
            inner: LogPipelineLogger::default(),
        }
    }
}

impl PipelineLogger for RegistryLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.jobs
            .set_progress(self.id, u32::try_from(current).unwrap_or(u32::MAX));
        self.inner.progress(current, total);
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.inner.timing(stage, duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.inner.metric(name, value);
    }

    fn info(&mut self, message: &str) {
        self.inner.info(&format!("[{}] {message}", self.id));
    }

    fn state(&mut self, job: JobId, from: JobState, to: JobState) {
        self.jobs.set_state(job, to);
        self.inner.state(job, from, to);
    }

    fn summary(&self) {
        self.inner.summary();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_is_idle() {
        let jobs = JobRegistry::new();
        let id = JobId::new();
        jobs.insert(id, DeliveryMode::Live);

        let status = jobs.status(id).unwrap();
        assert_eq!(status.job_id, id.to_string());
        assert_eq!(status.mode, "live");
        assert_eq!(status.state, "idle");
        assert_eq!(status.frames_processed, 0);
        assert!(status.error.is_none());
    }

    #[test]
    fn test_unknown_job_has_no_status() {
        let jobs = JobRegistry::new();
        jobs.set_state(JobId::new(), JobState::Failed);
        assert!(jobs.status(JobId::new()).is_none());
        assert!(jobs.is_empty());
    }

    #[test]
    fn test_logger_mirrors_state_and_progress() {
        let jobs = JobRegistry::new();
        let id = JobId::new();
        jobs.insert(id, DeliveryMode::Batch);

        let mut logger = RegistryLogger::new(id, jobs.clone());
        logger.state(id, JobState::Idle, JobState::Extracting);
        logger.state(id, JobState::Extracting, JobState::ProcessingFrames);
        logger.progress(7, 48);

        let status = jobs.status(id).unwrap();
        assert_eq!(status.state, "processing_frames");
        assert_eq!(status.frames_processed, 7);
    }

    #[test]
    fn test_error_and_removal() {
        let jobs = JobRegistry::new();
        let id = JobId::new();
        jobs.insert(id, DeliveryMode::Batch);
        jobs.set_state(id, JobState::Failed);
        jobs.set_error(id, "frame extraction failed: corrupt".into());

        let status = jobs.status(id).unwrap();
        assert_eq!(status.state, "failed");
        assert_eq!(status.error.as_deref(), Some("frame extraction failed: corrupt"));

        assert!(jobs.remove(id));
        assert!(!jobs.remove(id));
        assert_eq!(jobs.len(), 0);
    }

    #[test]
    fn test_status_serializes_to_json() {
        let jobs = JobRegistry::new();
        let id = JobId::new();
        jobs.insert(id, DeliveryMode::Batch);
        let json = serde_json::to_value(jobs.status(id).unwrap()).unwrap();
        assert_eq!(json["state"], "idle");
        assert_eq!(json["mode"], "batch");
        assert!(json["error"].is_null());
    }
}
