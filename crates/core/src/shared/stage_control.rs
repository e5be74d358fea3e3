use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::shared::error::PipelineError;

/// Cancellation flag and deadline handed to each long-running stage.
///
/// The flag is shared by every stage of a job; the deadline is per stage.
/// Stages poll [`StageControl::check`] between units of work (packets,
/// frames) and abandon the stage when it fails.
#[derive(Clone, Debug, Default)]
pub struct StageControl {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl StageControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shares an externally owned cancellation flag.
    pub fn with_flag(cancelled: Arc<AtomicBool>) -> Self {
        Self {
            cancelled,
            deadline: None,
        }
    }

    /// A copy sharing the same flag whose deadline starts now.
    pub fn for_stage(&self, timeout: Option<Duration>) -> Self {
        Self {
            cancelled: Arc::clone(&self.cancelled),
            deadline: timeout.map(|t| Instant::now() + t),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn check(&self, stage: &'static str) -> Result<(), PipelineError> {
        if self.is_cancelled() {
            return Err(PipelineError::Cancelled { stage });
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(PipelineError::Timeout { stage }),
            _ => Ok(()),
        }
    }
}
