use std::path::{Path, PathBuf};

use crate::shared::error::PipelineError;
use crate::shared::stage_control::StageControl;

/// Samples a source video at a fixed rate into numbered stills.
///
/// Implementations write `frame-0001.jpg`, `frame-0002.jpg`, ... into
/// `frames_dir` (created if absent) with gap-free indices starting at 1,
/// and return the directory. Every failure is reported as
/// [`PipelineError::Extraction`], except cancellation and timeout.
pub trait FrameExtractor: Send + Sync {
    fn extract(
        &self,
        source: &Path,
        frames_dir: &Path,
        fps: u32,
        control: &StageControl,
    ) -> Result<PathBuf, PipelineError>;
}
