use std::path::{Path, PathBuf};

use crate::shared::error::PipelineError;
use crate::shared::stage_control::StageControl;

/// Encodes the numbered stills in a directory back into a video.
///
/// Frames are read in numeric index order; gaps are allowed. An empty
/// directory yields [`PipelineError::NoFrames`] and no output file.
pub trait FrameRemuxer: Send + Sync {
    fn remux(
        &self,
        frames_dir: &Path,
        output_path: &Path,
        fps: u32,
        control: &StageControl,
    ) -> Result<PathBuf, PipelineError>;
}
