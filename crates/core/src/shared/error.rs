use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by the frame pipeline.
///
/// `Detection` and `Delivery` are logged where they happen and never end a
/// job; every other variant does.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("no video supplied")]
    UploadMissing,
    #[error("frame extraction failed: {0}")]
    Extraction(String),
    #[error("no processed frames found in {0} to rebuild the video")]
    NoFrames(PathBuf),
    #[error("video remux failed: {0}")]
    Remux(String),
    #[error("face detection failed on frame {index}: {message}")]
    Detection { index: u32, message: String },
    #[error("live delivery failed: {0}")]
    Delivery(String),
    #[error("failed to load detection model: {0}")]
    ModelLoad(String),
    #[error("annotation failed on frame {index}: {message}")]
    Annotation { index: u32, message: String },
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{stage} cancelled")]
    Cancelled { stage: &'static str },
    #[error("{stage} exceeded its deadline")]
    Timeout { stage: &'static str },
    #[error("job cannot move from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors caused by the caller's input rather than the system.
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::UploadMissing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_human_readable() {
        let err = PipelineError::NoFrames(PathBuf::from("/work/processed_frames"));
        assert_eq!(
            err.to_string(),
            "no processed frames found in /work/processed_frames to rebuild the video"
        );
        assert_eq!(
            PipelineError::Cancelled { stage: "extraction" }.to_string(),
            "extraction cancelled"
        );
    }

    #[test]
    fn test_only_upload_missing_is_user_error() {
        assert!(PipelineError::UploadMissing.is_user_error());
        assert!(!PipelineError::Extraction("x".into()).is_user_error());
    }
}
