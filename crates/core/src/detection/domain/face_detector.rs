use crate::shared::face_region::FaceRegion;
use crate::shared::frame::Frame;

/// Domain interface for face detection.
///
/// Inference sessions are generally not re-entrant, hence `&mut self`.
/// One detector serves every frame of a single job.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceRegion>, Box<dyn std::error::Error>>;
}

/// Loads a detection model and hands out a ready detector.
///
/// Shared across concurrent jobs; each job calls `create` exactly once
/// before its first frame.
pub trait DetectorFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>>;
}
