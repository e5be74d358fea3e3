use thiserror::Error;

use crate::shared::face_region::FaceRegion;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum AnnotationError {
    #[error("failed to encode frame: {0}")]
    Encode(#[from] image::ImageError),
}

/// Draws face markers onto a frame and re-encodes it.
///
/// The frame is modified in place; the returned bytes are the encoded
/// still of the modified frame. With no regions the pixels are untouched.
pub trait FrameAnnotator: Send + Sync {
    fn annotate(&self, frame: &mut Frame, regions: &[FaceRegion]) -> Result<Vec<u8>, AnnotationError>;
}
