/// Target sampling rate when the caller does not supply one.
pub const DEFAULT_FPS: u32 = 24;

/// Highest accepted sampling rate. Every sampled frame becomes a still on
/// disk, so the rate bounds the work a single job can create.
pub const MAX_FPS: u32 = 120;

pub const BLAZEFACE_MODEL_NAME: &str = "blazeface.onnx";

/// Environment variable consulted for the model download URL when no
/// explicit URL or local path is configured.
pub const BLAZEFACE_MODEL_URL_ENV: &str = "FACEMARK_MODEL_URL";

pub const FRAMES_DIR_NAME: &str = "frames";
pub const PROCESSED_FRAMES_DIR_NAME: &str = "processed_frames";
pub const OUTPUT_VIDEO_NAME: &str = "processed_video.mp4";

pub const FRAME_PREFIX: &str = "frame-";
pub const FRAME_EXTENSION: &str = "jpg";
/// Zero-padded width of the numeric part of a frame file name.
pub const FRAME_INDEX_WIDTH: usize = 4;

pub const DEFAULT_JPEG_QUALITY: u8 = 90;

pub const DEFAULT_CONFIDENCE: f32 = 0.5;

/// Corner arm length as a fraction of the shorter region side.
pub const CORNER_LENGTH_RATIO: f32 = 0.2;
pub const CORNER_STROKE_WIDTH: f32 = 5.0;
pub const CORNER_COLOR: [u8; 3] = [255, 255, 0];

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv", "avi", "webm", "m4v"];
