use std::str::FromStr;
use std::time::Duration;

use crate::shared::constants::{DEFAULT_CONFIDENCE, DEFAULT_FPS, DEFAULT_JPEG_QUALITY};

use super::video_job::DeliveryMode;

/// Which annotated frames are kept.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RetentionPolicy {
    /// Every frame is persisted and pushed; the output keeps full length.
    #[default]
    AllFrames,
    /// Frames without detections are neither persisted nor pushed.
    /// Survivors keep their original index, so the output is shorter.
    DetectedOnly,
}

impl FromStr for RetentionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "all-frames" => Ok(Self::AllFrames),
            "detected" | "detected-only" => Ok(Self::DetectedOnly),
            other => Err(format!("unknown retention policy '{other}' (expected all or detected)")),
        }
    }
}

/// Where each annotated frame goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameDelivery {
    PersistOnly,
    PersistAndPush,
    PushOnly,
}

impl FrameDelivery {
    pub fn persists(self) -> bool {
        !matches!(self, Self::PushOnly)
    }

    pub fn pushes(self) -> bool {
        !matches!(self, Self::PersistOnly)
    }
}

/// Knobs shared by every job a front end runs.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Sampling rate used when a request does not name one.
    pub fps: u32,
    /// Minimum detector score for a face to count.
    pub confidence: f32,
    pub retention: RetentionPolicy,
    /// Whether live jobs also write annotated frames to disk.
    pub live_persist: bool,
    pub jpeg_quality: u8,
    /// Deadline applied separately to extraction, frame processing and remux.
    pub stage_timeout: Option<Duration>,
    /// How long a live job waits for its subscriber before the first frame.
    pub live_attach_timeout: Duration,
    /// Keep the working directory of failed jobs for inspection.
    pub keep_workdir: bool,
}

impl PipelineConfig {
    pub fn delivery_for(&self, mode: DeliveryMode) -> FrameDelivery {
        match (mode, self.live_persist) {
            (DeliveryMode::Batch, _) => FrameDelivery::PersistOnly,
            (DeliveryMode::Live, true) => FrameDelivery::PersistAndPush,
            (DeliveryMode::Live, false) => FrameDelivery::PushOnly,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            confidence: DEFAULT_CONFIDENCE,
            retention: RetentionPolicy::AllFrames,
            live_persist: true,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            stage_timeout: None,
            live_attach_timeout: Duration::from_secs(5),
            keep_workdir: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(DeliveryMode::Batch, true, FrameDelivery::PersistOnly)]
    #[case(DeliveryMode::Batch, false, FrameDelivery::PersistOnly)]
    #[case(DeliveryMode::Live, true, FrameDelivery::PersistAndPush)]
    #[case(DeliveryMode::Live, false, FrameDelivery::PushOnly)]
    fn test_delivery_for_mode(
        #[case] mode: DeliveryMode,
        #[case] live_persist: bool,
        #[case] expected: FrameDelivery,
    ) {
        let config = PipelineConfig {
            live_persist,
            ..PipelineConfig::default()
        };
        assert_eq!(config.delivery_for(mode), expected);
    }

    #[test]
    fn test_delivery_flags() {
        assert!(FrameDelivery::PersistOnly.persists());
        assert!(!FrameDelivery::PersistOnly.pushes());
        assert!(FrameDelivery::PersistAndPush.persists() && FrameDelivery::PersistAndPush.pushes());
        assert!(!FrameDelivery::PushOnly.persists());
    }

    #[rstest]
    #[case("all", RetentionPolicy::AllFrames)]
    #[case("Detected", RetentionPolicy::DetectedOnly)]
    #[case("detected-only", RetentionPolicy::DetectedOnly)]
    fn test_retention_parse(#[case] input: &str, #[case] expected: RetentionPolicy) {
        assert_eq!(input.parse::<RetentionPolicy>().unwrap(), expected);
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.fps, 24);
        assert_eq!(config.retention, RetentionPolicy::AllFrames);
        assert!(config.live_persist);
        assert!(!config.keep_workdir);
    }
}
