use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::delivery::live_channel::LiveChannel;
use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::annotated_frame::AnnotatedFrame;
use crate::shared::error::PipelineError;
use crate::shared::frame::Frame;
use crate::shared::frame_name::frame_path;
use crate::shared::jpeg;
use crate::shared::stage_control::StageControl;

use super::pipeline_config::{FrameDelivery, RetentionPolicy};
use super::pipeline_logger::PipelineLogger;

const STAGE: &str = "frame processing";

/// Frames decoded ahead of the detector. Bounds memory to a constant
/// number of frames regardless of video length.
const LOADER_CAPACITY: usize = 4;

type Loaded = Result<(Vec<u8>, Frame), PipelineError>;

/// Counters reported once every frame has been handled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameLoopSummary {
    pub frames_seen: u32,
    pub frames_delivered: u32,
    pub frames_with_faces: u32,
    pub detection_errors: u32,
}

/// Runs detect → annotate → deliver over extracted frames in index order.
///
/// A loader thread reads and decodes the next frames through a bounded
/// channel while the calling thread handles them one at a time.
pub struct FrameLoop<'a> {
    pub detector: &'a mut dyn FaceDetector,
    pub annotator: &'a dyn FrameAnnotator,
    pub delivery: FrameDelivery,
    pub retention: RetentionPolicy,
    pub processed_dir: &'a Path,
    pub live: Option<&'a LiveChannel>,
    pub control: &'a StageControl,
    pub logger: &'a mut dyn PipelineLogger,
}

impl FrameLoop<'_> {
    /// `frames` must be sorted by index.
    pub fn run(mut self, frames: Vec<(u32, PathBuf)>) -> Result<FrameLoopSummary, PipelineError> {
        let total = frames.len();
        let control = self.control;

        std::thread::scope(|scope| {
            let (tx, rx) = crossbeam_channel::bounded::<Loaded>(LOADER_CAPACITY);
            scope.spawn(move || load_frames(frames, tx, control));
            // `rx` is dropped when `consume` returns, which stops the loader
            // early on failure.
            self.consume(rx, total)
        })
    }

    fn consume(
        &mut self,
        rx: crossbeam_channel::Receiver<Loaded>,
        total: usize,
    ) -> Result<FrameLoopSummary, PipelineError> {
        let mut summary = FrameLoopSummary::default();

        for loaded in rx {
            self.control.check(STAGE)?;
            let (original, frame) = loaded?;
            summary.frames_seen += 1;

            if let Some(annotated) = self.process(original, frame, &mut summary)? {
                self.deliver(annotated)?;
                summary.frames_delivered += 1;
            }
            self.logger.progress(summary.frames_seen as usize, total);
        }

        // The loader stops quietly on cancellation; surface it here.
        self.control.check(STAGE)?;
        Ok(summary)
    }

    /// Detects and annotates one frame. `None` when retention drops it.
    ///
    /// The decoded frame is consumed here so its pixel buffer is released
    /// before delivery, on every path.
    fn process(
        &mut self,
        original: Vec<u8>,
        mut frame: Frame,
        summary: &mut FrameLoopSummary,
    ) -> Result<Option<AnnotatedFrame>, PipelineError> {
        let index = frame.index();

        let t0 = Instant::now();
        let mut regions = match self.detector.detect(&frame) {
            Ok(regions) => regions,
            Err(e) => {
                let err = PipelineError::Detection {
                    index,
                    message: e.to_string(),
                };
                log::warn!("{err}; treating frame as empty");
                summary.detection_errors += 1;
                Vec::new()
            }
        };
        self.logger.timing("detect", ms_since(t0));

        let detected = regions.len();
        regions.retain(|r| !r.is_degenerate());
        if regions.len() < detected {
            log::debug!(
                "Frame {index}: ignoring {} degenerate regions",
                detected - regions.len()
            );
        }
        self.logger.metric("regions", regions.len() as f64);

        if regions.is_empty() {
            drop(frame);
            if self.retention == RetentionPolicy::DetectedOnly {
                log::debug!("Frame {index}: no faces, dropped by retention policy");
                return Ok(None);
            }
            // Untouched frames go out byte-for-byte as extracted.
            return Ok(Some(AnnotatedFrame::new(index, original, 0)));
        }

        summary.frames_with_faces += 1;
        let t0 = Instant::now();
        let encoded = self
            .annotator
            .annotate(&mut frame, &regions)
            .map_err(|e| PipelineError::Annotation {
                index,
                message: e.to_string(),
            })?;
        self.logger.timing("annotate", ms_since(t0));
        Ok(Some(AnnotatedFrame::new(index, encoded, regions.len())))
    }

    fn deliver(&mut self, annotated: AnnotatedFrame) -> Result<(), PipelineError> {
        let t0 = Instant::now();
        let AnnotatedFrame {
            index,
            encoded,
            region_count,
        } = annotated;
        if self.delivery.persists() {
            let path = frame_path(self.processed_dir, index);
            std::fs::write(&path, &encoded).map_err(|e| PipelineError::io(&path, e))?;
        }
        if self.delivery.pushes() {
            if let Some(live) = self.live {
                if !live.push(index, encoded) {
                    log::debug!("Frame {index} ({region_count} regions) not delivered live");
                }
            }
        }
        self.logger.timing("deliver", ms_since(t0));
        Ok(())
    }
}

fn load_frames(
    frames: Vec<(u32, PathBuf)>,
    tx: crossbeam_channel::Sender<Loaded>,
    control: &StageControl,
) {
    for (index, path) in frames {
        if control.is_cancelled() {
            break;
        }
        let loaded = std::fs::read(&path)
            .map_err(|e| PipelineError::io(&path, e))
            .and_then(|bytes| {
                let frame = jpeg::decode(&bytes, index).map_err(|e| {
                    PipelineError::io(
                        &path,
                        std::io::Error::new(std::io::ErrorKind::InvalidData, e),
                    )
                })?;
                Ok((bytes, frame))
            });
        let failed = loaded.is_err();
        if tx.send(loaded).is_err() || failed {
            break;
        }
    }
}

fn ms_since(t0: Instant) -> f64 {
    t0.elapsed().as_secs_f64() * 1000.0
}
