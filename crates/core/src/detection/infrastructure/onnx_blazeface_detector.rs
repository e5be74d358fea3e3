//! BlazeFace (short-range) face detection through ONNX Runtime.
use std::path::{Path, PathBuf};

use crate::detection::domain::face_detector::{DetectorFactory, FaceDetector};
use crate::shared::face_region::FaceRegion;
use crate::shared::frame::Frame;

use super::execution_provider::preferred_execution_providers;

/// BlazeFace model input resolution.
const INPUT_SIZE: usize = 128;

const NMS_IOU_THRESH: f32 = 0.3;

/// 16×16 grid × 2 anchors + 8×8 grid × 6 anchors.
const NUM_ANCHORS: usize = 896;

/// Values per anchor in the regressor output: box (4) + 6 keypoints (12).
const REGRESSOR_STRIDE: usize = 16;

/// Bounding-box-only detector; keypoints in the regressor output are ignored.
pub struct OnnxBlazefaceDetector {
    session: ort::session::Session,
    confidence: f32,
    anchors: Vec<[f32; 2]>,
}

impl OnnxBlazefaceDetector {
    pub fn new(model_path: &Path, confidence: f32) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;
        Ok(Self {
            session,
            confidence,
            anchors: generate_anchors(),
        })
    }
}

impl FaceDetector for OnnxBlazefaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceRegion>, Box<dyn std::error::Error>> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err("cannot run detection on an empty frame".into());
        }

        let input = ort::value::Tensor::from_array(preprocess(frame))?;
        let outputs = self.session.run(ort::inputs![input])?;

        // regressors: [1, 896, 16], classificators: [1, 896, 1]
        if outputs.len() < 2 {
            return Err(
                format!("BlazeFace model expected 2 outputs, got {}", outputs.len()).into(),
            );
        }
        let regressors = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let reg = regressors.as_slice().ok_or("regressor tensor is not contiguous")?;
        let scores = scores.as_slice().ok_or("score tensor is not contiguous")?;

        let mut candidates = decode(
            reg,
            scores,
            &self.anchors,
            self.confidence,
            frame.width() as f32,
            frame.height() as f32,
        );
        Ok(nms(&mut candidates, NMS_IOU_THRESH)
            .into_iter()
            .map(|c| c.region)
            .collect())
    }
}

/// Creates one [`OnnxBlazefaceDetector`] per job from a resolved model file.
pub struct OnnxBlazefaceFactory {
    model_path: PathBuf,
    confidence: f32,
}

impl OnnxBlazefaceFactory {
    pub fn new(model_path: PathBuf, confidence: f32) -> Self {
        Self {
            model_path,
            confidence,
        }
    }
}

impl DetectorFactory for OnnxBlazefaceFactory {
    fn create(&self) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
        log::debug!("Loading BlazeFace model from {}", self.model_path.display());
        Ok(Box::new(OnnxBlazefaceDetector::new(
            &self.model_path,
            self.confidence,
        )?))
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Nearest-neighbour resize to 128×128, normalized to [0,1], NCHW float32.
fn preprocess(frame: &Frame) -> ndarray::Array4<f32> {
    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let s = INPUT_SIZE;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, s, s));
    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as usize).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }
    tensor
}

/// Anchor centres for the short-range model: strides 8 and 16 with 2 and
/// 6 anchors per cell.
fn generate_anchors() -> Vec<[f32; 2]> {
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);
    for (stride, per_cell) in [(8usize, 2usize), (16, 6)] {
        let grid = INPUT_SIZE / stride;
        for y in 0..grid {
            for x in 0..grid {
                let centre = [
                    (x as f32 + 0.5) / grid as f32,
                    (y as f32 + 0.5) / grid as f32,
                ];
                anchors.extend(std::iter::repeat(centre).take(per_cell));
            }
        }
    }
    anchors
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct Candidate {
    region: FaceRegion,
    score: f32,
}

fn decode(
    reg: &[f32],
    scores: &[f32],
    anchors: &[[f32; 2]],
    confidence: f32,
    frame_w: f32,
    frame_h: f32,
) -> Vec<Candidate> {
    let size = INPUT_SIZE as f32;
    let mut out = Vec::new();

    for (i, (&raw, anchor)) in scores.iter().zip(anchors).enumerate() {
        let score = sigmoid(raw);
        if score < confidence {
            continue;
        }
        let o = i * REGRESSOR_STRIDE;
        let Some(b) = reg.get(o..o + 4) else {
            break;
        };

        let cx = anchor[0] + b[0] / size;
        let cy = anchor[1] + b[1] / size;
        let w = b[2] / size;
        let h = b[3] / size;

        out.push(Candidate {
            region: FaceRegion::new(
                ((cx - w / 2.0) * frame_w).max(0.0),
                ((cy - h / 2.0) * frame_h).max(0.0),
                ((cx + w / 2.0) * frame_w).min(frame_w),
                ((cy + h / 2.0) * frame_h).min(frame_h),
            ),
            score,
        });
    }
    out
}

fn nms(candidates: &mut [Candidate], iou_thresh: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<Candidate> = Vec::new();
    for c in candidates.iter() {
        if keep.iter().all(|k| iou(&k.region, &c.region) <= iou_thresh) {
            keep.push(c.clone());
        }
    }
    keep
}

fn iou(a: &FaceRegion, b: &FaceRegion) -> f32 {
    let iw = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0.0);
    let ih = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0.0);
    let inter = iw * ih;
    if inter == 0.0 {
        return 0.0;
    }
    inter / (a.width() * a.height() + b.width() * b.height() - inter)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
