use image::Rgb;
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

use crate::annotation::domain::corner_mark::{corner_marks, Segment};
use crate::annotation::domain::frame_annotator::{AnnotationError, FrameAnnotator};
use crate::shared::constants::{CORNER_COLOR, CORNER_STROKE_WIDTH, DEFAULT_JPEG_QUALITY};
use crate::shared::face_region::FaceRegion;
use crate::shared::frame::Frame;
use crate::shared::jpeg;

/// Strokes yellow L-shaped corner marks with imageproc and encodes to JPEG.
///
/// All arms are axis-aligned, so each stroke is drawn as a filled
/// rectangle: ±width/2 across the arm, butt cap at the free end, and
/// extended by width/2 past the vertex to form the mitred join. Pixels are
/// covered when their centre falls inside the rectangle.
pub struct CornerMarkAnnotator {
    stroke_width: f32,
    color: [u8; 3],
    jpeg_quality: u8,
}

impl CornerMarkAnnotator {
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            stroke_width: CORNER_STROKE_WIDTH,
            color: CORNER_COLOR,
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    /// Draws every non-degenerate region; returns how many were drawn.
    pub fn draw(&self, frame: &mut Frame, regions: &[FaceRegion]) -> usize {
        let index = frame.index();
        let Some(mut canvas) = frame.as_image_mut() else {
            log::warn!("Frame {index} buffer does not match its dimensions; not annotated");
            return 0;
        };
        let color = Rgb(self.color);
        let mut drawn = 0;
        for region in regions {
            let Some(marks) = corner_marks(region) else {
                log::debug!("Skipping degenerate region {region:?} on frame {index}");
                continue;
            };
            for mark in &marks {
                for arm in &mark.arms {
                    if let Some(rect) = self.arm_rect(arm, canvas.width(), canvas.height()) {
                        draw_filled_rect_mut(&mut canvas, rect, color);
                    }
                }
            }
            drawn += 1;
        }
        drawn
    }

    /// Pixel rectangle covered by one arm, or `None` when it lies off-frame.
    fn arm_rect(&self, seg: &Segment, width: u32, height: u32) -> Option<Rect> {
        let hw = self.stroke_width / 2.0;
        let (x0, y0, x1, y1) = if seg.is_horizontal() {
            let (lo, hi) = extend_at_vertex(seg.from.x, seg.to.x, hw);
            (lo, seg.from.y - hw, hi, seg.from.y + hw)
        } else {
            let (lo, hi) = extend_at_vertex(seg.from.y, seg.to.y, hw);
            (seg.from.x - hw, lo, seg.from.x + hw, hi)
        };

        let (px0, px1) = pixel_span(x0, x1, width);
        let (py0, py1) = pixel_span(y0, y1, height);
        (px0 < px1 && py0 < py1)
            .then(|| Rect::at(px0 as i32, py0 as i32).of_size(px1 - px0, py1 - py0))
    }
}

impl Default for CornerMarkAnnotator {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl FrameAnnotator for CornerMarkAnnotator {
    fn annotate(
        &self,
        frame: &mut Frame,
        regions: &[FaceRegion],
    ) -> Result<Vec<u8>, AnnotationError> {
        self.draw(frame, regions);
        Ok(jpeg::encode(frame, self.jpeg_quality)?)
    }
}

/// Orders the arm's extent along its axis and pushes the vertex end
/// (`from`) outward by `hw`.
fn extend_at_vertex(from: f32, to: f32, hw: f32) -> (f32, f32) {
    if to >= from {
        (from - hw, to)
    } else {
        (to, from + hw)
    }
}

/// Half-open pixel range whose centres lie in `[lo, hi)`, clipped to `[0, limit)`.
fn pixel_span(lo: f32, hi: f32, limit: u32) -> (u32, u32) {
    let clip = |v: f32| (v - 0.5).ceil().clamp(0.0, limit as f32) as u32;
    (clip(lo), clip(hi))
}
