use crate::shared::constants::CORNER_LENGTH_RATIO;

/// A detected face bound in frame pixel space.
///
/// `(x1, y1)` is the top-left corner, `(x2, y2)` the bottom-right.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceRegion {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl FaceRegion {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// True when there is nothing to draw: non-positive width or height,
    /// or a NaN coordinate.
    pub fn is_degenerate(&self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }

    /// Arm length of each corner mark.
    pub fn corner_length(&self) -> f32 {
        self.width().min(self.height()) * CORNER_LENGTH_RATIO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_dimensions() {
        let r = FaceRegion::new(10.0, 20.0, 110.0, 70.0);
        assert_relative_eq!(r.width(), 100.0);
        assert_relative_eq!(r.height(), 50.0);
    }

    #[test]
    fn test_corner_length_uses_shorter_side() {
        let r = FaceRegion::new(0.0, 0.0, 200.0, 50.0);
        assert_relative_eq!(r.corner_length(), 10.0);
    }

    #[test]
    fn test_square_region_corner_length() {
        let r = FaceRegion::new(10.0, 10.0, 110.0, 110.0);
        assert_relative_eq!(r.corner_length(), 20.0);
    }

    #[rstest]
    #[case::zero_width(FaceRegion::new(5.0, 5.0, 5.0, 50.0), true)]
    #[case::zero_height(FaceRegion::new(5.0, 5.0, 50.0, 5.0), true)]
    #[case::inverted(FaceRegion::new(50.0, 50.0, 10.0, 10.0), true)]
    #[case::nan(FaceRegion::new(f32::NAN, 0.0, 10.0, 10.0), true)]
    #[case::regular(FaceRegion::new(0.0, 0.0, 1.0, 1.0), false)]
    fn test_degenerate(#[case] region: FaceRegion, #[case] expected: bool) {
        assert_eq!(region.is_degenerate(), expected);
    }
}
