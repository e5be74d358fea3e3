use crate::shared::face_region::FaceRegion;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// A straight stroke starting at `from`. Corner arms always start at the
/// rectangle corner and run along one edge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub from: Point,
    pub to: Point,
}

impl Segment {
    pub fn length(&self) -> f32 {
        (self.to.x - self.from.x).hypot(self.to.y - self.from.y)
    }

    pub fn is_horizontal(&self) -> bool {
        self.from.y == self.to.y
    }
}

/// An L-shaped marker: two arms meeting at `vertex`.
///
/// `arms[0]` runs vertically, `arms[1]` horizontally.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CornerMark {
    pub corner: Corner,
    pub vertex: Point,
    pub arms: [Segment; 2],
}

/// The four corner marks for a region, clockwise from top-left.
///
/// Returns `None` for degenerate regions.
pub fn corner_marks(region: &FaceRegion) -> Option<[CornerMark; 4]> {
    if region.is_degenerate() {
        return None;
    }
    let c = region.corner_length();
    let FaceRegion { x1, y1, x2, y2 } = *region;

    // (corner, vertex, vertical direction, horizontal direction)
    let layout = [
        (Corner::TopLeft, x1, y1, 1.0, 1.0),
        (Corner::TopRight, x2, y1, 1.0, -1.0),
        (Corner::BottomRight, x2, y2, -1.0, -1.0),
        (Corner::BottomLeft, x1, y2, -1.0, 1.0),
    ];
    Some(layout.map(|(corner, x, y, dy, dx)| {
        let vertex = Point { x, y };
        CornerMark {
            corner,
            vertex,
            arms: [
                Segment {
                    from: vertex,
                    to: Point { x, y: y + dy * c },
                },
                Segment {
                    from: vertex,
                    to: Point { x: x + dx * c, y },
                },
            ],
        }
    }))
}
