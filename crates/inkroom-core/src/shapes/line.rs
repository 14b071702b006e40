//! Two-point geometry for lines and arrows.

use kurbo::{Line as KurboLine, Point};
use serde::{Deserialize, Serialize};

/// A straight segment from `start` to `end`.
///
/// Width and height are derived as `end - start` and may be negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

impl Segment {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    /// Signed horizontal extent.
    pub fn width(&self) -> f64 {
        self.end.x - self.start.x
    }

    /// Signed vertical extent.
    pub fn height(&self) -> f64 {
        self.end.y - self.start.y
    }

    /// Get the length of the segment.
    pub fn length(&self) -> f64 {
        self.start.distance(self.end)
    }

    /// Get the midpoint of the segment.
    pub fn midpoint(&self) -> Point {
        self.start.midpoint(self.end)
    }

    pub fn as_kurbo(&self) -> KurboLine {
        KurboLine::new(self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_extent() {
        let seg = Segment::new(Point::new(50.0, 10.0), Point::new(20.0, 40.0));
        assert_eq!(seg.width(), -30.0);
        assert_eq!(seg.height(), 30.0);
        assert_eq!(seg.midpoint(), Point::new(35.0, 25.0));
    }
}
