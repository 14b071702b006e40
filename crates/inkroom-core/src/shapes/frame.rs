//! Stored box geometry for rectangles, ellipses, diamonds, text, images and embeds.

use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// An `{x, y, width, height}` box. Width and height may be negative on the
/// wire; [`Frame::as_rect`] always yields a normalized rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Top-left corner position.
    pub position: Point,
    pub width: f64,
    pub height: f64,
}

impl Frame {
    pub fn new(position: Point, width: f64, height: f64) -> Self {
        Self {
            position,
            width,
            height,
        }
    }

    /// Create a frame from two corner points.
    pub fn from_corners(p1: Point, p2: Point) -> Self {
        let min_x = p1.x.min(p2.x);
        let min_y = p1.y.min(p2.y);
        let width = (p2.x - p1.x).abs();
        let height = (p2.y - p1.y).abs();

        Self::new(Point::new(min_x, min_y), width, height)
    }

    /// Get the frame as a normalized kurbo Rect.
    pub fn as_rect(&self) -> Rect {
        Rect::from_origin_size(self.position, (self.width, self.height)).abs()
    }

    pub fn center(&self) -> Point {
        self.as_rect().center()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_corners_normalizes() {
        let frame = Frame::from_corners(Point::new(60.0, 40.0), Point::new(10.0, 0.0));
        assert_eq!(frame.position, Point::new(10.0, 0.0));
        assert_eq!(frame.width, 50.0);
        assert_eq!(frame.height, 40.0);
    }

    #[test]
    fn test_negative_extent_rect() {
        let frame = Frame::new(Point::new(10.0, 10.0), -5.0, 20.0);
        assert_eq!(frame.as_rect(), Rect::new(5.0, 10.0, 10.0, 30.0));
    }
}
