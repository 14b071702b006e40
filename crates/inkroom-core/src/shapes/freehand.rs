//! Point-sequence geometry shared by freehand, eraser and laser strokes.

use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// An ordered series of points. Bounds are always derived from the points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub points: Vec<Point>,
}

impl Stroke {
    /// Create a new empty stroke.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a stroke at a single point.
    pub fn starting_at(point: Point) -> Self {
        Self {
            points: vec![point],
        }
    }

    pub fn from_points(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Add a point to the path.
    pub fn add_point(&mut self, point: Point) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Min/max envelope of the points, or `None` for an empty stroke.
    pub fn envelope(&self) -> Option<Rect> {
        let first = self.points.first()?;
        let init = Rect::from_points(*first, *first);
        Some(
            self.points
                .iter()
                .skip(1)
                .fold(init, |acc, p| acc.union_pt(*p)),
        )
    }
}
