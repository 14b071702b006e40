//! Camera module for pan/zoom transforms.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 10.0;

/// View transform of the canvas.
///
/// `world = (screen - pan) / zoom`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Translation in screen pixels.
    pub pan: Vec2,
    pub zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            pan: Vec2::ZERO,
            zoom: 1.0,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    /// World to screen transform, for rendering.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.pan) * Affine::scale(self.zoom)
    }

    /// Screen to world transform, for input handling.
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.zoom) * Affine::translate(-self.pan)
    }

    pub fn screen_to_world(&self, screen_point: Point) -> Point {
        self.inverse_transform() * screen_point
    }

    pub fn world_to_screen(&self, world_point: Point) -> Point {
        self.transform() * world_point
    }

    /// Pan the camera by a delta in screen coordinates.
    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan += delta;
    }

    /// Zoom by `factor`, keeping the given screen point fixed.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) {
        let new_zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        if !new_zoom.is_finite() || (new_zoom - self.zoom).abs() < f64::EPSILON {
            return;
        }
        let world_point = self.screen_to_world(screen_point);
        self.zoom = new_zoom;
        let new_screen = self.world_to_screen(world_point);
        self.pan += screen_point - new_screen;
    }

    /// The visible world rectangle for a viewport of the given size.
    pub fn visible_world(&self, viewport: Size) -> Rect {
        let a = self.screen_to_world(Point::ZERO);
        let b = self.screen_to_world(Point::new(viewport.width, viewport.height));
        Rect::from_points(a, b)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
    }

    #[test]
    fn test_screen_world_formula() {
        let camera = Camera {
            pan: Vec2::new(100.0, 50.0),
            zoom: 2.0,
        };
        assert!(approx(camera.screen_to_world(Point::new(300.0, 250.0)), Point::new(100.0, 100.0)));
        assert!(approx(camera.world_to_screen(Point::new(100.0, 100.0)), Point::new(300.0, 250.0)));
    }

    #[test]
    fn test_zoom_at_keeps_point_fixed() {
        let mut camera = Camera::new();
        let anchor = Point::new(400.0, 300.0);
        let before = camera.screen_to_world(anchor);
        camera.zoom_at(anchor, 2.5);
        assert_eq!(camera.zoom, 2.5);
        assert!(approx(camera.screen_to_world(anchor), before));
    }

    #[test]
    fn test_zoom_clamped() {
        let mut camera = Camera::new();
        camera.zoom_at(Point::ZERO, 1000.0);
        assert_eq!(camera.zoom, MAX_ZOOM);
        camera.zoom_at(Point::ZERO, 0.0);
        assert_eq!(camera.zoom, MIN_ZOOM);
    }

    #[test]
    fn test_pan_by() {
        let mut camera = Camera::new();
        camera.pan_by(Vec2::new(10.0, -5.0));
        assert!(approx(camera.screen_to_world(Point::new(10.0, -5.0)), Point::ZERO));
    }
}
