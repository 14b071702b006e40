//! Pure geometry over elements: bounds, distances, hit-testing and ordering.

use crate::shapes::{Element, Shape};
use kurbo::{Point, Rect};

/// Hit radius around a line, in world units.
pub const LINE_TOLERANCE: f64 = 15.0;
/// Hit radius around an arrow. Wider because the head widens the target.
pub const ARROW_TOLERANCE: f64 = 25.0;
/// Hit radius around every point and segment of a path.
pub const PATH_TOLERANCE: f64 = 20.0;

/// Bounding box of an element in world coordinates.
///
/// Box kinds return their stored frame. Segments and paths fold over their
/// points, so the result is always the current min/max envelope.
pub fn bounds_of(element: &Element) -> Rect {
    match &element.shape {
        Shape::Rectangle(f) | Shape::Ellipse(f) | Shape::Diamond(f) => f.as_rect(),
        Shape::Text(t) => t.frame.as_rect(),
        Shape::Image(i) => i.frame.as_rect(),
        Shape::Embed(e) => e.frame.as_rect(),
        Shape::Line(s) | Shape::Arrow(s) => Rect::from_points(s.start, s.end),
        Shape::Freehand(s) | Shape::EraserStroke(s) | Shape::LaserStroke(s) => {
            s.envelope().unwrap_or(Rect::ZERO)
        }
    }
}

/// Distance from a point to a line segment (a→b).
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = b - a;
    let pv = point - a;
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    point.distance(a + seg * t)
}

/// Whether `point` lies on a path within `tolerance`, checking every point
/// and every consecutive segment.
pub fn near_polyline(point: Point, points: &[Point], tolerance: f64) -> bool {
    points.iter().any(|p| p.distance(point) <= tolerance)
        || points
            .windows(2)
            .any(|w| point_to_segment_dist(point, w[0], w[1]) <= tolerance)
}

/// Closed containment test, so points on the border count as inside.
fn contains_inclusive(rect: Rect, point: Point) -> bool {
    point.x >= rect.x0 && point.x <= rect.x1 && point.y >= rect.y0 && point.y <= rect.y1
}

/// Check whether a world point hits an element.
///
/// Rotation is ignored: box kinds test against the axis-aligned frame.
pub fn hit_test(point: Point, element: &Element) -> bool {
    match &element.shape {
        Shape::Line(s) => point_to_segment_dist(point, s.start, s.end) <= LINE_TOLERANCE,
        Shape::Arrow(s) => point_to_segment_dist(point, s.start, s.end) <= ARROW_TOLERANCE,
        Shape::Freehand(s) | Shape::EraserStroke(s) | Shape::LaserStroke(s) => {
            near_polyline(point, &s.points, PATH_TOLERANCE)
        }
        _ => contains_inclusive(bounds_of(element), point),
    }
}

/// Sort key giving the strict paint order: zIndex, then id.
pub fn paint_order(a: &Element, b: &Element) -> std::cmp::Ordering {
    a.z_index.cmp(&b.z_index).then_with(|| a.id.cmp(&b.id))
}

/// Return the topmost element under `point`.
///
/// Scans from the highest paint order down and returns the first hit.
pub fn pick_topmost<'a, I>(point: Point, elements: I) -> Option<&'a Element>
where
    I: IntoIterator<Item = &'a Element>,
{
    let mut ordered: Vec<&Element> = elements.into_iter().collect();
    ordered.sort_by(|a, b| paint_order(b, a));
    ordered.into_iter().find(|e| hit_test(point, e))
}

/// Standard AABB overlap, touching edges included.
pub fn overlaps(a: Rect, b: Rect) -> bool {
    a.x0 <= b.x1 && b.x0 <= a.x1 && a.y0 <= b.y1 && b.y0 <= a.y1
}

/// Marquee test: the element's bounds overlap the query rectangle.
pub fn intersects_rect(element: &Element, query: Rect) -> bool {
    overlaps(bounds_of(element), query.abs())
}
