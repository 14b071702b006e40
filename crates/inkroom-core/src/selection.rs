//! Selection set and resize handle system.

use crate::geometry::bounds_of;
use crate::shapes::{Element, ElementId, Frame, Shape};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Handle size in screen pixels.
pub const HANDLE_SIZE: f64 = 8.0;
/// Smallest width or height a box can be resized to.
pub const MIN_ELEMENT_SIZE: f64 = 10.0;

/// Handle hit tolerance in world units for the given camera zoom.
pub fn handle_tolerance(zoom: f64) -> f64 {
    (HANDLE_SIZE / 2.0) / zoom
}

/// Type of resize handle.
///
/// Box kinds expose corners and edges; lines and arrows expose their two
/// endpoints. The two families are resized by separate code paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandleKind {
    Corner(Corner),
    Edge(Edge),
    /// Start point of a line or arrow.
    Start,
    /// End point of a line or arrow.
    End,
}

/// Corner positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Edge positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Edge {
    Top,
    Right,
    Bottom,
    Left,
}

/// A resize handle with its position and type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Handle {
    /// Position in world coordinates.
    pub position: Point,
    pub kind: HandleKind,
}

impl Handle {
    pub fn new(position: Point, kind: HandleKind) -> Self {
        Self { position, kind }
    }

    /// Check if a world point falls inside this handle's square.
    /// `half_size` should be adjusted for camera zoom.
    pub fn hit_test(&self, point: Point, half_size: f64) -> bool {
        (point.x - self.position.x).abs() <= half_size
            && (point.y - self.position.y).abs() <= half_size
    }
}

/// Get the resize handles for an element.
///
/// Path kinds have no handles.
pub fn resize_handles_for(element: &Element) -> Vec<Handle> {
    match &element.shape {
        Shape::Line(s) | Shape::Arrow(s) => vec![
            Handle::new(s.start, HandleKind::Start),
            Handle::new(s.end, HandleKind::End),
        ],
        Shape::Freehand(_) | Shape::EraserStroke(_) | Shape::LaserStroke(_) => Vec::new(),
        _ => box_handles(bounds_of(element)),
    }
}

/// Corner and edge-midpoint handles for a bounding rectangle.
fn box_handles(b: Rect) -> Vec<Handle> {
    let c = b.center();
    vec![
        Handle::new(Point::new(b.x0, b.y0), HandleKind::Corner(Corner::TopLeft)),
        Handle::new(Point::new(b.x1, b.y0), HandleKind::Corner(Corner::TopRight)),
        Handle::new(Point::new(b.x0, b.y1), HandleKind::Corner(Corner::BottomLeft)),
        Handle::new(Point::new(b.x1, b.y1), HandleKind::Corner(Corner::BottomRight)),
        Handle::new(Point::new(c.x, b.y0), HandleKind::Edge(Edge::Top)),
        Handle::new(Point::new(b.x1, c.y), HandleKind::Edge(Edge::Right)),
        Handle::new(Point::new(c.x, b.y1), HandleKind::Edge(Edge::Bottom)),
        Handle::new(Point::new(b.x0, c.y), HandleKind::Edge(Edge::Left)),
    ]
}

/// Find which handle (if any) is hit at the given point.
pub fn hit_test_handles(element: &Element, point: Point, half_size: f64) -> Option<HandleKind> {
    resize_handles_for(element)
        .into_iter()
        .find(|h| h.hit_test(point, half_size))
        .map(|h| h.kind)
}

/// Which side of an axis a handle drags.
#[derive(Clone, Copy)]
enum Side {
    Min,
    Max,
    Fixed,
}

fn sides(handle: HandleKind) -> (Side, Side) {
    match handle {
        HandleKind::Corner(Corner::TopLeft) => (Side::Min, Side::Min),
        HandleKind::Corner(Corner::TopRight) => (Side::Max, Side::Min),
        HandleKind::Corner(Corner::BottomLeft) => (Side::Min, Side::Max),
        HandleKind::Corner(Corner::BottomRight) => (Side::Max, Side::Max),
        HandleKind::Edge(Edge::Top) => (Side::Fixed, Side::Min),
        HandleKind::Edge(Edge::Right) => (Side::Max, Side::Fixed),
        HandleKind::Edge(Edge::Bottom) => (Side::Fixed, Side::Max),
        HandleKind::Edge(Edge::Left) => (Side::Min, Side::Fixed),
        HandleKind::Start | HandleKind::End => (Side::Fixed, Side::Fixed),
    }
}

/// Resize one axis: the side opposite the dragged one stays put. Crossing
/// over the anchor flips the box; the span never drops below the minimum.
fn resize_axis(min: f64, max: f64, side: Side, target: f64) -> (f64, f64) {
    let (anchor, span, default_sign) = match side {
        Side::Fixed => return (min, max),
        Side::Min => (max, target - max, -1.0),
        Side::Max => (min, target - min, 1.0),
    };
    let span = if span.abs() < MIN_ELEMENT_SIZE {
        let sign = if span == 0.0 { default_sign } else { span.signum() };
        MIN_ELEMENT_SIZE * sign
    } else {
        span
    };
    let other = anchor + span;
    (anchor.min(other), anchor.max(other))
}

/// Apply a handle drag to an element, returning the resized copy.
///
/// Box handles recompute the frame while holding the opposite corner or edge
/// fixed. Start/end handles move that endpoint directly. A handle that does
/// not belong to the element's family leaves it unchanged.
pub fn apply_resize(element: &Element, handle: HandleKind, new_point: Point) -> Element {
    let mut out = element.clone();
    match handle {
        HandleKind::Start | HandleKind::End => {
            if let Some(seg) = out.shape.segment_mut() {
                if handle == HandleKind::Start {
                    seg.start = new_point;
                } else {
                    seg.end = new_point;
                }
            }
        }
        HandleKind::Corner(_) | HandleKind::Edge(_) => {
            if let Some(frame) = out.shape.frame_mut() {
                let b = frame.as_rect();
                let (x_side, y_side) = sides(handle);
                let (x0, x1) = resize_axis(b.x0, b.x1, x_side, new_point.x);
                let (y0, y1) = resize_axis(b.y0, b.y1, y_side, new_point.y);
                *frame = Frame::new(Point::new(x0, y0), x1 - x0, y1 - y0);
            }
        }
    }
    out
}

/// How a selection request combines with the current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectMode {
    #[default]
    Replace,
    Toggle,
    Add,
}

/// The client-local set of selected element ids.
///
/// Holds ids only; the elements themselves live in the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    ids: BTreeSet<ElementId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply<I>(&mut self, ids: I, mode: SelectMode)
    where
        I: IntoIterator<Item = ElementId>,
    {
        match mode {
            SelectMode::Replace => self.ids = ids.into_iter().collect(),
            SelectMode::Add => self.ids.extend(ids),
            SelectMode::Toggle => {
                for id in ids {
                    if !self.ids.remove(&id) {
                        self.ids.insert(id);
                    }
                }
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.ids.remove(id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &ElementId> {
        self.ids.iter()
    }

    /// Drop ids for which `keep` returns false.
    pub fn retain(&mut self, mut keep: impl FnMut(&ElementId) -> bool) {
        self.ids.retain(|id| keep(id));
    }
}
