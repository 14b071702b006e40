//! Element definitions for the shared canvas.

mod frame;
mod freehand;
mod image;
mod line;
mod text;

pub use frame::Frame;
pub use freehand::Stroke;
pub use image::{Embed, Image};
pub use line::Segment;
pub use text::Text;

use crate::geometry;
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for elements.
///
/// Ids are opaque strings so that peers may mint them however they like;
/// locally created elements use a v4 UUID.
pub type ElementId = String;

/// Generate a fresh element id.
pub fn new_element_id() -> ElementId {
    Uuid::new_v4().to_string()
}

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }
}

/// Stroke pattern for outlines and paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokeStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

impl StrokeStyle {
    /// Cycle to the next stroke style.
    pub fn next(self) -> Self {
        match self {
            StrokeStyle::Solid => StrokeStyle::Dashed,
            StrokeStyle::Dashed => StrokeStyle::Dotted,
            StrokeStyle::Dotted => StrokeStyle::Solid,
        }
    }
}

/// Style properties for elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementStyle {
    /// Stroke color.
    pub stroke_color: Rgba,
    /// Fill color (None = no fill).
    #[serde(default)]
    pub fill_color: Option<Rgba>,
    /// Stroke width.
    pub stroke_width: f64,
    /// Stroke pattern.
    #[serde(default)]
    pub stroke_style: StrokeStyle,
    /// Overall opacity (0.0 = fully transparent, 1.0 = fully opaque).
    #[serde(default = "default_opacity")]
    pub opacity: f64,
}

fn default_opacity() -> f64 {
    1.0
}

impl ElementStyle {
    /// Set the opacity, clamped to `[0, 1]`.
    pub fn set_opacity(&mut self, opacity: f64) {
        self.opacity = if opacity.is_nan() { 1.0 } else { opacity.clamp(0.0, 1.0) };
    }
}

impl Default for ElementStyle {
    fn default() -> Self {
        Self {
            stroke_color: Rgba::black(),
            fill_color: None,
            stroke_width: 2.0,
            stroke_style: StrokeStyle::default(),
            opacity: 1.0,
        }
    }
}

/// The closed set of element kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementKind {
    Rectangle,
    Ellipse,
    Line,
    Arrow,
    Freehand,
    Text,
    Diamond,
    EraserStroke,
    Image,
    Embed,
    LaserStroke,
}

impl ElementKind {
    pub const ALL: [ElementKind; 11] = [
        ElementKind::Rectangle,
        ElementKind::Ellipse,
        ElementKind::Line,
        ElementKind::Arrow,
        ElementKind::Freehand,
        ElementKind::Text,
        ElementKind::Diamond,
        ElementKind::EraserStroke,
        ElementKind::Image,
        ElementKind::Embed,
        ElementKind::LaserStroke,
    ];

    /// Wire name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            ElementKind::Rectangle => "rectangle",
            ElementKind::Ellipse => "ellipse",
            ElementKind::Line => "line",
            ElementKind::Arrow => "arrow",
            ElementKind::Freehand => "freehand",
            ElementKind::Text => "text",
            ElementKind::Diamond => "diamond",
            ElementKind::EraserStroke => "eraser-stroke",
            ElementKind::Image => "image",
            ElementKind::Embed => "embed",
            ElementKind::LaserStroke => "laser-stroke",
        }
    }

    /// Kinds whose geometry is a point sequence with derived bounds.
    pub fn is_path(self) -> bool {
        matches!(
            self,
            ElementKind::Freehand | ElementKind::EraserStroke | ElementKind::LaserStroke
        )
    }

    /// Kinds defined by a start and an end point.
    pub fn is_segment(self) -> bool {
        matches!(self, ElementKind::Line | ElementKind::Arrow)
    }

    /// Kinds anchored to a stored `{x, y, width, height}` box.
    pub fn is_box(self) -> bool {
        !self.is_path() && !self.is_segment()
    }

    /// Render-only kinds that never enter a room's element log.
    pub fn is_ephemeral(self) -> bool {
        matches!(self, ElementKind::EraserStroke | ElementKind::LaserStroke)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown kind name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown element kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for ElementKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ElementKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// Kind-specific geometry and payload.
///
/// Each variant carries only what its kind needs; the kind of an element is
/// always derived from this enum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Shape {
    Rectangle(Frame),
    Ellipse(Frame),
    Diamond(Frame),
    Line(Segment),
    Arrow(Segment),
    Freehand(Stroke),
    EraserStroke(Stroke),
    LaserStroke(Stroke),
    Text(Text),
    Image(Image),
    Embed(Embed),
}

impl Shape {
    pub fn kind(&self) -> ElementKind {
        match self {
            Shape::Rectangle(_) => ElementKind::Rectangle,
            Shape::Ellipse(_) => ElementKind::Ellipse,
            Shape::Diamond(_) => ElementKind::Diamond,
            Shape::Line(_) => ElementKind::Line,
            Shape::Arrow(_) => ElementKind::Arrow,
            Shape::Freehand(_) => ElementKind::Freehand,
            Shape::EraserStroke(_) => ElementKind::EraserStroke,
            Shape::LaserStroke(_) => ElementKind::LaserStroke,
            Shape::Text(_) => ElementKind::Text,
            Shape::Image(_) => ElementKind::Image,
            Shape::Embed(_) => ElementKind::Embed,
        }
    }

    /// The stored box for box-anchored kinds.
    pub fn frame(&self) -> Option<&Frame> {
        match self {
            Shape::Rectangle(f) | Shape::Ellipse(f) | Shape::Diamond(f) => Some(f),
            Shape::Text(t) => Some(&t.frame),
            Shape::Image(i) => Some(&i.frame),
            Shape::Embed(e) => Some(&e.frame),
            _ => None,
        }
    }

    /// Mutable access to the stored box for box-anchored kinds.
    pub fn frame_mut(&mut self) -> Option<&mut Frame> {
        match self {
            Shape::Rectangle(f) | Shape::Ellipse(f) | Shape::Diamond(f) => Some(f),
            Shape::Text(t) => Some(&mut t.frame),
            Shape::Image(i) => Some(&mut i.frame),
            Shape::Embed(e) => Some(&mut e.frame),
            _ => None,
        }
    }

    /// The endpoints for line and arrow kinds.
    pub fn segment(&self) -> Option<&Segment> {
        match self {
            Shape::Line(s) | Shape::Arrow(s) => Some(s),
            _ => None,
        }
    }

    pub fn segment_mut(&mut self) -> Option<&mut Segment> {
        match self {
            Shape::Line(s) | Shape::Arrow(s) => Some(s),
            _ => None,
        }
    }

    /// The point sequence for path kinds.
    pub fn stroke(&self) -> Option<&Stroke> {
        match self {
            Shape::Freehand(s) | Shape::EraserStroke(s) | Shape::LaserStroke(s) => Some(s),
            _ => None,
        }
    }

    pub fn stroke_mut(&mut self) -> Option<&mut Stroke> {
        match self {
            Shape::Freehand(s) | Shape::EraserStroke(s) | Shape::LaserStroke(s) => Some(s),
            _ => None,
        }
    }

    /// Translate all geometry by `delta`.
    pub fn translate(&mut self, delta: Vec2) {
        if let Some(frame) = self.frame_mut() {
            frame.position += delta;
        } else if let Some(segment) = self.segment_mut() {
            segment.start += delta;
            segment.end += delta;
        } else if let Some(stroke) = self.stroke_mut() {
            for point in &mut stroke.points {
                *point += delta;
            }
        }
    }
}

/// A drawable element: geometry plus identity, ordering and style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,
    pub shape: Shape,
    /// Rotation in radians about the center of the bounds.
    #[serde(default)]
    pub angle: f64,
    pub style: ElementStyle,
    /// Locked elements reject local edits.
    #[serde(default)]
    pub locked: bool,
    /// Paint and hit-test ordering key (lowest is painted first).
    #[serde(default)]
    pub z_index: i64,
}

impl Element {
    /// Create a new element with a fresh id and default style.
    pub fn new(shape: Shape) -> Self {
        Self::with_id(new_element_id(), shape)
    }

    /// Create an element with a specific id (for peers and storage).
    pub fn with_id(id: impl Into<ElementId>, shape: Shape) -> Self {
        Self {
            id: id.into(),
            shape,
            angle: 0.0,
            style: ElementStyle::default(),
            locked: false,
            z_index: 0,
        }
    }

    pub fn kind(&self) -> ElementKind {
        self.shape.kind()
    }

    /// Bounding box in world coordinates.
    pub fn bounds(&self) -> Rect {
        geometry::bounds_of(self)
    }

    /// Check if a world point hits this element using the kernel tolerances.
    pub fn hit_test(&self, point: Point) -> bool {
        geometry::hit_test(point, self)
    }

    /// Whether a finished gesture produced something worth keeping.
    ///
    /// Boxes and segments need more than 1px of extent on some axis; paths
    /// need at least two points.
    pub fn is_degenerate(&self) -> bool {
        match &self.shape {
            Shape::Freehand(s) | Shape::EraserStroke(s) | Shape::LaserStroke(s) => s.len() <= 1,
            Shape::Line(s) | Shape::Arrow(s) => s.width().abs() <= 1.0 && s.height().abs() <= 1.0,
            Shape::Text(t) => t.content.is_empty(),
            shape => shape
                .frame()
                .map(|f| f.width.abs() <= 1.0 && f.height.abs() <= 1.0)
                .unwrap_or(true),
        }
    }
}
