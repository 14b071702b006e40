//! Tool system for the canvas.

mod laser;

pub use laser::{LASER_FADE, LaserTrail, LaserTrails};

use crate::shapes::{Element, ElementStyle, Frame, Segment, Shape, Stroke, Text};
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ToolKind {
    #[default]
    Select,
    Hand,
    Rectangle,
    Ellipse,
    Diamond,
    Line,
    Arrow,
    Freehand,
    Text,
    Eraser,
    Laser,
}

impl ToolKind {
    /// Tools that draw a new element by dragging.
    pub fn is_shape_tool(self) -> bool {
        matches!(
            self,
            ToolKind::Rectangle
                | ToolKind::Ellipse
                | ToolKind::Diamond
                | ToolKind::Line
                | ToolKind::Arrow
                | ToolKind::Freehand
        )
    }
}

/// Manages the current tool and the style applied to new elements.
#[derive(Debug, Clone, Default)]
pub struct ToolManager {
    pub current_tool: ToolKind,
    /// Keep the tool after drawing instead of returning to select.
    pub tool_lock: bool,
    pub current_style: ElementStyle,
}

impl ToolManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_tool(&mut self, tool: ToolKind) {
        self.current_tool = tool;
    }

    pub fn toggle_lock(&mut self) {
        self.tool_lock = !self.tool_lock;
    }

    /// Geometry for the current shape tool dragged from `start` to `end`.
    ///
    /// Freehand starts as a single-point stroke; later points are appended
    /// by the caller.
    pub fn create_shape(&self, start: Point, end: Point) -> Option<Shape> {
        let shape = match self.current_tool {
            ToolKind::Rectangle => Shape::Rectangle(Frame::from_corners(start, end)),
            ToolKind::Ellipse => Shape::Ellipse(Frame::from_corners(start, end)),
            ToolKind::Diamond => Shape::Diamond(Frame::from_corners(start, end)),
            ToolKind::Line => Shape::Line(Segment::new(start, end)),
            ToolKind::Arrow => Shape::Arrow(Segment::new(start, end)),
            ToolKind::Freehand => Shape::Freehand(Stroke::starting_at(start)),
            ToolKind::Text => Shape::Text(Text::new(start, String::new())),
            _ => return None,
        };
        Some(shape)
    }

    /// A new element for the current tool, styled with the current style.
    pub fn create_element(&self, start: Point, end: Point) -> Option<Element> {
        let mut element = Element::new(self.create_shape(start, end)?);
        element.style = self.current_style.clone();
        Some(element)
    }
}
