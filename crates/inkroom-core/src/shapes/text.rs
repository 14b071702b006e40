//! Text payload.

use super::Frame;
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Average glyph advance as a fraction of the font size.
const CHAR_WIDTH_RATIO: f64 = 0.55;
/// Line height as a multiple of the font size.
const LINE_HEIGHT: f64 = 1.2;
/// Smallest width an empty text box is given so it remains clickable.
const MIN_TEXT_WIDTH: f64 = 20.0;

/// A text element: the frame is kept in step with the content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    pub frame: Frame,
    pub content: String,
    /// Font size in pixels.
    pub font_size: f64,
}

impl Text {
    /// Default font size (M = Medium).
    pub const DEFAULT_FONT_SIZE: f64 = 20.0;

    /// Create a new text element with its top-left corner at `position`.
    pub fn new(position: Point, content: String) -> Self {
        Self::with_font_size(position, content, Self::DEFAULT_FONT_SIZE)
    }

    pub fn with_font_size(position: Point, content: String, font_size: f64) -> Self {
        let mut text = Self {
            frame: Frame::new(position, 0.0, 0.0),
            content,
            font_size,
        };
        text.refit();
        text
    }

    /// Append typed characters.
    pub fn push_str(&mut self, s: &str) {
        self.content.push_str(s);
        self.refit();
    }

    /// Remove the last character, if any.
    pub fn pop_char(&mut self) -> Option<char> {
        let c = self.content.pop();
        self.refit();
        c
    }

    /// Recompute the frame size from the content using approximate metrics.
    pub fn refit(&mut self) {
        let longest = self
            .content
            .lines()
            .map(|l| l.chars().count())
            .max()
            .unwrap_or(0);
        let line_count = self.content.lines().count().max(1)
            + usize::from(self.content.ends_with('\n'));
        self.frame.width = (longest as f64 * self.font_size * CHAR_WIDTH_RATIO).max(MIN_TEXT_WIDTH);
        self.frame.height = line_count as f64 * self.font_size * LINE_HEIGHT;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_grows_with_content() {
        let mut text = Text::new(Point::new(10.0, 10.0), String::new());
        assert_eq!(text.frame.width, MIN_TEXT_WIDTH);
        assert_eq!(text.frame.height, Text::DEFAULT_FONT_SIZE * LINE_HEIGHT);

        text.push_str("hello world");
        let one_line = text.frame.width;
        assert!(one_line > MIN_TEXT_WIDTH);

        text.push_str("\nsecond");
        assert_eq!(text.frame.width, one_line);
        assert_eq!(text.frame.height, 2.0 * Text::DEFAULT_FONT_SIZE * LINE_HEIGHT);
    }

    #[test]
    fn test_pop_char() {
        let mut text = Text::new(Point::ZERO, "ab".to_string());
        assert_eq!(text.pop_char(), Some('b'));
        assert_eq!(text.content, "a");
    }
}
