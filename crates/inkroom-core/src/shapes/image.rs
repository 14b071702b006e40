//! Image and embed payloads. Both are framed references to external content.

use super::Frame;
use serde::{Deserialize, Serialize};

/// Image format, detected from the source reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    Png,
    Jpeg,
    WebP,
    Svg,
}

impl ImageFormat {
    /// Get MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::WebP => "image/webp",
            ImageFormat::Svg => "image/svg+xml",
        }
    }

    /// Detect format from a URL or a `data:` URI.
    pub fn detect(src: &str) -> Option<Self> {
        if let Some(rest) = src.strip_prefix("data:") {
            let mime = rest.split([';', ',']).next()?;
            return [Self::Png, Self::Jpeg, Self::WebP, Self::Svg]
                .into_iter()
                .find(|f| f.mime_type() == mime);
        }
        let path = src.split(['?', '#']).next()?;
        let ext = path.rsplit_once('.')?.1;
        match ext.to_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "webp" => Some(ImageFormat::WebP),
            "svg" => Some(ImageFormat::Svg),
            _ => None,
        }
    }
}

/// A raster or vector image placed in a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub frame: Frame,
    /// URL or data URI of the image.
    pub src: String,
}

impl Image {
    pub fn new(frame: Frame, src: impl Into<String>) -> Self {
        Self {
            frame,
            src: src.into(),
        }
    }

    pub fn format(&self) -> Option<ImageFormat> {
        ImageFormat::detect(&self.src)
    }
}

/// Embedded external content (video, web page) placed in a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    pub frame: Frame,
    pub url: String,
}

impl Embed {
    pub fn new(frame: Frame, url: impl Into<String>) -> Self {
        Self {
            frame,
            url: url.into(),
        }
    }
}
