// SPDX-License-Identifier: MPL-2.0

//! Core types for detection results
//!
//! Detector coordinates are normalized (0.0 to 1.0) with the origin in the
//! bottom-left corner of the frame. Results published to observers use a
//! top-left origin and are already corrected for device orientation.

use image::RgbaImage;
use std::sync::Arc;

/// An axis-aligned rectangle in unit coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a normalized box from pixel coordinates (top-left origin)
    pub fn from_pixels(
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        frame_width: u32,
        frame_height: u32,
    ) -> Self {
        Self {
            x: x as f64 / frame_width as f64,
            y: y as f64 / frame_height as f64,
            width: width as f64 / frame_width as f64,
            height: height as f64 / frame_height as f64,
        }
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Component-wise comparison with tolerance
    pub fn approx_eq(&self, other: &BoundingBox, epsilon: f64) -> bool {
        (self.x - other.x).abs() <= epsilon
            && (self.y - other.y).abs() <= epsilon
            && (self.width - other.width).abs() <= epsilon
            && (self.height - other.height).abs() <= epsilon
    }
}

/// A text region with its recognition candidates, best first
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedText {
    pub bounds: BoundingBox,
    pub candidates: Vec<String>,
}

/// One detected region
#[derive(Debug, Clone)]
pub struct Detection {
    /// Region in display coordinates (top-left origin, orientation corrected)
    pub bounds: BoundingBox,
    /// Recognized text, if the detect mode produces text
    pub text: Option<String>,
    /// Cropped region image, if the detect mode produces crops
    pub image: Option<Arc<RgbaImage>>,
}

impl Detection {
    pub fn rect(bounds: BoundingBox) -> Self {
        Self {
            bounds,
            text: None,
            image: None,
        }
    }

    pub fn with_text(bounds: BoundingBox, text: impl Into<String>) -> Self {
        Self {
            bounds,
            text: Some(text.into()),
            image: None,
        }
    }
}

/// Result of running the active detector on one frame
///
/// Always replaces the previous result wholesale, so rectangles, texts and
/// images published together come from the same frame.
#[derive(Debug, Clone, Default)]
pub struct DetectionResult {
    pub entries: Vec<Detection>,
}

impl DetectionResult {
    pub fn new(entries: Vec<Detection>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Rectangles, in detector output order
    pub fn detected_rects(&self) -> Vec<BoundingBox> {
        self.entries.iter().map(|d| d.bounds).collect()
    }

    /// Texts of entries that carry text
    pub fn detected_texts(&self) -> Vec<String> {
        self.entries.iter().filter_map(|d| d.text.clone()).collect()
    }

    /// Crops of entries that carry an image
    pub fn detected_text_images(&self) -> Vec<Arc<RgbaImage>> {
        self.entries.iter().filter_map(|d| d.image.clone()).collect()
    }
}
