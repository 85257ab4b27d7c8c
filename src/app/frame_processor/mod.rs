// SPDX-License-Identifier: MPL-2.0

//! Frame processor module for async frame analysis
//!
//! Frames accepted by the dispatcher are handed to a detection task together
//! with the orientation at dispatch time. Results are converted from detector
//! space to camera space before they reach the state.

pub mod geometry;
pub mod tasks;
pub mod types;

pub use geometry::{RectOrigin, convert_bounding_box, crop_region, crop_unit_rect, to_detector_space};
pub use types::{BoundingBox, Detection, DetectionResult, RecognizedText};
