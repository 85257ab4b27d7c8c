// SPDX-License-Identifier: GPL-3.0-only

//! Detection engines
//!
//! The controller is agnostic to how regions are found or read. It talks to
//! four collaborator traits, all of which report regions in unit coordinates
//! with a bottom-left origin:
//!
//! - [`FaceDetector`]: face rectangles
//! - [`TextRectDetector`]: text region rectangles
//! - [`TextRecognizer`]: text regions with ranked recognition candidates
//! - [`OcrEngine`]: plain text of a cropped region
//!
//! Every call may suspend and may complete on any thread.

pub mod qr;

pub use qr::QrDetector;

use crate::app::frame_processor::types::{BoundingBox, RecognizedText};
use crate::backends::camera::types::CameraFrame;
use crate::backends::orientation::Orientation;
use crate::errors::{DetectorError, DetectorResult};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait FaceDetector: Send + Sync {
    async fn detect_faces(
        &self,
        frame: Arc<CameraFrame>,
        orientation: Orientation,
    ) -> DetectorResult<Vec<BoundingBox>>;
}

#[async_trait]
pub trait TextRectDetector: Send + Sync {
    async fn detect_text_rects(
        &self,
        frame: Arc<CameraFrame>,
        orientation: Orientation,
    ) -> DetectorResult<Vec<BoundingBox>>;
}

#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize_text(
        &self,
        frame: Arc<CameraFrame>,
        orientation: Orientation,
    ) -> DetectorResult<Vec<RecognizedText>>;
}

#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Read the text in an already cropped region
    async fn recognize(&self, image: Arc<CameraFrame>) -> DetectorResult<String>;
}

/// Detector set used by the detection pipeline
#[derive(Clone)]
pub struct Detectors {
    pub faces: Arc<dyn FaceDetector>,
    pub text_rects: Arc<dyn TextRectDetector>,
    pub text: Arc<dyn TextRecognizer>,
    pub ocr: Arc<dyn OcrEngine>,
}

impl Detectors {
    /// Detectors that fail every request
    pub fn unavailable() -> Self {
        let unavailable = Arc::new(Unavailable);
        Self {
            faces: unavailable.clone(),
            text_rects: unavailable.clone(),
            text: unavailable.clone(),
            ocr: unavailable,
        }
    }

    /// QR codes stand in for text regions; there is no face model
    pub fn qr() -> Self {
        let qr = Arc::new(QrDetector::new());
        Self {
            faces: Arc::new(Unavailable),
            text_rects: qr.clone(),
            text: qr.clone(),
            ocr: qr,
        }
    }
}

impl Default for Detectors {
    fn default() -> Self {
        Self::qr()
    }
}

impl std::fmt::Debug for Detectors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detectors").finish_non_exhaustive()
    }
}

/// Placeholder for a detector that is not installed
#[derive(Debug, Clone, Copy, Default)]
pub struct Unavailable;

impl Unavailable {
    fn error() -> DetectorError {
        DetectorError::DetectorEngine("no detector installed".to_string())
    }
}

#[async_trait]
impl FaceDetector for Unavailable {
    async fn detect_faces(&self, _: Arc<CameraFrame>, _: Orientation) -> DetectorResult<Vec<BoundingBox>> {
        Err(Self::error())
    }
}

#[async_trait]
impl TextRectDetector for Unavailable {
    async fn detect_text_rects(
        &self,
        _: Arc<CameraFrame>,
        _: Orientation,
    ) -> DetectorResult<Vec<BoundingBox>> {
        Err(Self::error())
    }
}

#[async_trait]
impl TextRecognizer for Unavailable {
    async fn recognize_text(
        &self,
        _: Arc<CameraFrame>,
        _: Orientation,
    ) -> DetectorResult<Vec<RecognizedText>> {
        Err(Self::error())
    }
}

#[async_trait]
impl OcrEngine for Unavailable {
    async fn recognize(&self, _: Arc<CameraFrame>) -> DetectorResult<String> {
        Err(DetectorError::OcrEngine("no OCR engine installed".to_string()))
    }
}
