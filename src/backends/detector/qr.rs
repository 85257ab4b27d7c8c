// SPDX-License-Identifier: GPL-3.0-only

//! QR code detection
//!
//! Uses rqrr to locate and decode QR codes. A QR code is treated as a text
//! region whose recognized text is the decoded payload, which makes the
//! detector usable for every text mode without a trained model.

use super::{OcrEngine, TextRecognizer, TextRectDetector};
use crate::app::frame_processor::geometry::to_detector_space;
use crate::app::frame_processor::types::{BoundingBox, RecognizedText};
use crate::backends::camera::types::CameraFrame;
use crate::backends::orientation::Orientation;
use crate::constants::detection::QR_QUIET_ZONE;
use crate::errors::{DetectorError, DetectorResult};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, trace};

/// A decoded code and where it sits in the frame
#[derive(Debug, Clone, PartialEq)]
pub struct QrCode {
    /// Camera space (unit coordinates, top-left origin, sensor orientation)
    pub bounds: BoundingBox,
    /// Decoded payload, `None` if the grid was found but could not be read
    pub content: Option<String>,
}

/// QR code detector
#[derive(Debug, Clone, Copy, Default)]
pub struct QrDetector;

impl QrDetector {
    pub fn new() -> Self {
        Self
    }

    /// Detect codes off the async runtime
    pub async fn scan(&self, frame: Arc<CameraFrame>) -> DetectorResult<Vec<QrCode>> {
        tokio::task::spawn_blocking(move || scan_sync(&frame))
            .await
            .map_err(|e| DetectorError::DetectorEngine(format!("QR detection task failed: {}", e)))
    }
}

/// Synchronous detection (runs in a blocking task)
///
/// The frame is scanned inside a light border of `QR_QUIET_ZONE` pixels;
/// reported bounds are relative to the frame itself.
pub fn scan_sync(frame: &CameraFrame) -> Vec<QrCode> {
    let start = std::time::Instant::now();
    let (width, height) = (frame.width, frame.height);
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let margin = QR_QUIET_ZONE;
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        (width + 2 * margin) as usize,
        (height + 2 * margin) as usize,
        |x, y| {
            let (x, y) = (x as u32, y as u32);
            let inside = (margin..margin + width).contains(&x) && (margin..margin + height).contains(&y);
            if inside {
                frame.luma(x - margin, y - margin)
            } else {
                u8::MAX
            }
        },
    );
    let grids = prepared.detect_grids();

    let codes: Vec<QrCode> = grids
        .into_iter()
        .map(|grid| {
            let unpad = |v: i32, extent: u32| (v - margin as i32).clamp(0, extent as i32) as u32;
            let xs = grid.bounds.iter().map(|p| unpad(p.x, width));
            let ys = grid.bounds.iter().map(|p| unpad(p.y, height));
            let (min_x, max_x) = min_max(xs);
            let (min_y, max_y) = min_max(ys);

            let content = match grid.decode() {
                Ok((_, content)) => Some(content),
                Err(e) => {
                    debug!(error = ?e, "Failed to decode QR code");
                    None
                }
            };

            QrCode {
                bounds: BoundingBox::from_pixels(min_x, min_y, max_x - min_x, max_y - min_y, width, height),
                content,
            }
        })
        .collect();

    trace!(
        count = codes.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "QR scan complete"
    );
    codes
}

fn min_max(values: impl Iterator<Item = u32>) -> (u32, u32) {
    values.fold((u32::MAX, 0), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

#[async_trait]
impl TextRectDetector for QrDetector {
    async fn detect_text_rects(
        &self,
        frame: Arc<CameraFrame>,
        orientation: Orientation,
    ) -> DetectorResult<Vec<BoundingBox>> {
        Ok(self
            .scan(frame)
            .await?
            .into_iter()
            .map(|code| to_detector_space(code.bounds, orientation))
            .collect())
    }
}

#[async_trait]
impl TextRecognizer for QrDetector {
    async fn recognize_text(
        &self,
        frame: Arc<CameraFrame>,
        orientation: Orientation,
    ) -> DetectorResult<Vec<RecognizedText>> {
        Ok(self
            .scan(frame)
            .await?
            .into_iter()
            .map(|code| RecognizedText {
                bounds: to_detector_space(code.bounds, orientation),
                candidates: code.content.into_iter().collect(),
            })
            .collect())
    }
}

#[async_trait]
impl OcrEngine for QrDetector {
    /// Payload of the first readable code in the crop, empty if there is none
    async fn recognize(&self, image: Arc<CameraFrame>) -> DetectorResult<String> {
        let codes = self
            .scan(image)
            .await
            .map_err(|e| DetectorError::OcrEngine(e.to_string()))?;
        Ok(codes
            .into_iter()
            .find_map(|code| code.content)
            .unwrap_or_default())
    }
}
