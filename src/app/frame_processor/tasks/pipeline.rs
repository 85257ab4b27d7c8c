// SPDX-License-Identifier: GPL-3.0-only

//! Detection pipeline
//!
//! Runs exactly one detector branch on a frame and converts everything it
//! finds to camera space. The orientation is the one captured when the frame
//! was dispatched, so a result never mixes two orientations.

use crate::app::frame_processor::geometry::{convert_bounding_box, crop_region};
use crate::app::frame_processor::types::{BoundingBox, Detection, DetectionResult, RecognizedText};
use crate::app::state::{DetectMode, Message};
use crate::app::task::Task;
use crate::backends::camera::types::CameraFrame;
use crate::backends::detector::Detectors;
use crate::backends::orientation::Orientation;
use crate::config::Config;
use crate::constants::detection;
use crate::errors::{DetectorError, DetectorResult};
use futures::FutureExt;
use futures::future::try_join_all;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, trace};

/// Tunables of the detection pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Text regions handed to OCR per frame
    pub ocr_max_regions: usize,
    /// Recognition candidates joined per text region
    pub text_candidate_count: usize,
    /// Detections allowed in flight at once (0 = unbounded)
    pub max_pending_detections: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            ocr_max_regions: detection::OCR_MAX_REGIONS,
            text_candidate_count: detection::TEXT_CANDIDATE_COUNT,
            max_pending_detections: detection::MAX_PENDING_DETECTIONS,
        }
    }
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            ocr_max_regions: config.ocr_max_regions,
            text_candidate_count: config.text_candidate_count,
            max_pending_detections: config.max_pending_detections,
        }
    }
}

/// Effect that detects on `frame` and reports `DidDetect` or `DetectionFailed`
///
/// A panicking detector is reported as `DetectionFailed` so the in-flight
/// count is always released.
pub fn detect_task(
    detectors: Detectors,
    frame: Arc<CameraFrame>,
    orientation: Orientation,
    mode: DetectMode,
    settings: PipelineSettings,
) -> Task<Message> {
    Task::perform(
        async move {
            AssertUnwindSafe(detect(&detectors, frame, orientation, mode, &settings))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    error!(%mode, "Detector panicked");
                    Err(DetectorError::DetectorEngine("detector panicked".into()))
                })
        },
        |result| match result {
            Ok(result) => Message::DidDetect(result),
            Err(e) => Message::DetectionFailed(e),
        },
    )
}

/// Run the branch selected by `mode`
pub async fn detect(
    detectors: &Detectors,
    frame: Arc<CameraFrame>,
    orientation: Orientation,
    mode: DetectMode,
    settings: &PipelineSettings,
) -> DetectorResult<DetectionResult> {
    let start = std::time::Instant::now();
    let sequence = frame.sequence;

    let entries = match mode {
        DetectMode::Face => {
            let faces = detectors.faces.detect_faces(frame, orientation).await?;
            rects_to_detections(faces, orientation)
        }
        DetectMode::TextRect => {
            let rects = detectors.text_rects.detect_text_rects(frame, orientation).await?;
            rects_to_detections(rects, orientation)
        }
        DetectMode::TextRecognition => {
            let observations = detectors.text.recognize_text(frame, orientation).await?;
            observations
                .into_iter()
                .map(|observation| text_detection(observation, orientation, settings.text_candidate_count))
                .collect()
        }
        DetectMode::TextRecognitionOcr => {
            recognize_with_ocr(detectors, frame, orientation, settings.ocr_max_regions).await?
        }
    };

    trace!(
        sequence,
        %mode,
        count = entries.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Detection complete"
    );
    Ok(DetectionResult::new(entries))
}

fn rects_to_detections(rects: Vec<BoundingBox>, orientation: Orientation) -> Vec<Detection> {
    rects
        .into_iter()
        .map(|rect| Detection::rect(convert_bounding_box(rect, orientation)))
        .collect()
}

/// Camera-space detection whose text is the top candidates joined
fn text_detection(observation: RecognizedText, orientation: Orientation, candidates: usize) -> Detection {
    let bounds = convert_bounding_box(observation.bounds, orientation);
    let top: Vec<&str> = observation
        .candidates
        .iter()
        .take(candidates)
        .map(String::as_str)
        .collect();

    if top.is_empty() {
        Detection::rect(bounds)
    } else {
        Detection::with_text(bounds, top.join(detection::CANDIDATE_SEPARATOR))
    }
}

/// Text rectangles, cropped and read by the OCR engine in parallel
///
/// Results follow rectangle order regardless of which OCR call finishes
/// first. Any crop or OCR failure fails the whole detection.
async fn recognize_with_ocr(
    detectors: &Detectors,
    frame: Arc<CameraFrame>,
    orientation: Orientation,
    max_regions: usize,
) -> DetectorResult<Vec<Detection>> {
    let mut rects = detectors
        .text_rects
        .detect_text_rects(frame.clone(), orientation)
        .await?;
    rects.truncate(max_regions);

    if rects.is_empty() {
        return Ok(Vec::new());
    }

    let crops = rects
        .iter()
        .map(|rect| crop_region(&frame, *rect, orientation).map(Arc::new))
        .collect::<DetectorResult<Vec<_>>>()?;

    debug!(regions = crops.len(), "Running OCR on text regions");
    let texts = try_join_all(crops.iter().map(|crop| detectors.ocr.recognize(crop.clone()))).await?;

    Ok(rects
        .into_iter()
        .zip(crops)
        .zip(texts)
        .map(|((rect, crop), text)| Detection {
            bounds: convert_bounding_box(rect, orientation),
            text: Some(text),
            image: crop.to_rgba_image().map(Arc::new),
        })
        .collect())
}
