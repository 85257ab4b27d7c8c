// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end scenarios driving a `Store` against the virtual capture engine
//!
//! Detectors are scripted so that results are predictable; the OCR engine
//! answers with the width of the crop it was given.

use async_trait::async_trait;
use camera_detector::app::frame_processor::geometry::convert_bounding_box;
use camera_detector::app::frame_processor::types::{BoundingBox, RecognizedText};
use camera_detector::app::{
    AppModel, CaptureMessage, DetectMode, Message, SessionState, Snapshot, Store,
};
use camera_detector::backends::camera::types::CameraFrame;
use camera_detector::backends::camera::{CameraPosition, SessionRegistry};
use camera_detector::backends::detector::{
    Detectors, FaceDetector, OcrEngine, TextRecognizer, TextRectDetector,
};
use camera_detector::backends::orientation::{FixedOrientation, Orientation};
use camera_detector::backends::virtual_camera::VirtualCaptureEngine;
use camera_detector::config::Config;
use camera_detector::errors::DetectorResult;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Returns the same rectangles for every frame
struct ScriptedRects {
    rects: Vec<BoundingBox>,
    calls: AtomicUsize,
}

impl ScriptedRects {
    fn new(rects: Vec<BoundingBox>) -> Arc<Self> {
        Arc::new(Self {
            rects,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl FaceDetector for ScriptedRects {
    async fn detect_faces(
        &self,
        _frame: Arc<CameraFrame>,
        _orientation: Orientation,
    ) -> DetectorResult<Vec<BoundingBox>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.rects.clone())
    }
}

#[async_trait]
impl TextRectDetector for ScriptedRects {
    async fn detect_text_rects(
        &self,
        _frame: Arc<CameraFrame>,
        _orientation: Orientation,
    ) -> DetectorResult<Vec<BoundingBox>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.rects.clone())
    }
}

#[async_trait]
impl TextRecognizer for ScriptedRects {
    async fn recognize_text(
        &self,
        _frame: Arc<CameraFrame>,
        _orientation: Orientation,
    ) -> DetectorResult<Vec<RecognizedText>> {
        Ok(self
            .rects
            .iter()
            .map(|rect| RecognizedText {
                bounds: *rect,
                candidates: vec!["best".into(), "good".into(), "fair".into(), "poor".into()],
            })
            .collect())
    }
}

/// Answers "w<width>"; narrower crops take longer, so completion order is
/// the reverse of rectangle order for rectangles of increasing width
struct WidthOcr {
    calls: AtomicUsize,
}

#[async_trait]
impl OcrEngine for WidthOcr {
    async fn recognize(&self, image: Arc<CameraFrame>) -> DetectorResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = 400u64.saturating_sub(u64::from(image.width));
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok(format!("w{}", image.width))
    }
}

struct Harness {
    store: Store,
    engine: Arc<VirtualCaptureEngine>,
    registry: SessionRegistry,
    orientation: FixedOrientation,
    rects: Arc<ScriptedRects>,
    ocr: Arc<WidthOcr>,
}

fn harness(mode: DetectMode, rects: Vec<BoundingBox>) -> Harness {
    harness_with(mode, rects, Orientation::Unknown)
}

fn harness_with(mode: DetectMode, rects: Vec<BoundingBox>, orientation: Orientation) -> Harness {
    let engine = Arc::new(VirtualCaptureEngine::new().with_frame_interval(Duration::from_millis(5)));
    let rects = ScriptedRects::new(rects);
    let ocr = Arc::new(WidthOcr {
        calls: AtomicUsize::new(0),
    });
    let detectors = Detectors {
        faces: rects.clone(),
        text_rects: rects.clone(),
        text: rects.clone(),
        ocr: ocr.clone(),
    };
    let config = Config {
        detect_mode: mode,
        orientation_poll_interval_ms: 10,
        ..Config::default()
    };

    let registry = SessionRegistry::new(engine.clone());
    let orientation = FixedOrientation::new(orientation);

    let store = Store::new(AppModel::new(
        registry.clone(),
        Arc::new(orientation.clone()),
        detectors,
        &config,
    ));

    Harness {
        store,
        engine,
        registry,
        orientation,
        rects,
        ocr,
    }
}

impl Harness {
    async fn wait(&self, predicate: impl FnMut(&Snapshot) -> bool) -> Snapshot {
        self.store
            .wait_for(TIMEOUT, predicate)
            .await
            .expect("timed out waiting for state")
    }

    async fn start(&self) -> Snapshot {
        self.store.send(CaptureMessage::MakeSession).unwrap();
        self.wait(|s| s.session_state.is_running()).await
    }

    async fn teardown(self) {
        self.store.send(CaptureMessage::RemoveSession).unwrap();
        self.wait(|s| s.session_state == SessionState::NoSession).await;
        self.store.shutdown().await;
    }
}

/// Poll `check` until it holds or the timeout elapses
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

fn rect(x: f64, y: f64, width: f64, height: f64) -> BoundingBox {
    BoundingBox::new(x, y, width, height)
}

fn widths(texts: &[String]) -> Vec<u32> {
    texts
        .iter()
        .map(|t| t.trim_start_matches('w').parse().unwrap())
        .collect()
}

#[tokio::test]
async fn make_session_runs_with_no_rects() {
    let h = harness(DetectMode::TextRect, Vec::new());

    let snapshot = h.start().await;
    assert!(snapshot.detected_rects().is_empty());

    let snapshot = h.wait(|s| s.detections_completed >= 1).await;
    assert!(snapshot.detected_rects().is_empty());
    assert_eq!(h.engine.streaming_sessions(), 1);

    h.teardown().await;
}

#[tokio::test]
async fn stop_before_session_exists_is_ignored() {
    let h = harness(DetectMode::TextRect, Vec::new());

    // Both inputs are queued before the session effect completes
    h.store.send(CaptureMessage::MakeSession).unwrap();
    h.store.send(CaptureMessage::StopSession).unwrap();

    h.wait(|s| s.session_state.is_running()).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(h.store.state().session_state.is_running());

    h.teardown().await;
}

#[tokio::test]
async fn frames_after_stop_do_not_change_results() {
    let h = harness(DetectMode::Face, vec![rect(0.1, 0.2, 0.3, 0.4)]);
    h.start().await;
    h.wait(|s| s.detections_completed >= 2).await;

    h.store.send(CaptureMessage::StopSession).unwrap();
    h.wait(|s| s.session_state.is_idle()).await;
    assert!(eventually(|| h.engine.streaming_sessions() == 0).await);

    // Let a detection dispatched before the stop land
    tokio::time::sleep(Duration::from_millis(100)).await;
    let settled = h.store.state();
    let calls = h.rects.calls.load(Ordering::SeqCst);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let later = h.store.state();
    assert_eq!(later.detections_completed, settled.detections_completed);
    assert_eq!(later.detected_rects(), settled.detected_rects());
    assert_eq!(h.rects.calls.load(Ordering::SeqCst), calls);

    h.teardown().await;
}

#[tokio::test]
async fn ocr_results_follow_rect_order() {
    let h = harness(
        DetectMode::TextRecognitionOcr,
        vec![
            rect(0.05, 0.1, 0.1, 0.1),
            rect(0.2, 0.3, 0.2, 0.1),
            rect(0.5, 0.5, 0.3, 0.1),
            rect(0.0, 0.8, 0.4, 0.1),
        ],
    );
    h.start().await;

    let snapshot = h.wait(|s| !s.detected_texts().is_empty()).await;
    let texts = snapshot.detected_texts();
    assert_eq!(texts.len(), 3);
    let widths = widths(&texts);
    assert!(widths[0] < widths[1] && widths[1] < widths[2], "{:?}", texts);
    assert_eq!(snapshot.detected_text_images().len(), 3);
    assert_eq!(snapshot.detected_rects().len(), 3);

    h.teardown().await;
}

#[tokio::test]
async fn ocr_without_rects_skips_engine() {
    let h = harness(DetectMode::TextRecognitionOcr, Vec::new());
    h.start().await;

    let snapshot = h.wait(|s| s.detections_completed >= 3).await;
    assert!(snapshot.detection.is_empty());
    assert_eq!(h.ocr.calls.load(Ordering::SeqCst), 0);

    h.teardown().await;
}

#[tokio::test]
async fn text_recognition_joins_top_candidates() {
    let h = harness(DetectMode::TextRecognition, vec![rect(0.1, 0.1, 0.5, 0.2)]);
    h.start().await;

    let snapshot = h.wait(|s| !s.detected_texts().is_empty()).await;
    assert_eq!(snapshot.detected_texts(), vec!["best | good | fair".to_string()]);

    h.teardown().await;
}

#[tokio::test]
async fn detections_use_device_orientation() {
    let detected = rect(0.1, 0.2, 0.3, 0.1);
    let h = harness_with(DetectMode::Face, vec![detected], Orientation::Portrait);
    h.start().await;

    let expected = convert_bounding_box(detected, Orientation::Portrait);
    let oriented = h.wait(|s| s.device_orientation == Orientation::Portrait).await;
    // One detection may still be in flight from before the first sample
    let target = oriented.detections_completed + 2;
    let snapshot = h.wait(|s| s.detections_completed >= target).await;
    let rects = snapshot.detected_rects();
    assert_eq!(rects.len(), 1);
    assert!(rects[0].approx_eq(&expected, 1e-9), "{:?} != {:?}", rects[0], expected);

    h.teardown().await;
}

#[tokio::test]
async fn remove_session_twice_is_idempotent() {
    let h = harness(DetectMode::TextRect, Vec::new());
    h.start().await;

    h.store.send(CaptureMessage::RemoveSession).unwrap();
    h.wait(|s| s.session_state == SessionState::NoSession).await;
    assert!(eventually(|| h.engine.open_sessions() == 0).await);

    h.store.send(CaptureMessage::RemoveSession).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.store.state().session_state, SessionState::NoSession);
    assert_eq!(h.engine.open_sessions(), 0);

    h.store.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn make_session_right_after_remove_keeps_new_session() {
    let h = harness(DetectMode::Face, vec![rect(0.1, 0.1, 0.2, 0.2)]);
    let mut previous = h.start().await.session_state.session_id();

    for _ in 0..25 {
        // No waiting in between: the new session races the removal effect
        h.store.send(CaptureMessage::RemoveSession).unwrap();
        h.store.send(CaptureMessage::MakeSession).unwrap();
        let running = h
            .wait(|s| s.session_state.is_running() && s.session_state.session_id() != previous)
            .await;
        let id = running.session_state.session_id().unwrap();
        previous = Some(id);

        assert!(eventually(|| h.engine.open_sessions() == 1).await);
        assert!(h.registry.contains(id).await, "session {} is not registered", id);
        assert_eq!(h.registry.len().await, 1);

        let target = h.store.state().detections_completed + 2;
        let snapshot = h.wait(|s| s.detections_completed >= target).await;
        assert_eq!(snapshot.session_state, running.session_state);
    }

    h.teardown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn remove_session_while_running_stops_orientation_polling() {
    let h = harness_with(DetectMode::Face, Vec::new(), Orientation::Portrait);
    h.start().await;
    h.wait(|s| s.device_orientation == Orientation::Portrait).await;

    h.store.send(CaptureMessage::RemoveSession).unwrap();
    h.wait(|s| s.session_state == SessionState::NoSession).await;
    assert!(eventually(|| h.engine.open_sessions() == 0).await);
    assert!(h.registry.is_empty().await);

    h.orientation.set(Orientation::LandscapeRight);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(h.store.state().device_orientation, Orientation::Portrait);

    // A fresh session picks polling up again
    h.start().await;
    h.wait(|s| s.device_orientation == Orientation::LandscapeRight).await;

    h.teardown().await;
}

#[tokio::test]
async fn camera_position_toggles_without_touching_session() {
    let h = harness(DetectMode::TextRect, Vec::new());
    let running = h.start().await;
    let original = running.camera_position;

    h.store.send(CaptureMessage::ChangeCameraPosition).unwrap();
    let snapshot = h.wait(|s| s.camera_position != original).await;
    assert_eq!(snapshot.session_state, running.session_state);
    assert!(eventually(|| h.engine.current_input() == Some(original.toggled())).await);

    h.store.send(CaptureMessage::ChangeCameraPosition).unwrap();
    let snapshot = h.wait(|s| s.camera_position == original).await;
    assert_eq!(snapshot.session_state, running.session_state);
    assert!(eventually(|| h.engine.current_input() == Some(original)).await);

    h.teardown().await;
}

#[tokio::test]
async fn start_session_only_from_idle() {
    let h = harness(DetectMode::TextRect, Vec::new());

    h.store.send(CaptureMessage::StartSession).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.store.state().session_state, SessionState::NoSession);

    let running = h.start().await;
    h.store.send(CaptureMessage::StartSession).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.store.state().session_state, running.session_state);
    assert_eq!(h.engine.streaming_sessions(), 1);

    h.store.send(CaptureMessage::StopSession).unwrap();
    let idle = h.wait(|s| s.session_state.is_idle()).await;
    assert_eq!(idle.session_state.session_id(), running.session_state.session_id());

    h.store.send(CaptureMessage::StartSession).unwrap();
    let restarted = h.wait(|s| s.session_state.is_running()).await;
    assert_eq!(restarted.session_state, running.session_state);

    h.teardown().await;
}

#[tokio::test]
async fn detect_mode_change_applies_to_next_frames() {
    let h = harness(DetectMode::TextRect, vec![rect(0.1, 0.1, 0.2, 0.2)]);
    h.start().await;
    let snapshot = h.wait(|s| s.detected_rects().len() == 1).await;
    assert!(snapshot.detected_texts().is_empty());

    h.store
        .send(Message::DetectModeChanged(DetectMode::TextRecognition))
        .unwrap();
    let snapshot = h.wait(|s| !s.detected_texts().is_empty()).await;
    assert_eq!(snapshot.detect_mode, DetectMode::TextRecognition);

    h.teardown().await;
}

#[tokio::test]
async fn missing_device_leaves_no_session() {
    let engine = Arc::new(VirtualCaptureEngine::new().with_positions(&[CameraPosition::Front]));
    let store = Store::new(AppModel::new(
        SessionRegistry::new(engine.clone()),
        Arc::new(FixedOrientation::default()),
        Detectors::unavailable(),
        &Config {
            camera_position: CameraPosition::Back,
            ..Config::default()
        },
    ));

    store.send(CaptureMessage::MakeSession).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(store.state().session_state, SessionState::NoSession);
    assert_eq!(engine.open_sessions(), 0);

    store.shutdown().await;
}
