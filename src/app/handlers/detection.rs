// SPDX-License-Identifier: GPL-3.0-only

//! Detection handlers
//!
//! Accepts frames while a session is running, dispatches them to the active
//! detector and stores completed results.

use crate::app::AppModel;
use crate::app::frame_processor::tasks::detect_task;
use crate::app::frame_processor::types::DetectionResult;
use crate::app::state::{DetectMode, Message};
use crate::app::task::{Outcome, Task};
use crate::backends::camera::types::CameraFrame;
use crate::errors::DetectorError;
use std::sync::Arc;
use tracing::warn;

impl AppModel {
    pub(crate) fn handle_did_output(&mut self, frame: Arc<CameraFrame>) -> Outcome<Message> {
        // Frames from a stopped stream are stale
        if !self.session.state().session_state.is_running() {
            return Outcome::Ignored;
        }

        let limit = self.settings.max_pending_detections;
        if limit > 0 && self.detection.pending >= limit {
            return Outcome::Ignored;
        }
        self.detection.pending += 1;

        Outcome::Handled(detect_task(
            self.detectors.clone(),
            frame,
            self.session.state().device_orientation,
            self.detection.detect_mode,
            self.settings.clone(),
        ))
    }

    pub(crate) fn handle_detect_mode_changed(&mut self, mode: DetectMode) -> Outcome<Message> {
        // Takes effect with the next frame
        self.detection.detect_mode = mode;
        Outcome::none()
    }

    pub(crate) fn handle_did_detect(&mut self, result: DetectionResult) -> Outcome<Message> {
        self.detection.pending = self.detection.pending.saturating_sub(1);
        self.detection.completed += 1;
        self.detection.result = result;
        Outcome::none()
    }

    pub(crate) fn handle_detection_failed(&mut self, error: DetectorError) -> Outcome<Message> {
        self.detection.pending = self.detection.pending.saturating_sub(1);
        self.detection.failed += 1;
        Outcome::Handled(Task::future(async move {
            warn!(error = %error, "Detection failed");
            None
        }))
    }
}
