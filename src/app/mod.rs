// SPDX-License-Identifier: MPL-2.0

//! Main application module
//!
//! This module contains the controller state, message handling and the
//! runtime that drives it.
//!
//! # Architecture
//!
//! - `state`: State types and messages (SessionState, DetectMode, Message, Snapshot)
//! - `task`: Effect values returned by `update`
//! - `update`: Message dispatch
//! - `handlers`: Session and detection handlers
//! - `frame_processor`: Geometry and detection effects
//! - `store`: Runtime that owns the model, runs effects and publishes snapshots
//!
//! # Main Types
//!
//! - `AppModel`: Composite state (session controller + detection state)
//! - `Message`: Every input the controller accepts
//! - `Store`: Closed loop around `AppModel::update`

pub mod frame_processor;
pub mod handlers;
pub mod state;
pub mod store;
pub mod task;
mod update;

pub use handlers::SessionController;
pub use state::{
    CaptureMessage, CaptureState, DetectMode, DetectionState, Message, SessionState, Snapshot,
};
pub use store::Store;
pub use task::{EffectKey, Outcome, Task};

use crate::backends::camera::SessionRegistry;
use crate::backends::detector::Detectors;
use crate::backends::orientation::OrientationSource;
use crate::config::Config;
use frame_processor::tasks::PipelineSettings;
use std::sync::Arc;

/// Composite controller state
///
/// Owned exclusively by the [`Store`]; everything else observes it through
/// [`Snapshot`]s.
#[derive(Debug)]
pub struct AppModel {
    pub session: SessionController,
    pub detection: DetectionState,
    pub detectors: Detectors,
    pub settings: PipelineSettings,
}

impl AppModel {
    pub fn new(
        registry: SessionRegistry,
        orientation: Arc<dyn OrientationSource>,
        detectors: Detectors,
        config: &Config,
    ) -> Self {
        Self {
            session: SessionController::new(
                registry,
                orientation,
                config.camera_position,
                config.orientation_poll_interval(),
            ),
            detection: DetectionState {
                detect_mode: config.detect_mode,
                ..DetectionState::default()
            },
            detectors,
            settings: PipelineSettings::from(config),
        }
    }

    /// Observable state
    pub fn snapshot(&self) -> Snapshot {
        let capture = self.session.state();
        Snapshot {
            session_state: capture.session_state,
            camera_position: capture.camera_position,
            device_orientation: capture.device_orientation,
            detect_mode: self.detection.detect_mode,
            detection: self.detection.result.clone(),
            detections_completed: self.detection.completed,
            detections_failed: self.detection.failed,
        }
    }
}
