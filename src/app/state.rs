// SPDX-License-Identifier: GPL-3.0-only

//! Application state and messages

use crate::app::frame_processor::types::{BoundingBox, DetectionResult};
use crate::backends::camera::types::{CameraFrame, CameraPosition, SessionId};
use crate::backends::orientation::Orientation;
use crate::errors::{CaptureError, DetectorError};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Capture session state machine
///
/// ```text
/// NoSession ──DidMakeSession──► Idle ──StartSession──► Running
///     ▲                          ▲                        │
///     │                          └────DidStopSession──────┘
///     └──────────────RemoveSession (from any)─────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    NoSession,
    /// Session configured, frames not flowing
    Idle(SessionId),
    /// Frames are being delivered
    Running(SessionId),
}

impl SessionState {
    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            SessionState::NoSession => None,
            SessionState::Idle(id) | SessionState::Running(id) => Some(*id),
        }
    }

    pub fn has_session(&self) -> bool {
        self.session_id().is_some()
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, SessionState::Idle(_))
    }

    pub fn is_running(&self) -> bool {
        matches!(self, SessionState::Running(_))
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::NoSession => write!(f, "no session"),
            SessionState::Idle(id) => write!(f, "idle ({})", id),
            SessionState::Running(id) => write!(f, "running ({})", id),
        }
    }
}

/// Which detector consumes each frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DetectMode {
    Face,
    #[default]
    TextRect,
    TextRecognition,
    /// Text rectangles, cropped and read by the OCR engine
    #[serde(rename = "TextRecognitionOCR")]
    TextRecognitionOcr,
}

impl DetectMode {
    pub const ALL: [DetectMode; 4] = [
        DetectMode::Face,
        DetectMode::TextRect,
        DetectMode::TextRecognition,
        DetectMode::TextRecognitionOcr,
    ];

    /// Identifier used on the command line
    pub fn name(&self) -> &'static str {
        match self {
            DetectMode::Face => "face",
            DetectMode::TextRect => "text-rect",
            DetectMode::TextRecognition => "text",
            DetectMode::TextRecognitionOcr => "ocr",
        }
    }
}

impl std::fmt::Display for DetectMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for DetectMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|mode| mode.name() == s)
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(|m| m.name()).collect();
                format!("unknown detect mode '{}' (expected one of: {})", s, names.join(", "))
            })
    }
}

/// State owned by the session controller
#[derive(Debug, Clone, Default)]
pub struct CaptureState {
    pub session_state: SessionState,
    /// Requested camera position; not reverted if reconfiguration fails
    pub camera_position: CameraPosition,
    pub device_orientation: Orientation,
}

/// State owned by the detection handlers
#[derive(Debug, Clone, Default)]
pub struct DetectionState {
    pub detect_mode: DetectMode,
    pub result: DetectionResult,
    /// Detections dispatched and not yet completed
    pub pending: usize,
    /// Completed detections (successful ones)
    pub completed: u64,
    /// Detections that reported an error
    pub failed: u64,
}

/// Messages accepted by the session controller
#[derive(Debug, Clone)]
pub enum CaptureMessage {
    MakeSession,
    DidMakeSession(SessionId),
    StartSession,
    DidOutput(Arc<CameraFrame>),
    DidUpdateOrientation(Orientation),
    ChangeCameraPosition,
    StopSession,
    DidStopSession,
    Error(CaptureError),
    RemoveSession,
}

/// Top-level messages
#[derive(Debug, Clone)]
pub enum Message {
    Capture(CaptureMessage),
    DetectModeChanged(DetectMode),
    DidDetect(DetectionResult),
    DetectionFailed(DetectorError),
}

impl From<CaptureMessage> for Message {
    fn from(message: CaptureMessage) -> Self {
        Message::Capture(message)
    }
}

/// Read-only view of the observable state
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub session_state: SessionState,
    pub camera_position: CameraPosition,
    pub device_orientation: Orientation,
    pub detect_mode: DetectMode,
    pub detection: DetectionResult,
    pub detections_completed: u64,
    pub detections_failed: u64,
}

impl Snapshot {
    /// Detection passes that have finished, successfully or not
    pub fn detections_finished(&self) -> u64 {
        self.detections_completed + self.detections_failed
    }

    pub fn detected_rects(&self) -> Vec<BoundingBox> {
        self.detection.detected_rects()
    }

    pub fn detected_texts(&self) -> Vec<String> {
        self.detection.detected_texts()
    }

    pub fn detected_text_images(&self) -> Vec<Arc<RgbaImage>> {
        self.detection.detected_text_images()
    }
}
