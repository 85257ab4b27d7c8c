// SPDX-License-Identifier: MPL-2.0

//! Error types for the capture controller
//!
//! Failures never escape an effect as a panic or an out-of-band error: every
//! fallible effect maps its failure into one of these values and feeds it
//! back into the dispatcher as an error input.

use crate::backends::camera::types::{CameraPosition, SessionId};
use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Result type for capture session operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Result type for detection operations
pub type DetectorResult<T> = Result<T, DetectorError>;

/// Top-level error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Capture session errors
    Capture(CaptureError),
    /// Detection pipeline errors
    Detector(DetectorError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

/// Capture session errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// No registry entry exists for the session
    SessionNotFound(SessionId),
    /// Frame delivery was already started for the session
    SessionAlreadyRunning(SessionId),
    /// Frame delivery is not running for the session
    SessionNotRunning(SessionId),
    /// No capture device backs the requested camera position
    DeviceUnavailable(CameraPosition),
    /// The device input could not be attached to the session
    InputUnavailable,
    /// The frame output could not be attached to the session
    OutputUnavailable,
    /// Engine-specific failure
    Engine(String),
}

/// Detection pipeline errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectorError {
    /// Detection could not produce a result (e.g. a region could not be cropped)
    DetectionFailed,
    /// The face/text detection engine reported an error
    DetectorEngine(String),
    /// The OCR engine reported an error
    OcrEngine(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Capture(e) => write!(f, "Capture error: {}", e),
            AppError::Detector(e) => write!(f, "Detector error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::SessionNotFound(id) => write!(f, "Session {} does not exist", id),
            CaptureError::SessionAlreadyRunning(id) => {
                write!(f, "Session {} is already running", id)
            }
            CaptureError::SessionNotRunning(id) => write!(f, "Session {} is not running", id),
            CaptureError::DeviceUnavailable(position) => {
                write!(f, "No {} camera device available", position)
            }
            CaptureError::InputUnavailable => write!(f, "Device input not available"),
            CaptureError::OutputUnavailable => write!(f, "Device output not available"),
            CaptureError::Engine(msg) => write!(f, "Capture engine error: {}", msg),
        }
    }
}

impl fmt::Display for DetectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectorError::DetectionFailed => write!(f, "Detection failed"),
            DetectorError::DetectorEngine(msg) => write!(f, "Detector engine error: {}", msg),
            DetectorError::OcrEngine(msg) => write!(f, "OCR engine error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CaptureError {}
impl std::error::Error for DetectorError {}

impl From<CaptureError> for AppError {
    fn from(err: CaptureError) -> Self {
        AppError::Capture(err)
    }
}

impl From<DetectorError> for AppError {
    fn from(err: DetectorError) -> Self {
        AppError::Detector(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}
