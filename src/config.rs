// SPDX-License-Identifier: GPL-3.0-only

use crate::app::state::DetectMode;
use crate::backends::camera::types::CameraPosition;
use crate::constants::{app_info, detection, session, virtual_camera};
use crate::errors::AppResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Persistent settings
///
/// Stored as JSON in `<config dir>/camera-detector/config.json`. Missing
/// fields fall back to their defaults so older files keep loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera used when a session is created
    pub camera_position: CameraPosition,
    /// Detector applied to frames
    pub detect_mode: DetectMode,
    /// Orientation sampling period while running
    pub orientation_poll_interval_ms: u64,
    /// Text regions passed to OCR per frame
    pub ocr_max_regions: usize,
    /// Recognition candidates joined per text region
    pub text_candidate_count: usize,
    /// Detections allowed in flight at once (0 = unbounded)
    pub max_pending_detections: usize,
    /// Virtual engine frame period
    pub virtual_frame_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera_position: CameraPosition::default(),
            detect_mode: DetectMode::default(),
            orientation_poll_interval_ms: session::ORIENTATION_POLL_INTERVAL_MS,
            ocr_max_regions: detection::OCR_MAX_REGIONS,
            text_candidate_count: detection::TEXT_CANDIDATE_COUNT,
            max_pending_detections: detection::MAX_PENDING_DETECTIONS,
            virtual_frame_interval_ms: virtual_camera::FRAME_INTERVAL_MS,
        }
    }
}

impl Config {
    /// Default config file location
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(app_info::APP_NAME).join("config.json"))
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> Self {
        match Self::path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load from `path`; a missing or unreadable file yields the defaults
    pub fn load_from(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No config file, using defaults");
                return Self::default();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Invalid config file, using defaults");
                Self::default()
            }
        }
    }

    /// Save to the default location
    pub fn save(&self) -> AppResult<PathBuf> {
        let path = Self::path().ok_or("No config directory available")?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        debug!(path = %path.display(), "Config saved");
        Ok(())
    }

    pub fn orientation_poll_interval(&self) -> Duration {
        Duration::from_millis(self.orientation_poll_interval_ms.max(1))
    }

    pub fn virtual_frame_interval(&self) -> Duration {
        Duration::from_millis(self.virtual_frame_interval_ms)
    }
}
