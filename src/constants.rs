// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

/// Capture session defaults
pub mod session {
    /// How often the device orientation is sampled while a session runs
    pub const ORIENTATION_POLL_INTERVAL_MS: u64 = 100;
}

/// Detection pipeline defaults
pub mod detection {
    /// Number of text regions handed to OCR per frame
    pub const OCR_MAX_REGIONS: usize = 3;

    /// Number of recognition candidates kept per text region
    pub const TEXT_CANDIDATE_COUNT: usize = 3;

    /// Separator between recognition candidates of one region
    pub const CANDIDATE_SEPARATOR: &str = " | ";

    /// Detections allowed in flight at once (0 = unbounded)
    pub const MAX_PENDING_DETECTIONS: usize = 1;

    /// Light border (pixels) added around a frame before scanning for QR
    /// codes, so codes cropped flush to their edges still decode
    pub const QR_QUIET_ZONE: u32 = 8;
}

/// Virtual capture engine defaults
pub mod virtual_camera {
    /// Delay between generated frames (~30 fps)
    pub const FRAME_INTERVAL_MS: u64 = 33;

    /// Frames buffered between the producer thread and the session
    pub const FRAME_QUEUE_DEPTH: usize = 2;

    /// Test pattern size
    pub const PATTERN_WIDTH: u32 = 640;
    pub const PATTERN_HEIGHT: u32 = 480;
}

/// Store runtime
pub mod store {
    /// Frames between "frames processed" debug log lines
    pub const FRAME_LOG_INTERVAL: u64 = 30;
}

pub mod file_formats {
    /// Image extensions accepted as still frame sources
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
    }
}

/// Application information utilities
pub mod app_info {
    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }

    /// Name used for the config directory and log targets
    pub const APP_NAME: &str = "camera-detector";
}
