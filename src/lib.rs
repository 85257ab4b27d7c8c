// SPDX-License-Identifier: MPL-2.0

//! Camera Detector - capture session control with face and text detection
//!
//! This library drives a camera capture session through a small state
//! machine and runs face, text-rectangle, text-recognition or OCR detection
//! on the frames it delivers.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`app`]: Controller state, message handling and the store runtime
//! - [`backends`]: Capture engine, orientation and detector abstractions
//! - [`config`]: User configuration handling
//! - [`storage`]: Saving cropped text images
//!
//! # Example
//!
//! ```ignore
//! let store = Store::new(AppModel::new(
//!     SessionRegistry::new(Arc::new(VirtualCaptureEngine::new())),
//!     Arc::new(FixedOrientation::default()),
//!     Detectors::qr(),
//!     &Config::load(),
//! ));
//! store.send(CaptureMessage::MakeSession)?;
//! ```

pub mod app;
pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod storage;

// Re-export commonly used types
pub use app::frame_processor::{BoundingBox, Detection, DetectionResult};
pub use app::{AppModel, CaptureMessage, DetectMode, Message, SessionState, Snapshot, Store};
pub use config::Config;
pub use errors::{AppError, AppResult, CaptureError, DetectorError};
