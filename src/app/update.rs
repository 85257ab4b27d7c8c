// SPDX-License-Identifier: GPL-3.0-only

//! Message update handling
//!
//! `update()` is the only place state changes. It routes each message to a
//! handler and returns the effects to run, or `Outcome::Ignored` when the
//! message is not valid in the current state.
//!
//! # Handler Modules
//!
//! - `handlers::session`: session lifecycle, camera position, orientation
//! - `handlers::detection`: frame dispatch, detect mode, detection results

use crate::app::AppModel;
use crate::app::state::{CaptureMessage, Message};
use crate::app::task::Outcome;

impl AppModel {
    /// Main message handler
    ///
    /// Synchronous and side-effect free: logging and device I/O only happen
    /// inside the returned effects.
    pub fn update(&mut self, message: Message) -> Outcome<Message> {
        match message {
            // ===== Frames =====
            Message::Capture(CaptureMessage::DidOutput(frame)) => self.handle_did_output(frame),

            // ===== Session =====
            Message::Capture(message) => self.session.update(message).map(Message::Capture),

            // ===== Detection =====
            Message::DetectModeChanged(mode) => self.handle_detect_mode_changed(mode),
            Message::DidDetect(result) => self.handle_did_detect(result),
            Message::DetectionFailed(error) => self.handle_detection_failed(error),
        }
    }
}
