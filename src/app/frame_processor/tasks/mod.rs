// SPDX-License-Identifier: GPL-3.0-only

//! Frame processing tasks
//!
//! Effects that run detectors on frames outside the dispatcher.

pub mod pipeline;

pub use pipeline::{PipelineSettings, detect, detect_task};
