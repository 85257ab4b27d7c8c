// SPDX-License-Identifier: GPL-3.0-only

//! Message handler modules
//!
//! Handlers are organized by functional domain:
//!
//! - `session`: the capture session state machine
//! - `detection`: frame dispatch and detection results

pub mod detection;
pub mod session;

pub use session::SessionController;
