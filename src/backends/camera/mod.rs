// SPDX-License-Identifier: MPL-2.0

//! Capture engine abstraction
//!
//! The controller never touches a camera directly. It talks to a
//! [`CaptureEngine`] through the [`SessionRegistry`], which owns every native
//! session the engine hands out.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  SessionController  │  ← state machine (app::handlers::session)
//! └──────────┬──────────┘
//!            │ effects
//!            ▼
//! ┌─────────────────────┐
//! │   SessionRegistry   │  ← session id → native session, output, handler
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CaptureEngine Trait │  ← common interface
//! └──────────┬──────────┘
//!            │
//!            ▼
//!     ┌─────────────┐
//!     │   Virtual   │  ← test pattern / still image source
//!     └─────────────┘
//! ```

pub mod frame_loop;
pub mod registry;
pub mod types;

pub use registry::SessionRegistry;
pub use types::*;

use crate::errors::CaptureResult;
use async_trait::async_trait;

/// Capture engine interface
///
/// Engines are driven exclusively by the [`SessionRegistry`], which serializes
/// all calls for session configuration. Configuring a session is split into
/// three steps so the registry can guarantee the input is attached before the
/// output, and that the output is only created once the input succeeded.
#[async_trait]
pub trait CaptureEngine: Send + Sync {
    /// Short engine name for logging
    fn name(&self) -> &str;

    /// List the devices this engine can open
    fn devices(&self) -> Vec<CameraDevice>;

    /// Find the device backing a camera position
    ///
    /// # Returns
    /// * `Err(CaptureError::DeviceUnavailable)` - no device at that position
    async fn acquire_device(&self, position: CameraPosition) -> CaptureResult<CameraDevice>;

    /// Create an empty native session for `session`
    async fn open_session(&self, session: SessionId) -> CaptureResult<SessionHandle>;

    /// Attach `device` as the session input, replacing any previous input
    ///
    /// # Returns
    /// * `Err(CaptureError::InputUnavailable)` - the device could not be attached
    async fn install_input(&self, handle: &SessionHandle, device: &CameraDevice)
    -> CaptureResult<()>;

    /// Attach the frame output to the session
    ///
    /// # Returns
    /// * `Err(CaptureError::OutputUnavailable)` - the output could not be attached
    async fn install_output(&self, handle: &SessionHandle) -> CaptureResult<OutputSink>;

    /// Begin frame delivery
    ///
    /// Frames arrive on the returned receiver until `stop_streaming` or
    /// `release` is called for the session.
    async fn start_streaming(&self, handle: &SessionHandle) -> CaptureResult<FrameReceiver>;

    /// End frame delivery
    ///
    /// # Returns
    /// * `Err(CaptureError::SessionNotRunning)` - frames were not being delivered
    async fn stop_streaming(&self, handle: &SessionHandle) -> CaptureResult<()>;

    /// Stop the session if needed and free all of its native resources
    async fn release(&self, handle: &SessionHandle);
}
