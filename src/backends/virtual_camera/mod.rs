// SPDX-License-Identifier: GPL-3.0-only

//! Virtual capture engine
//!
//! Produces frames from a test pattern or a still image instead of real
//! hardware. Used by the CLI and by tests, which can restrict the available
//! camera positions and inject input/output failures.
//!
//! ```text
//! FrameSource ──► producer thread ──try_send──► FrameReceiver
//!                 (frame_loop)      (late frames dropped)
//! ```

mod file_source;

pub use file_source::{FrameSource, load_image_as_frame};

use crate::backends::camera::frame_loop::{CaptureLoopController, LoopAction};
use crate::backends::camera::types::*;
use crate::backends::camera::CaptureEngine;
use crate::constants::virtual_camera as defaults;
use crate::errors::{CaptureError, CaptureResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Native session inside the virtual engine
#[derive(Default)]
struct NativeSession {
    input: Option<CameraDevice>,
    has_output: bool,
    producer: Option<CaptureLoopController>,
}

#[derive(Default)]
struct EngineState {
    sessions: HashMap<u64, NativeSession>,
    outputs_installed: usize,
}

/// Capture engine backed by synthetic frames
pub struct VirtualCaptureEngine {
    positions: Vec<CameraPosition>,
    source: FrameSource,
    frame_interval: Duration,
    frame_limit: Option<u64>,
    fail_input: bool,
    fail_output: bool,
    next_native_id: AtomicU64,
    state: Mutex<EngineState>,
}

impl Default for VirtualCaptureEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualCaptureEngine {
    /// Engine with a front and a back camera streaming the test pattern
    pub fn new() -> Self {
        Self {
            positions: CameraPosition::ALL.to_vec(),
            source: FrameSource::default(),
            frame_interval: Duration::from_millis(defaults::FRAME_INTERVAL_MS),
            frame_limit: None,
            fail_input: false,
            fail_output: false,
            next_native_id: AtomicU64::new(1),
            state: Mutex::new(EngineState::default()),
        }
    }

    /// Only offer devices at these positions
    pub fn with_positions(mut self, positions: &[CameraPosition]) -> Self {
        self.positions = positions.to_vec();
        self
    }

    pub fn with_source(mut self, source: FrameSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// End each stream after `limit` frames
    pub fn with_frame_limit(mut self, limit: u64) -> Self {
        self.frame_limit = Some(limit);
        self
    }

    /// Every `install_input` fails with `InputUnavailable`
    pub fn with_failing_input(mut self) -> Self {
        self.fail_input = true;
        self
    }

    /// Every `install_output` fails with `OutputUnavailable`
    pub fn with_failing_output(mut self) -> Self {
        self.fail_output = true;
        self
    }

    /// Native sessions that are currently open
    pub fn open_sessions(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Native sessions currently delivering frames
    pub fn streaming_sessions(&self) -> usize {
        self.lock()
            .sessions
            .values()
            .filter(|s| s.producer.is_some())
            .count()
    }

    /// Total successful `install_output` calls
    pub fn outputs_installed(&self) -> usize {
        self.lock().outputs_installed
    }

    /// Position of the device attached to the most recently opened session
    pub fn current_input(&self) -> Option<CameraPosition> {
        let state = self.lock();
        state
            .sessions
            .iter()
            .max_by_key(|(native_id, _)| **native_id)
            .and_then(|(_, session)| session.input.as_ref().map(|d| d.position))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn device_at(position: CameraPosition) -> CameraDevice {
        CameraDevice {
            id: format!("virtual:{}", position),
            name: format!("Virtual {} camera", position),
            position,
        }
    }
}

#[async_trait]
impl CaptureEngine for VirtualCaptureEngine {
    fn name(&self) -> &str {
        "virtual"
    }

    fn devices(&self) -> Vec<CameraDevice> {
        self.positions.iter().copied().map(Self::device_at).collect()
    }

    async fn acquire_device(&self, position: CameraPosition) -> CaptureResult<CameraDevice> {
        if self.positions.contains(&position) {
            Ok(Self::device_at(position))
        } else {
            Err(CaptureError::DeviceUnavailable(position))
        }
    }

    async fn open_session(&self, session: SessionId) -> CaptureResult<SessionHandle> {
        let native_id = self.next_native_id.fetch_add(1, Ordering::Relaxed);
        self.lock()
            .sessions
            .insert(native_id, NativeSession::default());
        debug!(session = %session, native_id, "Virtual session opened");
        Ok(SessionHandle { session, native_id })
    }

    async fn install_input(&self, handle: &SessionHandle, device: &CameraDevice) -> CaptureResult<()> {
        if self.fail_input {
            return Err(CaptureError::InputUnavailable);
        }
        let mut state = self.lock();
        let session = state
            .sessions
            .get_mut(&handle.native_id)
            .ok_or(CaptureError::SessionNotFound(handle.session))?;
        session.input = Some(device.clone());
        Ok(())
    }

    async fn install_output(&self, handle: &SessionHandle) -> CaptureResult<OutputSink> {
        if self.fail_output {
            return Err(CaptureError::OutputUnavailable);
        }
        let mut state = self.lock();
        let session = state
            .sessions
            .get_mut(&handle.native_id)
            .ok_or(CaptureError::SessionNotFound(handle.session))?;
        session.has_output = true;
        state.outputs_installed += 1;

        Ok(OutputSink {
            pixel_format: self.source.pixel_format(),
            discards_late_frames: true,
        })
    }

    async fn start_streaming(&self, handle: &SessionHandle) -> CaptureResult<FrameReceiver> {
        let mut state = self.lock();
        let session = state
            .sessions
            .get_mut(&handle.native_id)
            .ok_or(CaptureError::SessionNotFound(handle.session))?;

        if session.producer.is_some() {
            return Err(CaptureError::SessionAlreadyRunning(handle.session));
        }
        if session.input.is_none() {
            return Err(CaptureError::InputUnavailable);
        }
        if !session.has_output {
            return Err(CaptureError::OutputUnavailable);
        }

        let (mut sender, receiver) = futures::channel::mpsc::channel(defaults::FRAME_QUEUE_DEPTH);
        let source = self.source.clone();
        let limit = self.frame_limit;
        let mut sequence = 0u64;

        let producer = CaptureLoopController::start(
            &format!("virtual-{}", handle.session),
            self.frame_interval,
            move || {
                if limit.is_some_and(|limit| sequence >= limit) {
                    return LoopAction::Stop;
                }
                let frame = source.frame(sequence);
                sequence += 1;

                match sender.try_send(frame) {
                    Err(e) if e.is_disconnected() => LoopAction::Stop,
                    // Full: the consumer is behind, drop the frame
                    _ => LoopAction::Continue,
                }
            },
        );
        session.producer = Some(producer);

        info!(session = %handle.session, "Virtual stream started");
        Ok(receiver)
    }

    async fn stop_streaming(&self, handle: &SessionHandle) -> CaptureResult<()> {
        let producer = {
            let mut state = self.lock();
            let session = state
                .sessions
                .get_mut(&handle.native_id)
                .ok_or(CaptureError::SessionNotFound(handle.session))?;
            session
                .producer
                .take()
                .ok_or(CaptureError::SessionNotRunning(handle.session))?
        };
        drop(producer);

        info!(session = %handle.session, "Virtual stream stopped");
        Ok(())
    }

    async fn release(&self, handle: &SessionHandle) {
        let removed = self.lock().sessions.remove(&handle.native_id);
        if removed.is_some() {
            debug!(session = %handle.session, native_id = handle.native_id, "Virtual session released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_devices_follow_positions() {
        let engine = VirtualCaptureEngine::new().with_positions(&[CameraPosition::Front]);
        let devices = engine.devices();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].position, CameraPosition::Front);
        assert!(engine.acquire_device(CameraPosition::Back).await.is_err());
    }

    #[tokio::test]
    async fn test_stream_respects_frame_limit() {
        let engine = VirtualCaptureEngine::new()
            .with_source(FrameSource::TestPattern {
                width: 4,
                height: 4,
            })
            .with_frame_interval(Duration::from_millis(1))
            .with_frame_limit(3);

        let handle = engine.open_session(SessionId::next()).await.unwrap();
        let device = engine.acquire_device(CameraPosition::Back).await.unwrap();
        engine.install_input(&handle, &device).await.unwrap();
        engine.install_output(&handle).await.unwrap();

        let frames: Vec<_> = engine.start_streaming(&handle).await.unwrap().collect().await;
        assert!(!frames.is_empty());
        assert!(frames.len() <= 3);
        assert!(frames.windows(2).all(|w| w[0].sequence < w[1].sequence));
    }

    #[tokio::test]
    async fn test_stop_without_start() {
        let engine = VirtualCaptureEngine::new();
        let handle = engine.open_session(SessionId::next()).await.unwrap();
        assert_eq!(
            engine.stop_streaming(&handle).await,
            Err(CaptureError::SessionNotRunning(handle.session))
        );
        engine.release(&handle).await;
        assert_eq!(engine.open_sessions(), 0);
    }
}
