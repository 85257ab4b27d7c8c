// SPDX-License-Identifier: GPL-3.0-only

//! Capture session registry
//!
//! The registry provides:
//! - Exclusive ownership of every native session handed out by the engine
//! - Serialized session configuration (one async mutex acts as the session queue)
//! - Output handlers that cut frame delivery deterministically on stop

use super::types::*;
use super::CaptureEngine;
use crate::errors::{CaptureError, CaptureResult};
use futures::StreamExt;
use futures::stream::BoxStream;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Resources held for one session
struct SessionEntry {
    /// Native session
    handle: SessionHandle,
    /// Device currently attached as input
    device: CameraDevice,
    /// Frame output attached to the session
    output: OutputSink,
    /// Present while frames are being delivered; cancelling it ends the
    /// frame stream handed out by `start_session`
    output_handler: Option<CancellationToken>,
}

/// Internal registry state
struct RegistryState {
    sessions: HashMap<SessionId, SessionEntry>,
}

/// Capture session registry
///
/// Cheap to clone; every clone refers to the same set of sessions. Holding the
/// inner lock across engine calls is what serializes session configuration.
#[derive(Clone)]
pub struct SessionRegistry {
    engine: Arc<dyn CaptureEngine>,
    state: Arc<Mutex<RegistryState>>,
}

impl SessionRegistry {
    /// Create an empty registry on top of `engine`
    pub fn new(engine: Arc<dyn CaptureEngine>) -> Self {
        info!(engine = engine.name(), "Creating session registry");

        Self {
            engine,
            state: Arc::new(Mutex::new(RegistryState {
                sessions: HashMap::new(),
            })),
        }
    }

    /// Name of the underlying engine
    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Acquire a device, configure a new session and register it
    ///
    /// Fails fast with `DeviceUnavailable` before any native session exists.
    /// The input is attached before the output; if either step fails the
    /// native session is released and nothing is registered.
    pub async fn make_session(&self, position: CameraPosition) -> CaptureResult<SessionId> {
        let mut state = self.state.lock().await;

        let device = self.engine.acquire_device(position).await?;
        let id = SessionId::next();
        let handle = self.engine.open_session(id).await?;

        if let Err(e) = self.engine.install_input(&handle, &device).await {
            warn!(session = %id, error = %e, "Input setup failed, releasing session");
            self.engine.release(&handle).await;
            return Err(e);
        }

        let output = match self.engine.install_output(&handle).await {
            Ok(output) => output,
            Err(e) => {
                warn!(session = %id, error = %e, "Output setup failed, releasing session");
                self.engine.release(&handle).await;
                return Err(e);
            }
        };

        info!(session = %id, device = %device.name, format = %output.pixel_format, "Session configured");

        state.sessions.insert(
            id,
            SessionEntry {
                handle,
                device,
                output,
                output_handler: None,
            },
        );
        Ok(id)
    }

    /// Swap the session input for the device at `position`
    pub async fn reconfigure_input(&self, id: SessionId, position: CameraPosition) -> CaptureResult<()> {
        let mut state = self.state.lock().await;
        let entry = state
            .sessions
            .get_mut(&id)
            .ok_or(CaptureError::SessionNotFound(id))?;

        let device = self.engine.acquire_device(position).await?;
        self.engine.install_input(&entry.handle, &device).await?;

        info!(session = %id, device = %device.name, "Session input reconfigured");
        entry.device = device;
        Ok(())
    }

    /// Start frame delivery and return the frame stream
    ///
    /// The stream ends when the session is stopped or released, even if the
    /// engine keeps a frame or two buffered.
    pub async fn start_session(&self, id: SessionId) -> CaptureResult<BoxStream<'static, CameraFrame>> {
        let mut state = self.state.lock().await;
        let entry = state
            .sessions
            .get_mut(&id)
            .ok_or(CaptureError::SessionNotFound(id))?;

        if entry.output_handler.is_some() {
            return Err(CaptureError::SessionAlreadyRunning(id));
        }

        let receiver = self.engine.start_streaming(&entry.handle).await?;
        let handler = CancellationToken::new();
        let stream = receiver.take_until(handler.clone().cancelled_owned()).boxed();
        entry.output_handler = Some(handler);

        info!(session = %id, "Frame delivery started");
        Ok(stream)
    }

    /// Stop frame delivery
    pub async fn stop_session(&self, id: SessionId) -> CaptureResult<()> {
        let mut state = self.state.lock().await;
        let entry = state
            .sessions
            .get_mut(&id)
            .ok_or(CaptureError::SessionNotFound(id))?;

        let handler = entry
            .output_handler
            .take()
            .ok_or(CaptureError::SessionNotRunning(id))?;
        handler.cancel();

        self.engine.stop_streaming(&entry.handle).await?;
        info!(session = %id, "Frame delivery stopped");
        Ok(())
    }

    /// Release a single session; unknown ids are ignored
    pub async fn release(&self, id: SessionId) {
        let mut state = self.state.lock().await;
        if let Some(entry) = state.sessions.remove(&id) {
            self.release_entry(id, entry).await;
        }
    }

    /// Release every session minted before `mark`
    ///
    /// Sessions made after the mark was taken stay registered. Safe to call
    /// on an empty registry. Returns how many sessions were released.
    pub async fn remove_before(&self, mark: SessionId) -> usize {
        let mut state = self.state.lock().await;
        let stale: Vec<SessionId> = state
            .sessions
            .keys()
            .copied()
            .filter(|id| *id < mark)
            .collect();
        let count = stale.len();

        for id in stale {
            if let Some(entry) = state.sessions.remove(&id) {
                self.release_entry(id, entry).await;
            }
        }

        if count > 0 {
            info!(count, before = %mark, "Sessions removed");
        }
        count
    }

    async fn release_entry(&self, id: SessionId, entry: SessionEntry) {
        if let Some(handler) = entry.output_handler {
            handler.cancel();
        }
        self.engine.release(&entry.handle).await;
        debug!(session = %id, "Session released");
    }

    /// Check whether a session is registered
    pub async fn contains(&self, id: SessionId) -> bool {
        self.state.lock().await.sessions.contains_key(&id)
    }

    /// Check whether frames are being delivered for a session
    pub async fn is_running(&self, id: SessionId) -> bool {
        self.state
            .lock()
            .await
            .sessions
            .get(&id)
            .is_some_and(|entry| entry.output_handler.is_some())
    }

    /// Device currently attached to a session
    pub async fn device(&self, id: SessionId) -> Option<CameraDevice> {
        self.state
            .lock()
            .await
            .sessions
            .get(&id)
            .map(|entry| entry.device.clone())
    }

    /// Output attached to a session
    pub async fn output(&self, id: SessionId) -> Option<OutputSink> {
        self.state
            .lock()
            .await
            .sessions
            .get(&id)
            .map(|entry| entry.output.clone())
    }

    /// Number of registered sessions
    pub async fn len(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("SessionRegistry");
        debug.field("engine", &self.engine.name());
        match self.state.try_lock() {
            Ok(state) => debug.field("sessions", &state.sessions.len()),
            Err(_) => debug.field("sessions", &"<locked>"),
        };
        debug.finish()
    }
}
