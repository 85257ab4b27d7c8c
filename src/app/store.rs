// SPDX-License-Identifier: GPL-3.0-only

//! Runtime around [`AppModel::update`]
//!
//! The store task is the single place that mutates the model. Inputs arrive
//! over an unbounded channel and are processed one at a time in arrival
//! order. Every effect returned by `update` is spawned on the tokio runtime;
//! the messages it produces come back through the same channel.
//!
//! ```text
//! send() ──► ┌────────────┐  Task  ┌──────────────┐
//!            │ store loop │──────► │ spawned      │
//!     ┌────► │  update()  │        │ effects      │
//!     │      └─────┬──────┘        └──────┬───────┘
//!     │            │ Snapshot             │ messages
//!     │            ▼                      │
//!     │      watch channel                │
//!     └───────────────────────────────────┘
//! ```
//!
//! Keyed effects are tracked in a table of cancellation tokens. Cancelling
//! a key signals every live effect under it and forgets their ids, so any
//! message they had already queued is dropped on arrival.

use crate::app::AppModel;
use crate::app::state::{CaptureMessage, Message, Snapshot};
use crate::app::task::{Effect, EffectKey, Outcome};
use crate::constants::store::FRAME_LOG_INTERVAL;
use crate::errors::{AppError, AppResult};
use futures::StreamExt;
use futures::stream::BoxStream;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Identity of a keyed effect
#[derive(Debug, Clone, Copy)]
struct Origin {
    key: EffectKey,
    id: u64,
}

enum Input {
    /// An external input
    Send(Message),
    /// A message produced by an effect
    Effect {
        message: Message,
        origin: Option<Origin>,
    },
    /// A keyed effect ran to completion
    Finished(Origin),
}

/// Handle to a running store
///
/// Dropping the handle without calling [`Store::shutdown`] leaves in-flight
/// effects running until the runtime shuts down.
pub struct Store {
    inputs: mpsc::UnboundedSender<Input>,
    snapshots: watch::Receiver<Snapshot>,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl Store {
    /// Spawn the store loop for `model`
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(model: AppModel) -> Self {
        let (inputs, receiver) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshots) = watch::channel(model.snapshot());
        let shutdown = CancellationToken::new();

        let runtime = Runtime {
            model,
            inputs: inputs.clone(),
            snapshots: snapshot_tx,
            shutdown: shutdown.clone(),
            keyed: HashMap::new(),
            next_effect_id: 0,
            frames_seen: 0,
        };
        let handle = tokio::spawn(runtime.run(receiver));

        Self {
            inputs,
            snapshots,
            shutdown,
            handle,
        }
    }

    /// Queue an input for the dispatcher
    pub fn send(&self, message: impl Into<Message>) -> AppResult<()> {
        self.inputs
            .send(Input::Send(message.into()))
            .map_err(|_| AppError::Other("store has shut down".to_string()))
    }

    /// Latest published snapshot
    pub fn state(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver that observes every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    /// Wait until a published snapshot satisfies `predicate`
    ///
    /// The current snapshot is checked first. Returns `None` on timeout or
    /// when the store has stopped.
    pub async fn wait_for(
        &self,
        timeout: Duration,
        mut predicate: impl FnMut(&Snapshot) -> bool,
    ) -> Option<Snapshot> {
        let mut receiver = self.snapshots.clone();
        let snapshot = match tokio::time::timeout(timeout, receiver.wait_for(|s| predicate(s))).await
        {
            Ok(Ok(snapshot)) => snapshot.clone(),
            _ => return None,
        };
        Some(snapshot)
    }

    /// Cancel every in-flight effect and stop the loop
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Store task ended abnormally");
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("state", &*self.snapshots.borrow())
            .field("stopped", &self.shutdown.is_cancelled())
            .finish()
    }
}

struct Runtime {
    model: AppModel,
    inputs: mpsc::UnboundedSender<Input>,
    snapshots: watch::Sender<Snapshot>,
    shutdown: CancellationToken,
    keyed: HashMap<EffectKey, HashMap<u64, CancellationToken>>,
    next_effect_id: u64,
    frames_seen: u64,
}

impl Runtime {
    async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<Input>) {
        debug!("Store started");
        loop {
            let input = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                input = receiver.recv() => match input {
                    Some(input) => input,
                    None => break,
                },
            };

            match input {
                Input::Send(message) => self.dispatch(message),
                Input::Effect { message, origin } => {
                    match origin {
                        Some(origin) if !self.is_live(origin) => {
                            trace!(key = ?origin.key, id = origin.id, "Dropping message from cancelled effect");
                        }
                        _ => self.dispatch(message),
                    }
                }
                Input::Finished(origin) => self.forget(origin),
            }
        }

        let live: usize = self.keyed.values().map(HashMap::len).sum();
        info!(live_effects = live, "Store stopped");
        for token in self.keyed.drain().flat_map(|(_, tokens)| tokens.into_values()) {
            token.cancel();
        }
    }

    fn dispatch(&mut self, message: Message) {
        if matches!(message, Message::Capture(CaptureMessage::DidOutput(_))) {
            self.frames_seen += 1;
            if self.frames_seen % FRAME_LOG_INTERVAL == 0 {
                debug!(frames = self.frames_seen, "Frames received");
            }
        } else {
            debug!(message = ?MessageName(&message), "Dispatching");
        }

        match self.model.update(message) {
            Outcome::Handled(task) => {
                for effect in task.into_effects() {
                    match effect {
                        Effect::Run { key, stream } => self.spawn(key, stream),
                        Effect::Cancel(key) => self.cancel(key),
                    }
                }
                self.snapshots.send_replace(self.model.snapshot());
            }
            Outcome::Ignored => trace!("Input ignored in current state"),
        }
    }

    fn spawn(&mut self, key: Option<EffectKey>, mut stream: BoxStream<'static, Message>) {
        let token = self.shutdown.child_token();
        let origin = key.map(|key| {
            let id = self.next_effect_id;
            self.next_effect_id += 1;
            self.keyed
                .entry(key)
                .or_default()
                .insert(id, token.clone());
            Origin { key, id }
        });

        let inputs = self.inputs.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    next = stream.next() => match next {
                        Some(message) => {
                            if inputs.send(Input::Effect { message, origin }).is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
            if let Some(origin) = origin {
                let _ = inputs.send(Input::Finished(origin));
            }
        });
    }

    fn cancel(&mut self, key: EffectKey) {
        let Some(tokens) = self.keyed.remove(&key) else {
            return;
        };
        debug!(key = ?key, effects = tokens.len(), "Cancelling effects");
        for token in tokens.into_values() {
            token.cancel();
        }
    }

    fn is_live(&self, origin: Origin) -> bool {
        self.keyed
            .get(&origin.key)
            .is_some_and(|tokens| tokens.contains_key(&origin.id))
    }

    fn forget(&mut self, origin: Origin) {
        if let Some(tokens) = self.keyed.get_mut(&origin.key) {
            tokens.remove(&origin.id);
            if tokens.is_empty() {
                self.keyed.remove(&origin.key);
            }
        }
    }
}

/// Short name of a message for dispatch logs (frames carry pixel data)
struct MessageName<'a>(&'a Message);

impl std::fmt::Debug for MessageName<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Message::Capture(CaptureMessage::DidOutput(frame)) => {
                write!(f, "DidOutput(#{})", frame.sequence)
            }
            Message::DidDetect(result) => write!(f, "DidDetect({} entries)", result.len()),
            other => write!(f, "{:?}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::state::{DetectMode, SessionState};
    use crate::backends::camera::SessionRegistry;
    use crate::backends::detector::Detectors;
    use crate::backends::orientation::{FixedOrientation, Orientation};
    use crate::backends::virtual_camera::VirtualCaptureEngine;
    use crate::config::Config;
    use std::sync::Arc;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn store_with(orientation: FixedOrientation) -> Store {
        let engine = VirtualCaptureEngine::new().with_frame_interval(Duration::from_millis(5));
        Store::new(AppModel::new(
            SessionRegistry::new(Arc::new(engine)),
            Arc::new(orientation),
            Detectors::qr(),
            &Config {
                orientation_poll_interval_ms: 10,
                ..Config::default()
            },
        ))
    }

    #[tokio::test]
    async fn test_snapshot_published_after_input() {
        let store = store_with(FixedOrientation::default());
        store.send(Message::DetectModeChanged(DetectMode::Face)).unwrap();

        let snapshot = store
            .wait_for(TIMEOUT, |s| s.detect_mode == DetectMode::Face)
            .await;
        assert!(snapshot.is_some());
        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_orientation_polling_stops_with_session() {
        let orientation = FixedOrientation::new(Orientation::Portrait);
        let store = store_with(orientation.clone());
        store.send(CaptureMessage::MakeSession).unwrap();
        assert!(
            store
                .wait_for(TIMEOUT, |s| s.session_state.is_running())
                .await
                .is_some()
        );

        orientation.set(Orientation::LandscapeLeft);
        assert!(
            store
                .wait_for(TIMEOUT, |s| s.device_orientation == Orientation::LandscapeLeft)
                .await
                .is_some()
        );

        store.send(CaptureMessage::StopSession).unwrap();
        assert!(
            store
                .wait_for(TIMEOUT, |s| s.session_state.is_idle())
                .await
                .is_some()
        );

        orientation.set(Orientation::PortraitUpsideDown);
        let changed = store
            .wait_for(Duration::from_millis(200), |s| {
                s.device_orientation == Orientation::PortraitUpsideDown
            })
            .await;
        assert!(changed.is_none());

        store.send(CaptureMessage::RemoveSession).unwrap();
        assert!(
            store
                .wait_for(TIMEOUT, |s| s.session_state == SessionState::NoSession)
                .await
                .is_some()
        );
        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_send_after_shutdown_fails() {
        let store = store_with(FixedOrientation::default());
        let inputs = store.inputs.clone();
        store.shutdown().await;
        assert!(inputs.send(Input::Send(CaptureMessage::MakeSession.into())).is_err());
    }
}
