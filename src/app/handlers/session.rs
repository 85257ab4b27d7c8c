// SPDX-License-Identifier: GPL-3.0-only

//! Capture session handlers
//!
//! The session controller enforces the session state machine. Every handler
//! only mutates state and describes effects; registry and engine work happens
//! inside the returned tasks.

use crate::app::state::{CaptureMessage, CaptureState, SessionState};
use crate::app::task::{EffectKey, Outcome, Task};
use crate::backends::camera::SessionRegistry;
use crate::backends::camera::types::{CameraPosition, SessionId};
use crate::backends::orientation::{OrientationSource, watch_orientation};
use async_stream::stream;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Session state machine plus the registry handle its effects use
pub struct SessionController {
    state: CaptureState,
    registry: SessionRegistry,
    orientation: Arc<dyn OrientationSource>,
    orientation_poll_interval: Duration,
}

impl SessionController {
    pub fn new(
        registry: SessionRegistry,
        orientation: Arc<dyn OrientationSource>,
        camera_position: CameraPosition,
        orientation_poll_interval: Duration,
    ) -> Self {
        Self {
            state: CaptureState {
                camera_position,
                ..CaptureState::default()
            },
            registry,
            orientation,
            orientation_poll_interval,
        }
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    #[cfg(test)]
    pub(crate) fn force_state(&mut self, session_state: SessionState) {
        self.state.session_state = session_state;
    }

    /// Apply one message
    ///
    /// Returns `Outcome::Ignored` when the message is not valid in the
    /// current session state.
    pub fn update(&mut self, message: CaptureMessage) -> Outcome<CaptureMessage> {
        match message {
            CaptureMessage::MakeSession => self.handle_make_session(),
            CaptureMessage::DidMakeSession(id) => self.handle_did_make_session(id),
            CaptureMessage::StartSession => self.handle_start_session(),
            CaptureMessage::DidOutput(_) => self.handle_did_output(),
            CaptureMessage::DidUpdateOrientation(orientation) => {
                self.state.device_orientation = orientation;
                Outcome::none()
            }
            CaptureMessage::ChangeCameraPosition => self.handle_change_camera_position(),
            CaptureMessage::StopSession => self.handle_stop_session(),
            CaptureMessage::DidStopSession => self.handle_did_stop_session(),
            CaptureMessage::Error(error) => Outcome::Handled(Task::future(async move {
                warn!(error = %error, "Capture session error");
                None
            })),
            CaptureMessage::RemoveSession => self.handle_remove_session(),
        }
    }

    // =========================================================================
    // Session lifecycle
    // =========================================================================

    fn handle_make_session(&mut self) -> Outcome<CaptureMessage> {
        if self.state.session_state.has_session() {
            return Outcome::Ignored;
        }

        let registry = self.registry.clone();
        let position = self.state.camera_position;
        Outcome::Handled(Task::perform(
            async move { registry.make_session(position).await },
            |result| match result {
                Ok(id) => CaptureMessage::DidMakeSession(id),
                Err(e) => CaptureMessage::Error(e),
            },
        ))
    }

    fn handle_did_make_session(&mut self, id: SessionId) -> Outcome<CaptureMessage> {
        if self.state.session_state.has_session() {
            // Two MakeSession requests raced; keep the live session
            let registry = self.registry.clone();
            return Outcome::Handled(Task::future(async move {
                debug!(session = %id, "Releasing surplus session");
                registry.release(id).await;
                None
            }));
        }

        self.state.session_state = SessionState::Idle(id);
        Outcome::Handled(Task::done(CaptureMessage::StartSession))
    }

    fn handle_start_session(&mut self) -> Outcome<CaptureMessage> {
        let SessionState::Idle(id) = self.state.session_state else {
            return Outcome::Ignored;
        };
        self.state.session_state = SessionState::Running(id);

        let registry = self.registry.clone();
        let frames = stream! {
            match registry.start_session(id).await {
                Ok(frames) => {
                    for await frame in frames {
                        yield CaptureMessage::DidOutput(Arc::new(frame));
                    }
                    debug!(session = %id, "Frame stream ended");
                }
                Err(e) => yield CaptureMessage::Error(e),
            }
        };

        let orientation = watch_orientation(self.orientation.clone(), self.orientation_poll_interval);

        Outcome::Handled(Task::batch([
            Task::run(frames, |message| message),
            Task::run(orientation, CaptureMessage::DidUpdateOrientation)
                .with_key(EffectKey::OrientationPolling),
        ]))
    }

    fn handle_did_output(&self) -> Outcome<CaptureMessage> {
        if self.state.session_state.is_running() {
            Outcome::none()
        } else {
            Outcome::Ignored
        }
    }

    fn handle_stop_session(&mut self) -> Outcome<CaptureMessage> {
        let SessionState::Running(id) = self.state.session_state else {
            return Outcome::Ignored;
        };

        let registry = self.registry.clone();
        Outcome::Handled(Task::perform(
            async move { registry.stop_session(id).await },
            |result| match result {
                Ok(()) => CaptureMessage::DidStopSession,
                Err(e) => CaptureMessage::Error(e),
            },
        ))
    }

    fn handle_did_stop_session(&mut self) -> Outcome<CaptureMessage> {
        let SessionState::Running(id) = self.state.session_state else {
            return Outcome::Ignored;
        };
        self.state.session_state = SessionState::Idle(id);
        Outcome::Handled(Task::cancel(EffectKey::OrientationPolling))
    }

    fn handle_remove_session(&mut self) -> Outcome<CaptureMessage> {
        if !self.state.session_state.has_session() {
            return Outcome::Ignored;
        }
        self.state.session_state = SessionState::NoSession;

        // Sessions made by a later MakeSession are not ours to release
        let mark = SessionId::watermark();
        let registry = self.registry.clone();
        Outcome::Handled(Task::batch([
            Task::cancel(EffectKey::OrientationPolling),
            Task::future(async move {
                registry.remove_before(mark).await;
                None
            }),
        ]))
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    fn handle_change_camera_position(&mut self) -> Outcome<CaptureMessage> {
        let Some(id) = self.state.session_state.session_id() else {
            return Outcome::Ignored;
        };
        self.state.camera_position.toggle();

        let registry = self.registry.clone();
        let position = self.state.camera_position;
        Outcome::Handled(Task::future(async move {
            registry
                .reconfigure_input(id, position)
                .await
                .err()
                .map(CaptureMessage::Error)
        }))
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::orientation::{FixedOrientation, Orientation};
    use crate::backends::virtual_camera::VirtualCaptureEngine;
    use crate::errors::CaptureError;

    fn controller(engine: VirtualCaptureEngine) -> SessionController {
        SessionController::new(
            SessionRegistry::new(Arc::new(engine)),
            Arc::new(FixedOrientation::new(Orientation::Portrait)),
            CameraPosition::Back,
            Duration::from_millis(10),
        )
    }

    /// Run the effects of an outcome that must complete on their own
    async fn run(outcome: Outcome<CaptureMessage>) -> Vec<CaptureMessage> {
        match outcome {
            Outcome::Handled(task) => task.collect().await,
            Outcome::Ignored => panic!("message was ignored"),
        }
    }

    #[tokio::test]
    async fn test_make_session_then_did_make_session() {
        let mut controller = controller(VirtualCaptureEngine::new());

        let messages = run(controller.update(CaptureMessage::MakeSession)).await;
        let [CaptureMessage::DidMakeSession(id)] = messages.as_slice() else {
            panic!("unexpected messages: {:?}", messages);
        };
        assert!(controller.registry().contains(*id).await);

        let messages = run(controller.update(CaptureMessage::DidMakeSession(*id))).await;
        assert!(matches!(messages.as_slice(), [CaptureMessage::StartSession]));
        assert_eq!(controller.state().session_state, SessionState::Idle(*id));
    }

    #[tokio::test]
    async fn test_make_session_failure_reports_error() {
        let mut controller =
            controller(VirtualCaptureEngine::new().with_positions(&[CameraPosition::Front]));

        let messages = run(controller.update(CaptureMessage::MakeSession)).await;
        assert!(matches!(
            messages.as_slice(),
            [CaptureMessage::Error(CaptureError::DeviceUnavailable(CameraPosition::Back))]
        ));
        assert_eq!(controller.state().session_state, SessionState::NoSession);
    }

    #[test]
    fn test_preconditions_without_session() {
        let mut controller = controller(VirtualCaptureEngine::new());

        for message in [
            CaptureMessage::StartSession,
            CaptureMessage::StopSession,
            CaptureMessage::DidStopSession,
            CaptureMessage::ChangeCameraPosition,
            CaptureMessage::RemoveSession,
        ] {
            assert!(controller.update(message).is_ignored());
        }
        assert_eq!(controller.state().session_state, SessionState::NoSession);
        assert_eq!(controller.state().camera_position, CameraPosition::Back);
    }

    #[test]
    fn test_start_session_only_from_idle() {
        let mut controller = controller(VirtualCaptureEngine::new());
        let id = SessionId::from_raw(40);
        controller.state.session_state = SessionState::Running(id);

        assert!(controller.update(CaptureMessage::StartSession).is_ignored());
        assert!(controller.update(CaptureMessage::MakeSession).is_ignored());
        assert_eq!(controller.state().session_state, SessionState::Running(id));
    }

    #[tokio::test]
    async fn test_start_session_registers_orientation_key() {
        let mut controller = controller(VirtualCaptureEngine::new());
        let id = controller
            .registry()
            .make_session(CameraPosition::Back)
            .await
            .unwrap();
        controller.state.session_state = SessionState::Idle(id);

        let Outcome::Handled(task) = controller.update(CaptureMessage::StartSession) else {
            panic!("StartSession from Idle must be handled");
        };
        assert_eq!(task.keys(), vec![EffectKey::OrientationPolling]);
        assert_eq!(controller.state().session_state, SessionState::Running(id));
    }

    #[test]
    fn test_did_stop_session_cancels_orientation() {
        let mut controller = controller(VirtualCaptureEngine::new());
        let id = SessionId::from_raw(41);
        controller.state.session_state = SessionState::Running(id);

        let Outcome::Handled(task) = controller.update(CaptureMessage::DidStopSession) else {
            panic!("DidStopSession while running must be handled");
        };
        assert_eq!(task.cancelled_keys(), vec![EffectKey::OrientationPolling]);
        assert_eq!(controller.state().session_state, SessionState::Idle(id));
    }

    #[test]
    fn test_did_output_accepted_only_while_running() {
        let mut controller = controller(VirtualCaptureEngine::new());
        let frame = Arc::new(
            crate::backends::camera::types::CameraFrame::from_packed(
                1,
                1,
                crate::backends::camera::types::PixelFormat::Gray8,
                vec![0],
            )
            .unwrap(),
        );

        controller.state.session_state = SessionState::Idle(SessionId::from_raw(42));
        assert!(controller.update(CaptureMessage::DidOutput(frame.clone())).is_ignored());

        controller.state.session_state = SessionState::Running(SessionId::from_raw(42));
        assert!(!controller.update(CaptureMessage::DidOutput(frame)).is_ignored());
    }

    #[tokio::test]
    async fn test_surplus_session_is_released() {
        let mut controller = controller(VirtualCaptureEngine::new());
        let live = controller
            .registry()
            .make_session(CameraPosition::Back)
            .await
            .unwrap();
        let surplus = controller
            .registry()
            .make_session(CameraPosition::Back)
            .await
            .unwrap();
        controller.state.session_state = SessionState::Idle(live);

        let messages = run(controller.update(CaptureMessage::DidMakeSession(surplus))).await;
        assert!(messages.is_empty());
        assert_eq!(controller.state().session_state, SessionState::Idle(live));
        assert!(controller.registry().contains(live).await);
        assert!(!controller.registry().contains(surplus).await);
    }

    #[tokio::test]
    async fn test_change_camera_position_keeps_session_state() {
        let mut controller = controller(VirtualCaptureEngine::new());
        let id = controller
            .registry()
            .make_session(CameraPosition::Back)
            .await
            .unwrap();
        controller.state.session_state = SessionState::Idle(id);

        let messages = run(controller.update(CaptureMessage::ChangeCameraPosition)).await;
        assert!(messages.is_empty());
        assert_eq!(controller.state().camera_position, CameraPosition::Front);
        assert_eq!(
            controller.registry().device(id).await.map(|d| d.position),
            Some(CameraPosition::Front)
        );

        run(controller.update(CaptureMessage::ChangeCameraPosition)).await;
        assert_eq!(controller.state().camera_position, CameraPosition::Back);
        assert_eq!(controller.state().session_state, SessionState::Idle(id));
    }

    #[tokio::test]
    async fn test_failed_reconfigure_keeps_requested_position() {
        let mut controller =
            controller(VirtualCaptureEngine::new().with_positions(&[CameraPosition::Back]));
        let id = controller
            .registry()
            .make_session(CameraPosition::Back)
            .await
            .unwrap();
        controller.state.session_state = SessionState::Idle(id);

        let messages = run(controller.update(CaptureMessage::ChangeCameraPosition)).await;
        assert!(matches!(
            messages.as_slice(),
            [CaptureMessage::Error(CaptureError::DeviceUnavailable(CameraPosition::Front))]
        ));
        assert_eq!(controller.state().camera_position, CameraPosition::Front);
    }

    #[tokio::test]
    async fn test_remove_session_clears_registry() {
        let mut controller = controller(VirtualCaptureEngine::new());
        let id = controller
            .registry()
            .make_session(CameraPosition::Back)
            .await
            .unwrap();
        controller.state.session_state = SessionState::Idle(id);

        let outcome = controller.update(CaptureMessage::RemoveSession);
        assert_eq!(controller.state().session_state, SessionState::NoSession);
        run(outcome).await;
        assert!(controller.registry().is_empty().await);

        assert!(controller.update(CaptureMessage::RemoveSession).is_ignored());
    }

    #[tokio::test]
    async fn test_remove_session_spares_session_made_afterwards() {
        let mut controller = controller(VirtualCaptureEngine::new());
        let old = controller
            .registry()
            .make_session(CameraPosition::Back)
            .await
            .unwrap();
        controller.state.session_state = SessionState::Running(old);

        let removal = controller.update(CaptureMessage::RemoveSession);
        let Outcome::Handled(ref task) = removal else {
            panic!("RemoveSession while running must be handled");
        };
        assert_eq!(task.cancelled_keys(), vec![EffectKey::OrientationPolling]);

        // The next MakeSession finishes before the removal effect runs
        let messages = run(controller.update(CaptureMessage::MakeSession)).await;
        let [CaptureMessage::DidMakeSession(new)] = messages.as_slice() else {
            panic!("unexpected messages: {:?}", messages);
        };
        run(removal).await;

        assert!(!controller.registry().contains(old).await);
        assert!(controller.registry().contains(*new).await);
        run(controller.update(CaptureMessage::DidMakeSession(*new))).await;
        assert_eq!(controller.state().session_state, SessionState::Idle(*new));
    }
}
