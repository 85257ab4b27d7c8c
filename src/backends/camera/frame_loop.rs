// SPDX-License-Identifier: GPL-3.0-only
//! Paced frame producer threads
//!
//! Engines that generate frames themselves (rather than receiving them from a
//! driver callback) run a producer on a dedicated thread. The controller owns
//! the thread and guarantees it is stopped and joined when dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What the producer wants after one iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    Continue,
    Stop,
}

/// Owner of a frame producer thread
///
/// ```ignore
/// let mut producer = CaptureLoopController::start("virtual-#1", interval, move || {
///     match sender.try_send(next_frame()) {
///         Err(e) if e.is_disconnected() => LoopAction::Stop,
///         _ => LoopAction::Continue,
///     }
/// });
/// producer.stop();
/// ```
pub struct CaptureLoopController {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    name: String,
}

impl CaptureLoopController {
    /// Spawn the producer thread
    ///
    /// `loop_fn` runs once per `interval` until it returns `LoopAction::Stop`
    /// or `stop()` is called. The stop signal is checked before every
    /// iteration and while waiting out the interval.
    pub fn start<F>(name: &str, interval: Duration, mut loop_fn: F) -> Self
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop_signal);
        let thread_name = name.to_string();

        info!(name = %name, interval_ms = interval.as_millis() as u64, "Starting frame producer");

        let thread_handle = thread::spawn(move || {
            let mut next_tick = Instant::now();

            while !thread_stop.load(Ordering::SeqCst) {
                if loop_fn() == LoopAction::Stop {
                    debug!(name = %thread_name, "Producer finished");
                    break;
                }

                next_tick += interval;
                if !sleep_until(next_tick, &thread_stop) {
                    break;
                }
            }

            debug!(name = %thread_name, "Producer thread exiting");
        });

        Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        }
    }

    /// Whether the producer thread is still alive
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Signal the producer without waiting for it
    pub fn request_stop(&self) {
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Signal the producer and join its thread
    pub fn stop(&mut self) {
        self.request_stop();
        if let Some(handle) = self.thread_handle.take() {
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Producer thread panicked: {:?}", e);
            }
        }
    }
}

impl Drop for CaptureLoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            self.stop();
        }
    }
}

/// Sleep in short slices so a stop request is noticed quickly.
/// Returns false if stopped while waiting.
fn sleep_until(deadline: Instant, stop: &AtomicBool) -> bool {
    const SLICE: Duration = Duration::from_millis(5);

    loop {
        if stop.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(SLICE));
    }
}
