// SPDX-License-Identifier: GPL-3.0-only

//! Effect values returned by the update functions
//!
//! A [`Task`] describes asynchronous work without running it. The
//! [`Store`](super::store::Store) spawns every effect of a returned task and
//! feeds the messages it produces back into `update`.

use futures::future::BoxFuture;
use futures::stream::{self, BoxStream};
use futures::{Future, FutureExt, Stream, StreamExt};
use std::sync::Arc;

/// Identifies a cancellable in-flight effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKey {
    /// The orientation sampling stream of a running session
    OrientationPolling,
}

pub(crate) enum Effect<M> {
    /// Forward every item of the stream as a message
    Run {
        key: Option<EffectKey>,
        stream: BoxStream<'static, M>,
    },
    /// Cancel every live effect registered under the key
    Cancel(EffectKey),
}

/// A set of effects to run
#[must_use = "a Task does nothing unless returned to the store"]
pub struct Task<M> {
    effects: Vec<Effect<M>>,
}

impl<M: Send + 'static> Task<M> {
    /// No effect
    pub fn none() -> Self {
        Self {
            effects: Vec::new(),
        }
    }

    /// Produce `message` immediately
    pub fn done(message: M) -> Self {
        Self::run(stream::once(async move { message }), |m| m)
    }

    /// Run `future` and map its output to a message
    pub fn perform<T, F>(future: F, f: impl FnOnce(T) -> M + Send + 'static) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self::run(stream::once(future.map(f)), |m| m)
    }

    /// Run `future`; `None` completes without a message
    pub fn future<F>(future: F) -> Self
    where
        F: Future<Output = Option<M>> + Send + 'static,
    {
        Self::run(stream::once(future).filter_map(futures::future::ready), |m| m)
    }

    /// Forward every item of `stream` as a message
    pub fn run<T, S>(stream: S, f: impl Fn(T) -> M + Send + 'static) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
    {
        Self {
            effects: vec![Effect::Run {
                key: None,
                stream: stream.map(f).boxed(),
            }],
        }
    }

    /// Cancel every in-flight effect registered under `key`
    ///
    /// Cancelling a key with nothing in flight does nothing.
    pub fn cancel(key: EffectKey) -> Self {
        Self {
            effects: vec![Effect::Cancel(key)],
        }
    }

    pub fn batch(tasks: impl IntoIterator<Item = Task<M>>) -> Self {
        Self {
            effects: tasks.into_iter().flat_map(|t| t.effects).collect(),
        }
    }

    /// Register every effect of this task under `key`
    ///
    /// A keyed effect does not replace earlier effects under the same key;
    /// only an explicit [`Task::cancel`] stops them.
    pub fn with_key(mut self, key: EffectKey) -> Self {
        for effect in &mut self.effects {
            if let Effect::Run { key: slot, .. } = effect {
                *slot = Some(key);
            }
        }
        self
    }

    /// Re-tag produced messages
    pub fn map<N: Send + 'static>(self, f: impl Fn(M) -> N + Send + Sync + 'static) -> Task<N> {
        let f = Arc::new(f);
        Task {
            effects: self
                .effects
                .into_iter()
                .map(|effect| match effect {
                    Effect::Run { key, stream } => {
                        let f = Arc::clone(&f);
                        Effect::Run {
                            key,
                            stream: stream.map(move |m| f(m)).boxed(),
                        }
                    }
                    Effect::Cancel(key) => Effect::Cancel(key),
                })
                .collect(),
        }
    }

    pub fn is_none(&self) -> bool {
        self.effects.is_empty()
    }

    /// Number of effects (runs and cancellations)
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// Keys this task cancels
    pub fn cancelled_keys(&self) -> Vec<EffectKey> {
        self.effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Cancel(key) => Some(*key),
                Effect::Run { .. } => None,
            })
            .collect()
    }

    /// Keys this task registers effects under
    pub fn keys(&self) -> Vec<EffectKey> {
        self.effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Run { key, .. } => *key,
                Effect::Cancel(_) => None,
            })
            .collect()
    }

    /// Run every effect to completion, one after the other, and collect the
    /// messages. Cancellations are skipped.
    ///
    /// Only for effects that end on their own; a keyed polling stream never does.
    pub fn collect(self) -> BoxFuture<'static, Vec<M>> {
        async move {
            let mut messages = Vec::new();
            for effect in self.effects {
                if let Effect::Run { stream, .. } = effect {
                    messages.extend(stream.collect::<Vec<_>>().await);
                }
            }
            messages
        }
        .boxed()
    }

    pub(crate) fn into_effects(self) -> Vec<Effect<M>> {
        self.effects
    }
}

impl<M> std::fmt::Debug for Task<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("effects", &self.effects.len())
            .finish()
    }
}

/// Result of offering a message to an update function
#[must_use]
#[derive(Debug)]
pub enum Outcome<M> {
    /// The message was valid in the current state
    Handled(Task<M>),
    /// The message was not valid in the current state; nothing changed
    Ignored,
}

impl<M: Send + 'static> Outcome<M> {
    /// Handled with no effect
    pub fn none() -> Self {
        Outcome::Handled(Task::none())
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, Outcome::Ignored)
    }

    pub fn map<N: Send + 'static>(self, f: impl Fn(M) -> N + Send + Sync + 'static) -> Outcome<N> {
        match self {
            Outcome::Handled(task) => Outcome::Handled(task.map(f)),
            Outcome::Ignored => Outcome::Ignored,
        }
    }

    /// The task, or no effect if ignored
    pub fn into_task(self) -> Task<M> {
        match self {
            Outcome::Handled(task) => task,
            Outcome::Ignored => Task::none(),
        }
    }
}

impl<M> From<Task<M>> for Outcome<M> {
    fn from(task: Task<M>) -> Self {
        Outcome::Handled(task)
    }
}
