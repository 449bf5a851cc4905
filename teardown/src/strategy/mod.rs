//! Close strategies.
//!
//! This module provides:
//! - [`Queue`]: closes one at a time in registration order
//! - [`Stack`]: closes one at a time in reverse registration order
//! - [`Group`]: closes everything at once
//!
//! Every close attempt runs on its own Tokio task. When the context fires,
//! the strategy stops waiting but never aborts a task already started; it
//! keeps running detached and logs a late failure instead of reporting it.

mod group;
mod queue;
mod sequence;
mod stack;

pub use group::Group;
pub use queue::Queue;
pub use stack::Stack;

use crate::closer::Closer;
use crate::context::Context;
use crate::errors::{CloseError, CloseErrors};
use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::warn;

/// A registration list plus a policy for closing it.
#[async_trait]
pub trait CloseStrategy: Send + Sync {
    /// Registers a closer. Never fails.
    fn append(&self, closer: Arc<dyn Closer>);

    /// Closes every registered closer, waiting no longer than `ctx` allows.
    ///
    /// Calling this again re-runs over the same registrations; use a
    /// [`Registry`](crate::registry::Registry) for exactly-once semantics.
    async fn close_all_with(&self, ctx: &Context) -> Result<(), CloseErrors>;

    /// Closes every registered closer, waiting as long as it takes.
    async fn close_all(&self) -> Result<(), CloseErrors> {
        self.close_all_with(&Context::background()).await
    }

    /// Returns the number of registered closers.
    fn len(&self) -> usize;

    /// Returns true if nothing is registered.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a context derived from `ctx` that carries this strategy.
    fn attach_to(self: Arc<Self>, ctx: &Context) -> Context
    where
        Self: Sized + 'static,
    {
        ctx.with_strategy(self)
    }
}

/// The available strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// First in, first out.
    Queue,
    /// Last in, first out.
    #[default]
    Stack,
    /// All at once.
    Group,
}

impl StrategyKind {
    /// Builds an empty strategy of this kind.
    #[must_use]
    pub fn build(self) -> Arc<dyn CloseStrategy> {
        match self {
            Self::Queue => Arc::new(Queue::new()),
            Self::Stack => Arc::new(Stack::new()),
            Self::Group => Arc::new(Group::new()),
        }
    }

    /// Returns the kind as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queue => "queue",
            Self::Stack => "stack",
            Self::Group => "group",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Starts closing `closer` on a detached task.
///
/// The receiver yields the outcome. If it has been dropped by the time the
/// close finishes, a failure is logged instead.
pub(crate) fn dispatch(closer: Arc<dyn Closer>) -> oneshot::Receiver<Result<(), CloseError>> {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let outcome = match AssertUnwindSafe(closer.close()).catch_unwind().await {
            Ok(result) => result.map_err(CloseError::from),
            Err(panic) => Err(CloseError::Panicked(panic_message(panic.as_ref()))),
        };
        if let Err(Err(error)) = tx.send(outcome) {
            warn!(error = %error, "closer failed after shutdown stopped waiting");
        }
    });
    rx
}

/// Flattens a dispatched outcome.
pub(crate) fn received(
    outcome: Result<Result<(), CloseError>, oneshot::error::RecvError>,
) -> Result<(), CloseError> {
    outcome.unwrap_or(Err(CloseError::Lost))
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
