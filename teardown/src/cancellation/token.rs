//! Cancellation token observed by close operations.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::warn;

/// The terminal error of a fired token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CancelReason {
    /// Cancelled without a reason.
    #[error("context canceled")]
    Canceled,

    /// The token's deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// Cancelled with an explicit reason.
    #[error("context canceled: {0}")]
    Requested(String),
}

/// A callback invoked once when the token fires.
pub type CancelCallback = Box<dyn FnOnce(&CancelReason) + Send>;

/// A token carrying "stop waiting now", with an optional deadline.
///
/// Firing is idempotent: only the first reason is kept. Tokens never
/// interrupt work on their own; close operations observe them to decide when
/// to stop waiting.
#[derive(Default)]
pub struct CancellationToken {
    /// Whether the token has fired.
    cancelled: AtomicBool,
    /// The terminal error (first one wins).
    reason: RwLock<Option<CancelReason>>,
    /// Callbacks to invoke on cancellation.
    callbacks: Mutex<Vec<CancelCallback>>,
    /// Derived tokens that fire with this one.
    children: Mutex<Vec<Weak<Self>>>,
    /// Wakes tasks parked in [`cancelled`](Self::cancelled).
    notify: Notify,
    /// When the token fires on its own, if ever.
    deadline: Option<Instant>,
}

impl CancellationToken {
    /// Creates a token that only fires when cancelled explicitly.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Creates a token that fires with [`CancelReason::DeadlineExceeded`] at `deadline`.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Arc<Self> {
        let token = Arc::new(Self {
            deadline: Some(deadline),
            ..Self::default()
        });
        token.arm_deadline(deadline);
        token
    }

    /// Creates a token that fires once `timeout` has elapsed.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Arc<Self> {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Derives a token that fires when this one fires, or earlier at `deadline`.
    ///
    /// Cancelling the child never affects the parent.
    #[must_use]
    pub fn child(self: &Arc<Self>, deadline: Option<Instant>) -> Arc<Self> {
        let own_deadline = match (self.deadline, deadline) {
            (Some(parent), Some(child)) if child < parent => Some(child),
            (None, Some(child)) => Some(child),
            _ => None,
        };

        let child = Arc::new(Self {
            deadline: own_deadline.or(self.deadline),
            ..Self::default()
        });
        if let Some(deadline) = own_deadline {
            child.arm_deadline(deadline);
        }

        let mut children = self.children.lock();
        if self.is_cancelled() {
            drop(children);
            child.cancel_with(self.reason().unwrap_or(CancelReason::Canceled));
        } else {
            children.retain(|weak| weak.strong_count() > 0);
            children.push(Arc::downgrade(&child));
        }

        child
    }

    fn arm_deadline(self: &Arc<Self>, deadline: Instant) {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(token) = weak.upgrade() {
                token.cancel_with(CancelReason::DeadlineExceeded);
            }
        });
    }

    /// Requests cancellation with a reason.
    pub fn cancel(&self, reason: impl Into<String>) {
        self.cancel_with(CancelReason::Requested(reason.into()));
    }

    /// Fires the token with the given terminal error.
    ///
    /// Only the first call has any effect. Callbacks run immediately; panics
    /// in callbacks are logged and suppressed.
    pub fn cancel_with(&self, reason: CancelReason) {
        {
            let mut slot = self.reason.write();
            if slot.is_some() {
                return;
            }
            *slot = Some(reason.clone());
            self.cancelled.store(true, Ordering::SeqCst);
        }

        self.notify.notify_waiters();

        let children = std::mem::take(&mut *self.children.lock());
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel_with(reason.clone());
        }

        let callbacks = std::mem::take(&mut *self.callbacks.lock());
        for callback in callbacks {
            if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                callback(&reason);
            })) {
                warn!("Cancellation callback panicked: {:?}", e);
            }
        }
    }

    /// Registers a callback to be invoked on cancellation.
    ///
    /// If already cancelled, the callback is invoked immediately.
    pub fn on_cancel<F>(&self, callback: F)
    where
        F: FnOnce(&CancelReason) + Send + 'static,
    {
        let mut callbacks = self.callbacks.lock();
        if self.is_cancelled() {
            drop(callbacks);
            let reason = self.reason().unwrap_or(CancelReason::Canceled);
            if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                callback(&reason);
            })) {
                warn!("Cancellation callback panicked: {:?}", e);
            }
        } else {
            callbacks.push(Box::new(callback));
        }
    }

    /// Returns whether the token has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the terminal error, if the token has fired.
    #[must_use]
    pub fn reason(&self) -> Option<CancelReason> {
        self.reason.read().clone()
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Completes once the token has fired.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .field("deadline", &self.deadline)
            .finish()
    }
}
