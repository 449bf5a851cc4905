//! One-at-a-time walk shared by [`Queue`](super::Queue) and [`Stack`](super::Stack).

use super::{dispatch, received};
use crate::closer::Closer;
use crate::context::Context;
use crate::errors::{append, CloseError, CloseErrors};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Order {
    Registration,
    Reverse,
}

/// A registration list closed one entry at a time.
#[derive(Default)]
pub(super) struct Sequence {
    /// Registered closers, in registration order.
    entries: Mutex<Vec<Arc<dyn Closer>>>,
    /// Serializes close runs without blocking `append`.
    closing: tokio::sync::Mutex<()>,
}

impl Sequence {
    pub(super) fn append(&self, closer: Arc<dyn Closer>) {
        self.entries.lock().push(closer);
    }

    pub(super) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Walks the entries in `order`, one at a time.
    ///
    /// Stops at the first entry still running when `ctx` fires and appends the
    /// cancellation last. Entries after it are never started.
    pub(super) async fn close(&self, order: Order, ctx: &Context) -> Result<(), CloseErrors> {
        let _closing = self.closing.lock().await;
        let mut entries = self.entries.lock().clone();
        if order == Order::Reverse {
            entries.reverse();
        }

        let total = entries.len();
        let mut outcome = Ok(());

        for (position, closer) in entries.into_iter().enumerate() {
            debug!(position, total, ?order, "closing entry");
            let rx = dispatch(closer);

            tokio::select! {
                biased;
                result = rx => {
                    let result = received(result);
                    if let Err(error) = &result {
                        warn!(position, error = %error, "entry failed to close");
                    }
                    outcome = append(outcome, result);
                }
                () = ctx.done() => {
                    let reason = ctx.cancel_reason();
                    warn!(
                        position,
                        skipped = total - position - 1,
                        reason = %reason,
                        "stopped waiting for shutdown",
                    );
                    return append(outcome, Err(CloseError::Cancelled(reason)));
                }
            }
        }

        outcome
    }
}

impl std::fmt::Debug for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequence")
            .field("len", &self.len())
            .finish()
    }
}
