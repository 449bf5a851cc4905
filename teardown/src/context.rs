//! Cancellation-bearing contexts that can carry a close strategy.
//!
//! A [`Context`] is passed down call chains during startup and shutdown. It
//! bundles a [`CancellationToken`] with an optional close strategy, so nested
//! code can register resources with the same strategy the entry point chose
//! (see [`attach`] and [`lookup`]). Derived contexts inherit the parent's
//! strategy and fire when the parent fires.

use crate::cancellation::{CancelReason, CancellationToken};
use crate::strategy::CloseStrategy;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// A cancellation signal plus an optional strategy association.
///
/// Cloning is cheap and yields the same context.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Node>,
}

struct Node {
    token: Arc<CancellationToken>,
    strategy: Option<Arc<dyn CloseStrategy>>,
    parent: Option<Context>,
}

impl Context {
    /// Creates a root context that never fires on its own.
    #[must_use]
    pub fn background() -> Self {
        Self::from_token(CancellationToken::new())
    }

    /// Creates a root context observing an existing token.
    #[must_use]
    pub fn from_token(token: Arc<CancellationToken>) -> Self {
        Self {
            inner: Arc::new(Node {
                token,
                strategy: None,
                parent: None,
            }),
        }
    }

    fn derive(&self, token: Arc<CancellationToken>, strategy: Option<Arc<dyn CloseStrategy>>) -> Self {
        Self {
            inner: Arc::new(Node {
                token,
                strategy,
                parent: Some(self.clone()),
            }),
        }
    }

    /// Derives a context that can be cancelled independently of this one.
    #[must_use]
    pub fn with_cancel(&self) -> Self {
        self.derive(self.inner.token.child(None), None)
    }

    /// Derives a context that fires at `deadline`.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        self.derive(self.inner.token.child(Some(deadline)), None)
    }

    /// Derives a context that fires after `timeout`.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derives a context carrying `strategy`; see [`attach`].
    #[must_use]
    pub fn with_strategy(&self, strategy: Arc<dyn CloseStrategy>) -> Self {
        self.derive(Arc::clone(&self.inner.token), Some(strategy))
    }

    /// Returns the nearest attached strategy; see [`lookup`].
    #[must_use]
    pub fn strategy(&self) -> Option<Arc<dyn CloseStrategy>> {
        let mut current = Some(self);
        while let Some(ctx) = current {
            if let Some(strategy) = &ctx.inner.strategy {
                return Some(Arc::clone(strategy));
            }
            current = ctx.inner.parent.as_ref();
        }
        None
    }

    /// Returns the token this context observes.
    #[must_use]
    pub fn token(&self) -> &Arc<CancellationToken> {
        &self.inner.token
    }

    /// Fires this context and every context derived from it.
    pub fn cancel(&self) {
        self.inner.token.cancel_with(CancelReason::Canceled);
    }

    /// Returns whether the context has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Returns the terminal error once the context has fired.
    #[must_use]
    pub fn err(&self) -> Option<CancelReason> {
        self.inner.token.reason()
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.token.deadline()
    }

    /// Completes once the context has fired.
    pub async fn done(&self) {
        self.inner.token.cancelled().await;
    }

    pub(crate) fn cancel_reason(&self) -> CancelReason {
        self.err().unwrap_or(CancelReason::Canceled)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("token", &self.inner.token)
            .field("has_strategy", &self.strategy().is_some())
            .finish()
    }
}

/// Returns a context derived from `ctx` that carries `strategy`.
///
/// Attachments on deeper contexts shadow outer ones.
pub fn attach(ctx: &Context, strategy: Arc<dyn CloseStrategy>) -> Context {
    ctx.with_strategy(strategy)
}

/// Returns the strategy attached to `ctx` or its nearest ancestor.
pub fn lookup(ctx: &Context) -> Option<Arc<dyn CloseStrategy>> {
    ctx.strategy()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{Group, Queue, Stack};

    #[test]
    fn test_lookup_round_trip() {
        let stack = Arc::new(Stack::new());
        let expected: Arc<dyn CloseStrategy> = stack;
        let ctx = attach(&Context::background(), expected.clone());

        let found = lookup(&ctx).expect("strategy attached");
        assert!(Arc::ptr_eq(&found, &expected));
    }

    #[test]
    fn test_lookup_without_attachment() {
        assert!(lookup(&Context::background()).is_none());
    }

    #[test]
    fn test_attach_to_via_strategy() {
        let group = Arc::new(Group::new());
        let ctx = group.clone().attach_to(&Context::background());

        let expected: Arc<dyn CloseStrategy> = group;
        assert!(Arc::ptr_eq(&lookup(&ctx).unwrap(), &expected));
    }

    #[tokio::test]
    async fn test_descendant_sees_ancestor_strategy() {
        let queue: Arc<dyn CloseStrategy> = Arc::new(Queue::new());
        let root = attach(&Context::background(), queue.clone());
        let nested = root.with_cancel().with_timeout(Duration::from_secs(60));

        assert!(Arc::ptr_eq(&lookup(&nested).unwrap(), &queue));
    }

    #[test]
    fn test_inner_attachment_shadows_outer() {
        let outer: Arc<dyn CloseStrategy> = Arc::new(Stack::new());
        let inner: Arc<dyn CloseStrategy> = Arc::new(Queue::new());

        let outer_ctx = attach(&Context::background(), outer.clone());
        let inner_ctx = attach(&outer_ctx.with_cancel(), inner.clone());

        assert!(Arc::ptr_eq(&lookup(&inner_ctx).unwrap(), &inner));
        assert!(Arc::ptr_eq(&lookup(&outer_ctx).unwrap(), &outer));
    }

    #[test]
    fn test_cancel_propagates_to_children() {
        let root = Context::background();
        let child = root.with_cancel();
        let grandchild = attach(&child, Arc::new(Stack::new()));

        root.cancel();

        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());
        assert_eq!(grandchild.err(), Some(CancelReason::Canceled));
    }

    #[test]
    fn test_child_cancel_does_not_reach_parent() {
        let root = Context::background();
        let child = root.with_cancel();

        child.cancel();

        assert!(!root.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_fires() {
        let ctx = Context::background().with_timeout(Duration::from_millis(30));
        assert!(ctx.deadline().is_some());

        ctx.done().await;

        assert_eq!(ctx.err(), Some(CancelReason::DeadlineExceeded));
    }
}
