//! Exactly-once shutdown orchestration.
//!
//! A [`Registry`] wraps a replaceable [`CloseStrategy`] and guarantees the
//! strategy's close runs at most once, however many callers race to close
//! it. Applications create one at their entry point and hand it down through
//! a [`Context`] (see [`attach`](crate::context::attach)); the
//! [`global`](crate::global) module keeps a process-wide instance for code
//! that cannot thread one through.

use crate::closer::Closer;
use crate::context::Context;
use crate::errors::{CloseError, CloseErrors, TeardownError};
use crate::logging::Logger;
use crate::signals::{wait_for_signals, wait_for_signals_with, Signal};
use crate::strategy::{panic_message, CloseStrategy, Stack};
use async_trait::async_trait;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

type CloseRun = Shared<BoxFuture<'static, Result<(), CloseErrors>>>;

/// A strategy plus a one-time close guard.
pub struct Registry {
    /// The strategy collecting registrations.
    strategy: RwLock<Arc<dyn CloseStrategy>>,
    /// Flips once, when the close run starts.
    fired: AtomicBool,
    /// The one close run, shared by every caller.
    run: Mutex<Option<CloseRun>>,
}

impl Registry {
    /// Creates a registry backed by a [`Stack`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_strategy(Arc::new(Stack::new()))
    }

    /// Creates a registry backed by `strategy`.
    #[must_use]
    pub fn with_strategy(strategy: Arc<dyn CloseStrategy>) -> Self {
        Self {
            strategy: RwLock::new(strategy),
            fired: AtomicBool::new(false),
            run: Mutex::new(None),
        }
    }

    /// Replaces the strategy.
    ///
    /// Registrations made on the previous strategy stay with it. Fails once
    /// the close run has started.
    pub fn set_strategy(&self, strategy: Arc<dyn CloseStrategy>) -> Result<(), TeardownError> {
        let mut current = self.strategy.write();
        if self.is_closed() {
            return Err(TeardownError::AlreadyClosed);
        }
        *current = strategy;
        Ok(())
    }

    /// Returns the current strategy.
    #[must_use]
    pub fn strategy(&self) -> Arc<dyn CloseStrategy> {
        Arc::clone(&self.strategy.read())
    }

    /// Registers a closer with the current strategy.
    pub fn append(&self, closer: Arc<dyn Closer>) {
        if self.is_closed() {
            warn!("closer registered after shutdown started; it will not be closed");
        }
        self.strategy.read().append(closer);
    }

    /// Returns true once the close run has started.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Closes everything, waiting as long as it takes.
    pub async fn close(&self) -> Result<(), CloseErrors> {
        self.close_with(&Context::background()).await
    }

    /// Closes everything at most once.
    ///
    /// The first caller starts the strategy's close under its `ctx` on a
    /// detached task. Every caller, concurrent or later, awaits that one run
    /// and receives the same outcome; later callers' contexts are not
    /// consulted. Dropping a caller's future never abandons the run.
    pub async fn close_with(&self, ctx: &Context) -> Result<(), CloseErrors> {
        let run = self.run.lock().get_or_insert_with(|| self.start(ctx)).clone();
        run.await
    }

    fn start(&self, ctx: &Context) -> CloseRun {
        self.fired.store(true, Ordering::SeqCst);
        let strategy = self.strategy();
        let ctx = ctx.clone();
        let handle = tokio::spawn(async move {
            info!(entries = strategy.len(), "closing registered resources");
            let outcome = strategy.close_all_with(&ctx).await;
            match &outcome {
                Ok(()) => info!("all resources closed"),
                Err(errors) => warn!(failures = errors.len(), error = %errors, "shutdown finished with failures"),
            }
            outcome
        });

        async move {
            handle.await.unwrap_or_else(|e| {
                let error = if e.is_panic() {
                    CloseError::Panicked(panic_message(e.into_panic().as_ref()))
                } else {
                    CloseError::Lost
                };
                Err(error.into())
            })
        }
        .boxed()
        .shared()
    }

    /// Waits for one of `signals`, then closes everything.
    pub async fn close_on_signal(&self, logger: &dyn Logger, signals: &[Signal]) -> Result<(), TeardownError> {
        wait_for_signals(logger, signals).await?;
        Ok(self.close().await?)
    }

    /// Waits for one of `signals` or for `ctx` to fire, then closes
    /// everything under `ctx`.
    ///
    /// If `ctx` already fired, the close run stops waiting at once.
    pub async fn close_on_signal_with(
        &self,
        ctx: &Context,
        logger: &dyn Logger,
        signals: &[Signal],
    ) -> Result<(), TeardownError> {
        wait_for_signals_with(ctx, logger, signals).await?;
        Ok(self.close_with(ctx).await?)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("entries", &self.strategy().len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[async_trait]
impl CloseStrategy for Registry {
    fn append(&self, closer: Arc<dyn Closer>) {
        Self::append(self, closer);
    }

    async fn close_all_with(&self, ctx: &Context) -> Result<(), CloseErrors> {
        self.close_with(ctx).await
    }

    fn len(&self) -> usize {
        self.strategy().len()
    }
}

#[async_trait]
impl Closer for Registry {
    async fn close(&self) -> anyhow::Result<()> {
        Ok(Self::close(self).await?)
    }
}
