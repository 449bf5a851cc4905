//! The process-wide default registry.
//!
//! Convenience functions over one lazily created [`Registry`], for code that
//! cannot receive a registry through a [`Context`]. The default strategy is a
//! [`Stack`](crate::strategy::Stack); replace it with [`set_strategy`] before
//! registering anything.

use crate::closer::Closer;
use crate::context::Context;
use crate::errors::{CloseErrors, TeardownError};
use crate::logging::Logger;
use crate::registry::Registry;
use crate::signals::Signal;
use crate::strategy::CloseStrategy;
use std::sync::{Arc, LazyLock};

static DEFAULT_REGISTRY: LazyLock<Arc<Registry>> = LazyLock::new(|| Arc::new(Registry::new()));

/// Returns the process-wide registry.
pub fn default_registry() -> Arc<Registry> {
    Arc::clone(&DEFAULT_REGISTRY)
}

/// Replaces the process-wide strategy.
pub fn set_strategy(strategy: Arc<dyn CloseStrategy>) -> Result<(), TeardownError> {
    DEFAULT_REGISTRY.set_strategy(strategy)
}

/// Registers a closer with the process-wide registry.
pub fn append(closer: Arc<dyn Closer>) {
    DEFAULT_REGISTRY.append(closer);
}

/// Closes the process-wide registry, at most once per process.
pub async fn close() -> Result<(), CloseErrors> {
    DEFAULT_REGISTRY.close().await
}

/// Closes the process-wide registry under `ctx`, at most once per process.
pub async fn close_with(ctx: &Context) -> Result<(), CloseErrors> {
    DEFAULT_REGISTRY.close_with(ctx).await
}

/// Waits for one of `signals`, then closes the process-wide registry.
pub async fn close_on_signal(logger: &dyn Logger, signals: &[Signal]) -> Result<(), TeardownError> {
    DEFAULT_REGISTRY.close_on_signal(logger, signals).await
}

/// Waits for one of `signals` or for `ctx`, then closes the process-wide
/// registry under `ctx`.
pub async fn close_on_signal_with(
    ctx: &Context,
    logger: &dyn Logger,
    signals: &[Signal],
) -> Result<(), TeardownError> {
    DEFAULT_REGISTRY.close_on_signal_with(ctx, logger, signals).await
}
