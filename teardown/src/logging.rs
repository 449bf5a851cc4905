//! Loggers used to report caught termination signals.

use crate::errors::TeardownError;
use parking_lot::RwLock;
use std::fmt;
use tracing::{debug, error, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;

/// A sink for formatted messages.
pub trait Logger: Send + Sync {
    /// Emits one formatted message.
    fn log(&self, args: fmt::Arguments<'_>);
}

/// A logger that discards all messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn log(&self, _args: fmt::Arguments<'_>) {}
}

/// A logger that forwards messages to `tracing`.
#[derive(Debug, Clone)]
pub struct TracingLogger {
    /// The level to emit at.
    level: Level,
}

impl Default for TracingLogger {
    fn default() -> Self {
        Self { level: Level::WARN }
    }
}

impl TracingLogger {
    /// Creates a logger emitting at `level`.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates an info-level logger.
    #[must_use]
    pub fn info() -> Self {
        Self::new(Level::INFO)
    }
}

impl Logger for TracingLogger {
    fn log(&self, args: fmt::Arguments<'_>) {
        match self.level {
            Level::ERROR => error!("{}", args),
            Level::WARN => warn!("{}", args),
            Level::INFO => info!("{}", args),
            Level::DEBUG => debug!("{}", args),
            _ => trace!("{}", args),
        }
    }
}

/// A logger that keeps every message, for tests.
#[derive(Debug, Default)]
pub struct CollectingLogger {
    messages: RwLock<Vec<String>>,
}

impl CollectingLogger {
    /// Creates an empty collecting logger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected messages.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.messages.read().clone()
    }

    /// Returns the most recent message.
    #[must_use]
    pub fn last(&self) -> Option<String> {
        self.messages.read().last().cloned()
    }

    /// Clears collected messages.
    pub fn clear(&self) {
        self.messages.write().clear();
    }
}

impl Logger for CollectingLogger {
    fn log(&self, args: fmt::Arguments<'_>) {
        self.messages.write().push(args.to_string());
    }
}

/// Installs a global `tracing` subscriber for a binary embedding teardown.
///
/// `RUST_LOG` takes precedence over `default_filter`.
pub fn init_tracing(default_filter: &str) -> Result<(), TeardownError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| TeardownError::Config(format!("invalid log filter: {e}")))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| TeardownError::Config(format!("tracing already initialized: {e}")))
}
