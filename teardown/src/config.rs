//! Shutdown configuration.

use crate::context::Context;
use crate::errors::TeardownError;
use crate::logging::Logger;
use crate::registry::Registry;
use crate::signals::{wait_for_signals, Signal};
use crate::strategy::StrategyKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How an application shuts down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// Close strategy of the registry.
    #[serde(default)]
    pub strategy: StrategyKind,
    /// Upper bound on the close run in seconds; `None` waits forever.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: Option<f64>,
    /// Signals that trigger shutdown.
    #[serde(default = "default_signals")]
    pub signals: Vec<Signal>,
}

#[allow(clippy::unnecessary_wraps)]
fn default_timeout() -> Option<f64> {
    Some(30.0)
}

fn default_signals() -> Vec<Signal> {
    Signal::DEFAULT.to_vec()
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            timeout_seconds: default_timeout(),
            signals: default_signals(),
        }
    }
}

impl ShutdownConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, TeardownError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| TeardownError::Config(format!("invalid shutdown config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    /// Removes the timeout.
    #[must_use]
    pub fn without_timeout(mut self) -> Self {
        self.timeout_seconds = None;
        self
    }

    /// Sets the trigger signals.
    #[must_use]
    pub fn with_signals(mut self, signals: Vec<Signal>) -> Self {
        self.signals = signals;
        self
    }

    /// Checks that the timeout is a positive, finite number.
    pub fn validate(&self) -> Result<(), TeardownError> {
        match self.timeout_seconds {
            Some(seconds) if !seconds.is_finite() || seconds <= 0.0 => Err(TeardownError::Config(
                format!("timeout_seconds must be positive, got {seconds}"),
            )),
            _ => Ok(()),
        }
    }

    /// Returns the timeout as a duration, ignoring invalid values.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds
            .filter(|s| s.is_finite() && *s > 0.0)
            .map(Duration::from_secs_f64)
    }

    /// Builds an empty registry using the configured strategy.
    #[must_use]
    pub fn build_registry(&self) -> Registry {
        Registry::with_strategy(self.strategy.build())
    }

    /// Derives the context a close run should observe.
    ///
    /// The deadline starts now, so call this when shutdown begins.
    #[must_use]
    pub fn shutdown_context(&self, parent: &Context) -> Context {
        match self.timeout() {
            Some(timeout) => parent.with_timeout(timeout),
            None => parent.with_cancel(),
        }
    }

    /// Waits for a configured signal, then closes `registry` within the
    /// configured timeout.
    pub async fn close_on_signal(&self, registry: &Registry, logger: &dyn Logger) -> Result<(), TeardownError> {
        wait_for_signals(logger, &self.signals).await?;
        let ctx = self.shutdown_context(&Context::background());
        Ok(registry.close_with(&ctx).await?)
    }
}
