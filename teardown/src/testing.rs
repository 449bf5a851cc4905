//! Test doubles for code that registers resources.
//!
//! [`RecordingCloser`] stands in for a real resource: it can be slowed down,
//! made to fail, and it records when its close started and finished into a
//! shared [`CloseLog`].

use crate::closer::Closer;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shared record of close calls, in the order they happened.
#[derive(Debug, Clone, Default)]
pub struct CloseLog {
    started: Arc<Mutex<Vec<String>>>,
    completed: Arc<Mutex<Vec<String>>>,
}

impl CloseLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of closers whose close started.
    #[must_use]
    pub fn started(&self) -> Vec<String> {
        self.started.lock().clone()
    }

    /// Names of closers whose close returned.
    #[must_use]
    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().clone()
    }
}

/// A configurable closer that records its calls.
///
/// Clones share counters, so a test can keep one clone for assertions and
/// register the other.
#[derive(Debug, Clone)]
pub struct RecordingCloser {
    name: String,
    delay: Option<Duration>,
    error: Option<String>,
    log: Option<CloseLog>,
    started: Arc<AtomicUsize>,
    completed: Arc<AtomicUsize>,
}

impl RecordingCloser {
    /// Creates a closer that succeeds immediately.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            delay: None,
            error: None,
            log: None,
            started: Arc::new(AtomicUsize::new(0)),
            completed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sleeps for `delay` before finishing.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fails with `message` when closed.
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    /// Records calls into `log`.
    #[must_use]
    pub fn with_log(mut self, log: &CloseLog) -> Self {
        self.log = Some(log.clone());
        self
    }

    /// Returns the closer's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of closes started.
    #[must_use]
    pub fn started_count(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Number of closes finished.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Converts into a registrable closer.
    #[must_use]
    pub fn into_closer(self) -> Arc<dyn Closer> {
        Arc::new(self)
    }
}

#[async_trait]
impl Closer for RecordingCloser {
    async fn close(&self) -> anyhow::Result<()> {
        self.started.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.log {
            log.started.lock().push(self.name.clone());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.completed.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.log {
            log.completed.lock().push(self.name.clone());
        }

        match &self.error {
            Some(message) => Err(anyhow::anyhow!("{message}")),
            None => Ok(()),
        }
    }
}
