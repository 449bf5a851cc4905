//! Error types for teardown.
//!
//! Every close operation reports its failures as a single [`CloseErrors`]
//! composite. The individual constituents are [`CloseError`]s: a resource
//! that failed to close, a close task that panicked, or the cancellation that
//! stopped the orchestrator from waiting. [`combine`] and [`append`] build
//! composites from individual outcomes.

use crate::cancellation::CancelReason;
use crate::signals::Signal;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// The main error type for teardown operations outside a close run.
#[derive(Debug, Error)]
pub enum TeardownError {
    /// The registry already ran its close, so its strategy can no longer change.
    #[error("registry already closed")]
    AlreadyClosed,

    /// A signal handler could not be installed.
    #[error("signal handler error: {0}")]
    Signal(#[from] std::io::Error),

    /// The signal cannot be observed on this platform.
    #[error("unsupported signal: {0}")]
    UnsupportedSignal(Signal),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Closing the registered resources failed.
    #[error("{0}")]
    Close(#[from] CloseErrors),
}

/// A single failure observed while closing resources.
#[derive(Debug, Clone, Error)]
pub enum CloseError {
    /// The resource's own close operation failed.
    #[error("{0:#}")]
    Closer(Arc<anyhow::Error>),

    /// The close task panicked.
    #[error("closer panicked: {0}")]
    Panicked(String),

    /// The close task ended without reporting an outcome.
    #[error("close task ended without reporting an outcome")]
    Lost,

    /// The orchestrator stopped waiting because the context fired.
    #[error("{0}")]
    Cancelled(#[from] CancelReason),
}

impl From<anyhow::Error> for CloseError {
    fn from(err: anyhow::Error) -> Self {
        Self::Closer(Arc::new(err))
    }
}

impl CloseError {
    /// Returns the cancellation reason if this failure is a cancellation.
    #[must_use]
    pub fn cancellation(&self) -> Option<&CancelReason> {
        match self {
            Self::Cancelled(reason) => Some(reason),
            _ => None,
        }
    }
}

/// The composite failure returned by every close operation.
///
/// Constituents keep the order in which they were observed. A `CloseErrors`
/// returned from this crate is never empty: success is `Ok(())`.
#[derive(Debug, Clone, Default)]
pub struct CloseErrors {
    errors: Vec<CloseError>,
}

impl CloseErrors {
    /// Creates an empty composite.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a failure at the end.
    pub fn push(&mut self, error: impl Into<CloseError>) {
        self.errors.push(error.into());
    }

    /// Returns the number of constituent failures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns true if there are no constituent failures.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Iterates over the constituent failures in observed order.
    pub fn iter(&self) -> std::slice::Iter<'_, CloseError> {
        self.errors.iter()
    }

    /// Returns the constituent failures.
    #[must_use]
    pub fn errors(&self) -> &[CloseError] {
        &self.errors
    }

    /// Returns the cancellation that cut the run short, if any.
    #[must_use]
    pub fn cancellation(&self) -> Option<&CancelReason> {
        self.errors.iter().find_map(CloseError::cancellation)
    }

    /// Returns true if the run was abandoned because a deadline passed.
    #[must_use]
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self.cancellation(), Some(CancelReason::DeadlineExceeded))
    }

    /// Converts into `Ok(())` when empty.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for CloseErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CloseErrors {}

impl From<CloseError> for CloseErrors {
    fn from(error: CloseError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl Extend<CloseError> for CloseErrors {
    fn extend<T: IntoIterator<Item = CloseError>>(&mut self, iter: T) {
        self.errors.extend(iter);
    }
}

impl FromIterator<CloseError> for CloseErrors {
    fn from_iter<T: IntoIterator<Item = CloseError>>(iter: T) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for CloseErrors {
    type Item = CloseError;
    type IntoIter = std::vec::IntoIter<CloseError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a CloseErrors {
    type Item = &'a CloseError;
    type IntoIter = std::slice::Iter<'a, CloseError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

/// Combines individual outcomes into one.
///
/// Returns `Ok(())` when every outcome succeeded; otherwise a composite
/// carrying each failure in order.
pub fn combine<I>(outcomes: I) -> Result<(), CloseErrors>
where
    I: IntoIterator<Item = Result<(), CloseError>>,
{
    outcomes.into_iter().fold(Ok(()), append)
}

/// Appends one outcome to an accumulated result.
pub fn append(
    existing: Result<(), CloseErrors>,
    outcome: Result<(), CloseError>,
) -> Result<(), CloseErrors> {
    match (existing, outcome) {
        (existing, Ok(())) => existing,
        (Ok(()), Err(error)) => Err(CloseErrors::from(error)),
        (Err(mut errors), Err(error)) => {
            errors.push(error);
            Err(errors)
        }
    }
}
