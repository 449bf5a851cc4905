//! Concurrent close strategy.

use super::{dispatch, received, CloseStrategy};
use crate::closer::Closer;
use crate::context::Context;
use crate::errors::{append, CloseError, CloseErrors};
use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

/// Closes every registered resource at once.
///
/// For independent resources of equal priority: the run takes as long as
/// the slowest close rather than the sum, and a deadline bounds the whole
/// batch. When the context fires, closes that have not finished keep running
/// detached, and the cancellation is appended to the failures collected so
/// far.
#[derive(Default)]
pub struct Group {
    /// Registered closers, in registration order.
    entries: Mutex<Vec<Arc<dyn Closer>>>,
    /// Serializes close runs without blocking `append`.
    closing: tokio::sync::Mutex<()>,
}

impl Group {
    /// Creates an empty group.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CloseStrategy for Group {
    fn append(&self, closer: Arc<dyn Closer>) {
        self.entries.lock().push(closer);
    }

    async fn close_all_with(&self, ctx: &Context) -> Result<(), CloseErrors> {
        let _closing = self.closing.lock().await;
        let entries = self.entries.lock().clone();
        if entries.is_empty() {
            return Ok(());
        }

        debug!(total = entries.len(), "closing group");

        // Failures in completion order.
        let failures: Mutex<Vec<CloseError>> = Mutex::new(Vec::new());
        let receivers: Vec<_> = entries.into_iter().map(dispatch).collect();

        let legs = receivers.into_iter().map(|rx| {
            let failures = &failures;
            async move {
                tokio::select! {
                    biased;
                    result = rx => {
                        if let Err(error) = received(result) {
                            warn!(error = %error, "group entry failed to close");
                            failures.lock().push(error);
                        }
                        false
                    }
                    () = ctx.done() => true,
                }
            }
        });
        let abandoned = join_all(legs).await.into_iter().filter(|&a| a).count();

        let collected: CloseErrors = failures.into_inner().into_iter().collect();
        let outcome = collected.into_result();
        if abandoned == 0 {
            return outcome;
        }

        let reason = ctx.cancel_reason();
        warn!(abandoned, reason = %reason, "stopped waiting for group shutdown");
        append(outcome, Err(CloseError::Cancelled(reason)))
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[async_trait]
impl Closer for Group {
    async fn close(&self) -> anyhow::Result<()> {
        Ok(self.close_all().await?)
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancelReason;
    use crate::testing::RecordingCloser;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_group_close_runs_concurrently() {
        let group = Group::new();
        let closers: Vec<_> = [10, 20, 30]
            .into_iter()
            .map(|ms| {
                RecordingCloser::new(format!("c{ms}")).with_delay(Duration::from_millis(ms))
            })
            .collect();
        for closer in &closers {
            group.append(closer.clone().into_closer());
        }

        let start = Instant::now();
        group.close_all().await.unwrap();
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_millis(30));
        assert!(elapsed < Duration::from_millis(60));
        for closer in &closers {
            assert_eq!(closer.completed_count(), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_group_close_reports_failure() {
        let group = Group::new();
        let c1 = RecordingCloser::new("c1").with_delay(Duration::from_millis(10));
        let c2 = RecordingCloser::new("c2")
            .with_delay(Duration::from_millis(20))
            .failing("closer error");
        let c3 = RecordingCloser::new("c3").with_delay(Duration::from_millis(30));
        for closer in [&c1, &c2, &c3] {
            group.append(closer.clone().into_closer());
        }

        let err = group.close_all().await.unwrap_err();

        assert!(err.to_string().contains("closer error"));
        assert_eq!(c1.completed_count(), 1);
        assert_eq!(c2.completed_count(), 1);
        assert_eq!(c3.completed_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_group_close_with_deadline() {
        let group = Group::new();
        let c1 = RecordingCloser::new("c1").with_delay(Duration::from_millis(11));
        let c2 = RecordingCloser::new("c2").with_delay(Duration::from_millis(21));
        let c3 = RecordingCloser::new("c3").with_delay(Duration::from_millis(800));
        for closer in [&c1, &c2, &c3] {
            group.append(closer.clone().into_closer());
        }

        let ctx = Context::background().with_timeout(Duration::from_millis(40));
        let err = group.close_all_with(&ctx).await.unwrap_err();

        assert_eq!(err.len(), 1);
        assert_eq!(err.cancellation(), Some(&CancelReason::DeadlineExceeded));
        assert_eq!(c1.completed_count(), 1);
        assert_eq!(c2.completed_count(), 1);
        // Started, but still running detached.
        assert_eq!(c3.started_count(), 1);
        assert_eq!(c3.completed_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_group_no_cancellation_error_when_all_finished() {
        let group = Group::new();
        group.append(RecordingCloser::new("fast").into_closer());

        let ctx = Context::background().with_timeout(Duration::from_millis(40));
        assert!(group.close_all_with(&ctx).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_failure_not_aggregated() {
        let group = Group::new();
        group.append(
            RecordingCloser::new("late")
                .with_delay(Duration::from_millis(100))
                .failing("too late")
                .into_closer(),
        );

        let ctx = Context::background().with_timeout(Duration::from_millis(10));
        let err = group.close_all_with(&ctx).await.unwrap_err();

        assert_eq!(err.to_string(), "context deadline exceeded");
    }

    #[tokio::test]
    async fn test_group_already_cancelled_context() {
        let group = Group::new();
        group.append(
            RecordingCloser::new("slow")
                .with_delay(Duration::from_secs(60))
                .into_closer(),
        );

        let ctx = Context::background();
        ctx.cancel();

        let err = group.close_all_with(&ctx).await.unwrap_err();
        assert_eq!(err.cancellation(), Some(&CancelReason::Canceled));
    }
}
