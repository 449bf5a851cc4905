//! First-in, first-out close strategy.

use super::sequence::{Order, Sequence};
use super::CloseStrategy;
use crate::closer::Closer;
use crate::context::Context;
use crate::errors::CloseErrors;
use async_trait::async_trait;
use std::sync::Arc;

/// Closes registered resources one at a time, in registration order.
///
/// Each close runs on its own task; the next one starts only after the
/// previous one finished. If the context fires first, the walk stops and the
/// cancellation is appended to the failures seen so far.
#[derive(Debug, Default)]
pub struct Queue {
    sequence: Sequence,
}

impl Queue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CloseStrategy for Queue {
    fn append(&self, closer: Arc<dyn Closer>) {
        self.sequence.append(closer);
    }

    async fn close_all_with(&self, ctx: &Context) -> Result<(), CloseErrors> {
        self.sequence.close(Order::Registration, ctx).await
    }

    fn len(&self) -> usize {
        self.sequence.len()
    }
}

#[async_trait]
impl Closer for Queue {
    async fn close(&self) -> anyhow::Result<()> {
        Ok(self.close_all().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancelReason;
    use crate::testing::{CloseLog, RecordingCloser};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[tokio::test]
    async fn test_close_in_registration_order() {
        let log = CloseLog::new();
        let queue = Queue::new();
        for name in ["a", "b", "c"] {
            queue.append(RecordingCloser::new(name).with_log(&log).into_closer());
        }

        queue.close_all().await.unwrap();

        assert_eq!(log.started(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_walk() {
        let log = CloseLog::new();
        let queue = Queue::new();
        queue.append(RecordingCloser::new("a").with_log(&log).failing("close error").into_closer());
        queue.append(RecordingCloser::new("b").with_log(&log).into_closer());

        let err = queue.close_all().await.unwrap_err();

        assert!(err.to_string().contains("close error"));
        assert_eq!(log.completed(), vec!["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_before_next_entry() {
        let log = CloseLog::new();
        let queue = Queue::new();
        queue.append(
            RecordingCloser::new("slow")
                .with_log(&log)
                .with_delay(Duration::from_millis(100))
                .into_closer(),
        );
        queue.append(RecordingCloser::new("never").with_log(&log).into_closer());

        let ctx = Context::background().with_timeout(Duration::from_millis(50));
        let err = queue.close_all_with(&ctx).await.unwrap_err();

        assert!(err.to_string().contains("context deadline exceeded"));
        assert_eq!(err.cancellation(), Some(&CancelReason::DeadlineExceeded));
        assert_eq!(log.started(), vec!["slow"]);
    }

    #[tokio::test]
    async fn test_queue_nests_as_closer() {
        let log = CloseLog::new();
        let inner = Arc::new(Queue::new());
        inner.append(RecordingCloser::new("inner").with_log(&log).failing("inner broke").into_closer());

        let outer = Queue::new();
        outer.append(RecordingCloser::new("outer").with_log(&log).into_closer());
        outer.append(inner);

        let err = outer.close_all().await.unwrap_err();

        assert_eq!(log.completed(), vec!["outer", "inner"]);
        assert!(err.to_string().contains("inner broke"));
    }
}
