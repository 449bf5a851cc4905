//! Waiting for process termination signals.
//!
//! These helpers are thin adapters over [`tokio::signal`]. On Unix every
//! [`Signal`] is supported; elsewhere only [`Signal::Interrupt`] (Ctrl-C).

use crate::cancellation::CancelReason;
use crate::context::Context;
use crate::errors::TeardownError;
use crate::logging::Logger;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// A termination signal to wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    /// SIGINT, or Ctrl-C.
    Interrupt,
    /// SIGTERM.
    Terminate,
    /// SIGQUIT.
    Quit,
    /// SIGHUP.
    Hangup,
}

impl Signal {
    /// Signals waited for when none are given.
    pub const DEFAULT: &'static [Signal] = &[Signal::Interrupt, Signal::Terminate];

    #[cfg(unix)]
    fn kind(self) -> tokio::signal::unix::SignalKind {
        use tokio::signal::unix::SignalKind;

        match self {
            Self::Interrupt => SignalKind::interrupt(),
            Self::Terminate => SignalKind::terminate(),
            Self::Quit => SignalKind::quit(),
            Self::Hangup => SignalKind::hangup(),
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Interrupt => "interrupt",
            Self::Terminate => "terminated",
            Self::Quit => "quit",
            Self::Hangup => "hangup",
        };
        f.write_str(name)
    }
}

/// Why a signal wait returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WakeCause {
    /// A signal arrived.
    Signal(Signal),
    /// The context fired first.
    Cancelled(CancelReason),
}

impl fmt::Display for WakeCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal(signal) => write!(f, "{signal}"),
            Self::Cancelled(reason) => write!(f, "{reason}"),
        }
    }
}

/// Blocks until one of `signals` arrives, then reports it through `logger`.
///
/// An empty slice waits for [`Signal::DEFAULT`].
pub async fn wait_for_signals(logger: &dyn Logger, signals: &[Signal]) -> Result<Signal, TeardownError> {
    let signal = recv_any(signals).await?;
    info!(signal = %signal, "termination signal received");
    logger.log(format_args!("Received signal: {signal}"));
    Ok(signal)
}

/// Like [`wait_for_signals`], but also returns when `ctx` fires.
pub async fn wait_for_signals_with(
    ctx: &Context,
    logger: &dyn Logger,
    signals: &[Signal],
) -> Result<WakeCause, TeardownError> {
    let cause = tokio::select! {
        received = recv_any(signals) => WakeCause::Signal(received?),
        () = ctx.done() => WakeCause::Cancelled(ctx.cancel_reason()),
    };
    info!(cause = %cause, "stopped waiting for termination signal");
    logger.log(format_args!("Received signal: {cause}"));
    Ok(cause)
}

#[cfg(unix)]
async fn recv_any(signals: &[Signal]) -> Result<Signal, TeardownError> {
    use tokio::signal::unix::signal;

    let signals = if signals.is_empty() { Signal::DEFAULT } else { signals };
    let mut listeners = signals
        .iter()
        .map(|&s| signal(s.kind()).map(|listener| (s, listener)))
        .collect::<Result<Vec<_>, std::io::Error>>()?;

    let waits = listeners.iter_mut().map(|(s, listener)| {
        let s = *s;
        Box::pin(async move {
            listener.recv().await;
            s
        })
    });
    let (received, _, _) = futures::future::select_all(waits).await;
    Ok(received)
}

#[cfg(not(unix))]
async fn recv_any(signals: &[Signal]) -> Result<Signal, TeardownError> {
    if let Some(&unsupported) = signals.iter().find(|&&s| s != Signal::Interrupt) {
        return Err(TeardownError::UnsupportedSignal(unsupported));
    }
    tokio::signal::ctrl_c().await?;
    Ok(Signal::Interrupt)
}

/// Serializes tests that listen for process signals.
#[cfg(test)]
pub(crate) static SIGNAL_TESTS: std::sync::LazyLock<tokio::sync::Mutex<()>> =
    std::sync::LazyLock::new(Default::default);

/// Raises SIGINT in this process once a listener has had time to install.
#[cfg(all(test, unix))]
pub(crate) fn raise_interrupt_soon() -> tokio::task::JoinHandle<()> {
    tokio::spawn(async {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        nix::sys::signal::raise(nix::sys::signal::Signal::SIGINT).unwrap();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::CollectingLogger;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn test_signal_names() {
        assert_eq!(Signal::Interrupt.to_string(), "interrupt");
        assert_eq!(Signal::Terminate.to_string(), "terminated");
    }

    #[test]
    fn test_signal_serde() {
        let parsed: Vec<Signal> = serde_json::from_str(r#"["interrupt", "hangup"]"#).unwrap();
        assert_eq!(parsed, vec![Signal::Interrupt, Signal::Hangup]);
    }

    #[tokio::test]
    async fn test_wait_with_deadline() {
        let _serial = SIGNAL_TESTS.lock().await;
        let logger = CollectingLogger::new();
        let ctx = Context::background().with_timeout(Duration::from_millis(100));

        let cause = wait_for_signals_with(&ctx, &logger, &[Signal::Interrupt]).await.unwrap();

        assert_eq!(cause, WakeCause::Cancelled(CancelReason::DeadlineExceeded));
        assert_eq!(
            logger.messages(),
            vec!["Received signal: context deadline exceeded".to_string()]
        );
    }

    #[tokio::test]
    async fn test_wait_with_cancelled_context() {
        let _serial = SIGNAL_TESTS.lock().await;
        let logger = CollectingLogger::new();
        let ctx = Context::background();
        ctx.cancel();

        let cause = wait_for_signals_with(&ctx, &logger, &[Signal::Interrupt]).await.unwrap();

        assert_eq!(cause, WakeCause::Cancelled(CancelReason::Canceled));
        assert_eq!(logger.last().as_deref(), Some("Received signal: context canceled"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_wait_for_interrupt() {
        let _serial = SIGNAL_TESTS.lock().await;
        let logger = CollectingLogger::new();
        let raiser = raise_interrupt_soon();

        let signal = wait_for_signals(&logger, &[]).await.unwrap();
        raiser.await.unwrap();

        assert_eq!(signal, Signal::Interrupt);
        assert_eq!(logger.messages(), vec!["Received signal: interrupt".to_string()]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_wait_with_signal_before_deadline() {
        let _serial = SIGNAL_TESTS.lock().await;
        let logger = CollectingLogger::new();
        let ctx = Context::background().with_timeout(Duration::from_secs(10));
        let raiser = raise_interrupt_soon();

        let cause = wait_for_signals_with(&ctx, &logger, &[Signal::Interrupt]).await.unwrap();
        raiser.await.unwrap();

        assert_eq!(cause, WakeCause::Signal(Signal::Interrupt));
        assert_eq!(logger.last().as_deref(), Some("Received signal: interrupt"));
    }
}
