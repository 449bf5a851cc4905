//! The capability every registered resource exposes.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// A resource that can be released.
///
/// Strategies call `close` at most once per registration in a close run.
/// Whether a second call is safe is up to the implementation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Closer: Send + Sync {
    /// Releases the resource.
    async fn close(&self) -> anyhow::Result<()>;
}

/// A closer backed by an async function.
pub struct FnCloser<F> {
    f: F,
}

impl<F> FnCloser<F> {
    /// Wraps `f` as a closer.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Closer for FnCloser<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn close(&self) -> anyhow::Result<()> {
        (self.f)().await
    }
}

impl<F> std::fmt::Debug for FnCloser<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCloser").finish_non_exhaustive()
    }
}

/// A closer backed by a blocking function.
///
/// The function runs on Tokio's blocking pool so a slow `close(2)` or flush
/// does not stall the runtime's workers.
pub struct BlockingCloser<F> {
    f: Arc<F>,
}

impl<F> BlockingCloser<F> {
    /// Wraps `f` as a closer.
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

#[async_trait]
impl<F> Closer for BlockingCloser<F>
where
    F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
{
    async fn close(&self) -> anyhow::Result<()> {
        let f = Arc::clone(&self.f);
        tokio::task::spawn_blocking(move || (*f)())
            .await
            .map_err(|e| anyhow::anyhow!("blocking closer task failed: {e}"))?
    }
}

impl<F> std::fmt::Debug for BlockingCloser<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingCloser").finish_non_exhaustive()
    }
}

/// Creates a shareable closer from an async function.
pub fn closer_fn<F, Fut>(f: F) -> Arc<dyn Closer>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(FnCloser::new(f))
}

/// Creates a shareable closer from a blocking function.
pub fn blocking_closer<F>(f: F) -> Arc<dyn Closer>
where
    F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(BlockingCloser::new(f))
}
