//! Last-in, first-out close strategy.

use super::sequence::{Order, Sequence};
use super::CloseStrategy;
use crate::closer::Closer;
use crate::context::Context;
use crate::errors::CloseErrors;
use async_trait::async_trait;
use std::sync::Arc;

/// Closes registered resources one at a time, most recent first.
///
/// Resources registered later during startup usually depend on earlier ones,
/// so this tears down dependents before their dependencies. It is the
/// default strategy of a [`Registry`](crate::registry::Registry).
#[derive(Debug, Default)]
pub struct Stack {
    sequence: Sequence,
}

impl Stack {
    /// Creates an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CloseStrategy for Stack {
    fn append(&self, closer: Arc<dyn Closer>) {
        self.sequence.append(closer);
    }

    async fn close_all_with(&self, ctx: &Context) -> Result<(), CloseErrors> {
        self.sequence.close(Order::Reverse, ctx).await
    }

    fn len(&self) -> usize {
        self.sequence.len()
    }
}

#[async_trait]
impl Closer for Stack {
    async fn close(&self) -> anyhow::Result<()> {
        Ok(self.close_all().await?)
    }
}
