//! Cancellation signals observed by close operations.
//!
//! A [`CancellationToken`] carries "abandon now" with an optional deadline and
//! a terminal [`CancelReason`] once fired. Close operations observe tokens
//! through a [`Context`](crate::context::Context); they never own them.

mod token;

pub use token::{CancelCallback, CancelReason, CancellationToken};
