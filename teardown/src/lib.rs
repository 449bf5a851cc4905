//! # Teardown
//!
//! Ordered, cancellable shutdown of closeable resources.
//!
//! Teardown collects resources as a program starts and closes them when it
//! stops, with:
//!
//! - **Close strategies**: one at a time in registration order ([`Queue`](strategy::Queue)),
//!   in reverse order ([`Stack`](strategy::Stack)), or all at once ([`Group`](strategy::Group))
//! - **Bounded waits**: every close observes a [`Context`](context::Context) that may carry a deadline
//! - **Complete error reports**: every failure lands in one [`CloseErrors`](errors::CloseErrors)
//! - **Exactly-once shutdown**: a [`Registry`](registry::Registry) closes its strategy at most once
//! - **Signal handling**: close when SIGINT or SIGTERM arrives
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use teardown::prelude::*;
//!
//! let registry = Arc::new(Registry::new());
//! let ctx = attach(&Context::background(), registry.clone());
//!
//! // Anywhere below, with only the context at hand:
//! lookup(&ctx).unwrap().append(closer_fn(move || async move { pool.close().await }));
//!
//! // At the entry point:
//! registry
//!     .close_on_signal(&TracingLogger::default(), Signal::DEFAULT)
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod closer;
pub mod config;
pub mod context;
pub mod errors;
pub mod global;
pub mod logging;
pub mod registry;
pub mod signals;
pub mod strategy;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::{CancelReason, CancellationToken};
    pub use crate::closer::{blocking_closer, closer_fn, Closer};
    pub use crate::config::ShutdownConfig;
    pub use crate::context::{attach, lookup, Context};
    pub use crate::errors::{CloseError, CloseErrors, TeardownError};
    pub use crate::logging::{Logger, TracingLogger};
    pub use crate::registry::Registry;
    pub use crate::signals::{Signal, WakeCause};
    pub use crate::strategy::{CloseStrategy, Group, Queue, Stack, StrategyKind};
}
