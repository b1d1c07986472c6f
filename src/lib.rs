//! # Lifecycle Kit
//!
//! An in-process concurrency and lifecycle toolkit for Tokio services.
//!
//! Four components cover the coordination a long-running process needs:
//!
//! - **Semaphore**: bounds concurrent access to a resource with `size` permits
//! - **WorkerPool**: a bounded job queue drained by workers that grow on
//!   pressure and shrink back to the initial size when idle
//! - **Scheduler**: named recurring tasks ("first after X, then every Y"),
//!   each in its own cancellable loop
//! - **Closer**: named cleanup actions run once at shutdown, sync ones in
//!   order, the rest concurrently, with failures merged into one error
//!
//! Every component takes or derives a [`CancellationToken`] scope. Cancelling
//! a parent stops workers and task loops; cleanup only runs through
//! [`Closer::close`](core::Closer::close) or one of its `wait` variants.
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use lifecycle_kit::core::{Closer, Scheduler, WorkerPool};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     lifecycle_kit::util::init_tracing();
//!
//!     let closer = Closer::new(|name, took| tracing::info!(name, ?took, "closed"));
//!     let pool = WorkerPool::with_sizes(&closer.token(), 8, 4)?;
//!     let sched = Scheduler::new(&closer.token())?;
//!
//!     let jobs = pool.clone();
//!     sched.start("sweep", move |_scope, _at| {
//!         let jobs = jobs.clone();
//!         async move {
//!             jobs.exec(|_scope| async { /* sweep */ }).await?;
//!             Ok(())
//!         }
//!     }, Duration::from_secs(5), Duration::from_secs(60))?;
//!
//!     closer.add("scheduler", move || { sched.stop_all(); Ok(()) }, true)?;
//!     closer.add("pool", move || Ok(pool.close()?), true)?;
//!
//!     closer.wait_shutdown_signal().await?;
//!     Ok(())
//! }
//! ```
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core concurrency components and the shared error type.
pub mod core;
/// Configuration models for the semaphore and worker pool.
pub mod config;
/// Runtime adapters: spawner handle and OS signals.
pub mod runtime;
/// Shared utilities: tracing setup and wall-clock helpers.
pub mod util;

pub use crate::core::{Closer, Error, Result, Scheduler, Semaphore, StopTask, WorkerPool};
