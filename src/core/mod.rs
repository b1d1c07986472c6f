//! Core concurrency components: semaphore, worker pool, scheduler and closer.

pub mod closer;
pub mod error;
pub mod retry;
pub mod scheduler;
pub mod semaphore;
pub mod worker_pool;

pub use closer::{Closer, OnClose};
pub use error::{merge_errors, AppResult, Error, ErrorList, Result};
pub use retry::{retry, RetryPolicy};
pub use scheduler::{Scheduler, StopTask, TaskFn};
pub use semaphore::Semaphore;
pub use worker_pool::{shrink_decision, PoolState, PoolStats, ShrinkDecision, WorkerPool};
