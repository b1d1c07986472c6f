//! Configuration models for the semaphore and worker pool.

pub mod pool;

pub use pool::{SemaphoreConfig, ToolkitConfig, WorkerPoolConfig, DEFAULT_SHRINK_INTERVAL_SECS};
