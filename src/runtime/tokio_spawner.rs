//! Tokio runtime handle used by the pool and scheduler to spawn work.

use std::future::Future;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::core::error::{Error, Result};

/// Tokio-based spawner that executes futures on a captured runtime handle.
///
/// Components capture the handle at construction so that their synchronous
/// methods (`Scheduler::start`, pool growth) can spawn without being polled
/// from inside the runtime.
#[derive(Clone, Debug)]
pub struct TokioSpawner {
    handle: Handle,
}

impl TokioSpawner {
    /// Create a spawner from an explicit runtime handle.
    #[must_use]
    pub const fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Capture the handle of the runtime the caller is running in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Runtime`] when called outside a Tokio runtime.
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| Error::Runtime(e.to_string()))
    }

    /// Spawn a future onto the runtime.
    pub fn spawn<F>(&self, fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(fut)
    }
}
