//! Shutdown coordinator draining named cleanup actions.
//!
//! Cleanups are registered in two buckets. On [`Closer::close`] the
//! synchronous bucket runs first, in registration order, on the caller's
//! task; the concurrent bucket then runs in parallel and is awaited. Every
//! entry is timed and reported to the `on_close` observer, and failures are
//! merged into one [`Error::Aggregate`].
//!
//! ```rust,ignore
//! let closer = Closer::new(|name, took| tracing::info!(name, ?took, "closed"));
//! let pool = WorkerPool::with_sizes(&closer.token(), 8, 4)?;
//! let sched = Scheduler::new(&closer.token())?;
//!
//! closer.add("scheduler", move || { sched.stop_all(); Ok(()) }, true)?;
//! closer.add("pool", move || Ok(pool.close()?), true)?;
//!
//! closer.wait_shutdown_signal().await?;
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::error::{AppResult, Error, ErrorList, Result};

const COMPONENT: &str = "closer";

type CleanupFuture = Pin<Box<dyn Future<Output = AppResult<()>> + Send>>;

/// Observer invoked after each cleanup with its name and run time.
pub type OnClose = Arc<dyn Fn(&str, Duration) + Send + Sync>;

enum Cleanup {
    Blocking(Box<dyn FnOnce() -> AppResult<()> + Send>),
    Future(CleanupFuture),
}

struct Entry {
    name: String,
    cleanup: Cleanup,
}

#[derive(Default)]
struct Registry {
    sync: Vec<Entry>,
    concurrent: Vec<Entry>,
    closed: bool,
}

struct Inner {
    registry: Mutex<Registry>,
    scope: CancellationToken,
    on_close: OnClose,
}

/// Shutdown coordinator.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct Closer {
    inner: Arc<Inner>,
}

impl Default for Closer {
    fn default() -> Self {
        Self::new(|_: &str, _: Duration| {})
    }
}

impl Closer {
    /// Create a closer reporting each finished cleanup to `on_close`.
    pub fn new<F>(on_close: F) -> Self
    where
        F: Fn(&str, Duration) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                registry: Mutex::new(Registry::default()),
                scope: CancellationToken::new(),
                on_close: Arc::new(on_close),
            }),
        }
    }

    /// The closer scope, cancelled as soon as closing starts.
    ///
    /// Use it (or a child of it) as the parent scope of pools and schedulers.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.inner.scope.clone()
    }

    /// Register a blocking cleanup.
    ///
    /// `sync` entries run in registration order on the closing task; the rest
    /// run concurrently on the blocking thread pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] once closing has started.
    pub fn add<F>(&self, name: impl Into<String>, cleanup: F, sync: bool) -> Result<()>
    where
        F: FnOnce() -> AppResult<()> + Send + 'static,
    {
        self.register(name.into(), Cleanup::Blocking(Box::new(cleanup)), sync)
    }

    /// Register an async cleanup; `sync` entries are awaited in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] once closing has started.
    pub fn add_async<Fut>(&self, name: impl Into<String>, cleanup: Fut, sync: bool) -> Result<()>
    where
        Fut: Future<Output = AppResult<()>> + Send + 'static,
    {
        self.register(name.into(), Cleanup::Future(Box::pin(cleanup)), sync)
    }

    fn register(&self, name: String, cleanup: Cleanup, sync: bool) -> Result<()> {
        let mut registry = self.inner.registry.lock();
        if registry.closed {
            return Err(Error::Closed(COMPONENT));
        }
        let entry = Entry { name, cleanup };
        if sync {
            registry.sync.push(entry);
        } else {
            registry.concurrent.push(entry);
        }
        Ok(())
    }

    /// Remove every cleanup registered under `name`, in both buckets.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] once closing has started.
    pub fn delete(&self, name: &str) -> Result<()> {
        let mut registry = self.inner.registry.lock();
        if registry.closed {
            return Err(Error::Closed(COMPONENT));
        }
        registry.sync.retain(|e| e.name != name);
        registry.concurrent.retain(|e| e.name != name);
        Ok(())
    }

    /// Number of registered cleanups.
    #[must_use]
    pub fn len(&self) -> usize {
        let registry = self.inner.registry.lock();
        registry.sync.len() + registry.concurrent.len()
    }

    /// Whether no cleanup is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether closing has started.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.registry.lock().closed
    }

    /// Run every registered cleanup once.
    ///
    /// # Errors
    ///
    /// - [`Error::Closed`] if called more than once
    /// - [`Error::Aggregate`] listing `error closing <name>: <cause>` for each
    ///   failed cleanup
    pub async fn close(&self) -> Result<()> {
        let (sync, concurrent) = {
            let mut registry = self.inner.registry.lock();
            if registry.closed {
                return Err(Error::Closed(COMPONENT));
            }
            registry.closed = true;
            (
                std::mem::take(&mut registry.sync),
                std::mem::take(&mut registry.concurrent),
            )
        };
        self.inner.scope.cancel();
        debug!(sync = sync.len(), concurrent = concurrent.len(), "closing");

        let mut errors = ErrorList::new();
        for entry in sync {
            let start = Instant::now();
            let res = match entry.cleanup {
                Cleanup::Blocking(f) => f(),
                Cleanup::Future(fut) => fut.await,
            };
            self.finish(&entry.name, start.elapsed(), res, &mut errors);
        }

        let mut set = JoinSet::new();
        for entry in concurrent {
            set.spawn(async move {
                let start = Instant::now();
                let res = match entry.cleanup {
                    Cleanup::Blocking(f) => tokio::task::spawn_blocking(f)
                        .await
                        .unwrap_or_else(|e| Err(anyhow::anyhow!("cleanup panicked: {e}"))),
                    Cleanup::Future(fut) => tokio::spawn(fut)
                        .await
                        .unwrap_or_else(|e| Err(anyhow::anyhow!("cleanup panicked: {e}"))),
                };
                (entry.name, start.elapsed(), res)
            });
        }
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((name, took, res)) => self.finish(&name, took, res, &mut errors),
                Err(e) => errors.push(format!("error closing: {e}")),
            }
        }

        errors.into_result()
    }

    fn finish(&self, name: &str, took: Duration, res: AppResult<()>, errors: &mut ErrorList) {
        if let Err(e) = res {
            warn!(name = name, error = %e, "cleanup failed");
            errors.push(format!("error closing {name}: {e}"));
        }
        debug!(name = name, took_ms = took.as_millis(), "cleanup finished");
        (self.inner.on_close)(name, took);
    }

    /// Wait until `scope` or the closer's own scope is cancelled, then close.
    ///
    /// # Errors
    ///
    /// Returns the result of [`Closer::close`].
    pub async fn wait(&self, scope: &CancellationToken) -> Result<()> {
        tokio::select! {
            () = scope.cancelled() => {}
            () = self.inner.scope.cancelled() => {}
        }
        self.close().await
    }

    /// Wait for one of `signals` (or closing started elsewhere), then close.
    ///
    /// An empty `signals` slice listens for
    /// [`default_shutdown_signals`](crate::runtime::signals::default_shutdown_signals).
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if a signal handler cannot be installed
    /// - otherwise the result of [`Closer::close`]
    #[cfg(unix)]
    pub async fn wait_signal(&self, signals: &[tokio::signal::unix::SignalKind]) -> Result<()> {
        use tokio::signal::unix::signal;

        let defaults;
        let signals = if signals.is_empty() {
            defaults = crate::runtime::signals::default_shutdown_signals();
            defaults.as_slice()
        } else {
            signals
        };

        let received = self.inner.scope.child_token();
        for kind in signals {
            let mut stream = signal(*kind)?;
            let received = received.clone();
            tokio::spawn(async move {
                tokio::select! {
                    () = received.cancelled() => {}
                    _ = stream.recv() => received.cancel(),
                }
            });
        }
        let res = self.wait(&received).await;
        received.cancel();
        res
    }

    /// Wait for the default shutdown signals (see
    /// [`wait_for_shutdown_signal`](crate::runtime::wait_for_shutdown_signal)), then close.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if a signal handler cannot be installed
    /// - otherwise the result of [`Closer::close`]
    pub async fn wait_shutdown_signal(&self) -> Result<()> {
        let signal = crate::runtime::wait_for_shutdown_signal();
        tokio::select! {
            res = signal => res?,
            () = self.inner.scope.cancelled() => {}
        }
        self.close().await
    }
}

impl std::fmt::Debug for Closer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Closer")
            .field("entries", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
