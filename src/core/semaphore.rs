//! Counting semaphore backed by a bounded token channel.
//!
//! Each held permit is one token sitting in a channel of capacity `size`:
//! acquiring pushes a token (waiting while the channel is full) and releasing
//! pops one. Closing wakes every waiter with [`Error::Closed`].

use std::future::Future;
use std::sync::Arc;

use flume::{Receiver, Sender};
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::SemaphoreConfig;
use crate::core::error::{Error, Result};

const COMPONENT: &str = "semaphore";

struct Inner {
    size: usize,
    tx: Sender<()>,
    rx: Receiver<()>,
    /// Guards the open/closed transition.
    closed: Mutex<bool>,
    /// Cancelled on close so blocked waiters bail out.
    closing: CancellationToken,
    /// Held for a whole multi-permit acquire so concurrent callers cannot
    /// split the permits between them.
    filling: AsyncMutex<()>,
    /// Same for multi-permit releases.
    draining: AsyncMutex<()>,
}

/// Counting semaphore bounding concurrent access to a resource.
///
/// Cloning yields another handle to the same permits.
#[derive(Clone)]
pub struct Semaphore {
    inner: Arc<Inner>,
}

impl Semaphore {
    /// Create a semaphore with `size` permits; zero is treated as one.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self::from_config(SemaphoreConfig { size })
    }

    /// Create a semaphore from configuration.
    #[must_use]
    pub fn from_config(config: SemaphoreConfig) -> Self {
        let size = config.effective_size();
        let (tx, rx) = flume::bounded(size);
        Self {
            inner: Arc::new(Inner {
                size,
                tx,
                rx,
                closed: Mutex::new(false),
                closing: CancellationToken::new(),
                filling: AsyncMutex::new(()),
                draining: AsyncMutex::new(()),
            }),
        }
    }

    /// Total number of permits.
    #[must_use]
    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// Permits currently held.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.inner.tx.len()
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.inner.closed.lock()
    }

    /// Acquire `n` permits, waiting until they are available.
    ///
    /// Permits are taken one at a time, and only one caller fills at a time,
    /// so concurrent multi-permit acquires are served in turn rather than
    /// each holding part of what they need. A close while waiting aborts the
    /// call and permits already taken by it stay counted against the closed
    /// semaphore.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `n < 1`
    /// - [`Error::Closed`] if the semaphore is or becomes closed
    pub async fn acquire(&self, n: usize) -> Result<()> {
        check_count(n)?;
        self.ensure_open()?;
        let _filling = tokio::select! {
            biased;
            () = self.inner.closing.cancelled() => return Err(Error::Closed(COMPONENT)),
            guard = self.inner.filling.lock() => guard,
        };
        for _ in 0..n {
            self.ensure_open()?;
            tokio::select! {
                biased;
                () = self.inner.closing.cancelled() => return Err(Error::Closed(COMPONENT)),
                sent = self.inner.tx.send_async(()) => {
                    sent.map_err(|_| Error::Closed(COMPONENT))?;
                }
            }
        }
        Ok(())
    }

    /// Release `n` permits, waiting for outstanding ones if fewer are held.
    ///
    /// Like [`acquire`](Self::acquire), one caller drains at a time.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `n < 1`
    /// - [`Error::Closed`] if the semaphore is or becomes closed
    pub async fn release(&self, n: usize) -> Result<()> {
        check_count(n)?;
        self.ensure_open()?;
        let _draining = tokio::select! {
            biased;
            () = self.inner.closing.cancelled() => return Err(Error::Closed(COMPONENT)),
            guard = self.inner.draining.lock() => guard,
        };
        for _ in 0..n {
            self.ensure_open()?;
            tokio::select! {
                biased;
                () = self.inner.closing.cancelled() => return Err(Error::Closed(COMPONENT)),
                recv = self.inner.rx.recv_async() => {
                    recv.map_err(|_| Error::Closed(COMPONENT))?;
                }
            }
        }
        Ok(())
    }

    /// Acquire one permit, then run `fut` on the runtime and release the
    /// permit when it completes.
    ///
    /// # Errors
    ///
    /// Returns the acquire failure without spawning `fut`.
    pub async fn go<F>(&self, fut: F) -> Result<JoinHandle<()>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.acquire(1).await?;
        let sem = self.clone();
        Ok(tokio::spawn(async move {
            fut.await;
            if let Err(e) = sem.release(1).await {
                debug!(error = %e, "permit not returned");
            }
        }))
    }

    /// Close the semaphore; blocked and future callers fail with [`Error::Closed`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if already closed.
    pub fn close(&self) -> Result<()> {
        let mut closed = self.inner.closed.lock();
        if *closed {
            return Err(Error::Closed(COMPONENT));
        }
        *closed = true;
        self.inner.closing.cancel();
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if *self.inner.closed.lock() {
            return Err(Error::Closed(COMPONENT));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Semaphore")
            .field("size", &self.size())
            .field("in_use", &self.in_use())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn check_count(n: usize) -> Result<()> {
    if n < 1 {
        return Err(Error::InvalidArgument(format!("permit count must be at least 1, got {n}")));
    }
    Ok(())
}
