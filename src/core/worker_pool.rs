//! Dynamically sized worker pool draining a bounded job queue.
//!
//! The pool starts `initial` workers reading from a queue of capacity
//! `initial`. When a submission finds the queue full the pool grows by
//! `increase_by` workers and retries; a maintenance task periodically retires
//! idle workers again, never going below `initial`.
//!
//! # Example
//!
//! ```rust,ignore
//! use lifecycle_kit::config::WorkerPoolConfig;
//! use lifecycle_kit::core::WorkerPool;
//! use tokio_util::sync::CancellationToken;
//!
//! let root = CancellationToken::new();
//! let pool = WorkerPool::new(&root, WorkerPoolConfig::new().with_initial(4))?;
//! pool.exec(|scope| async move {
//!     if !scope.is_cancelled() {
//!         compress_archive().await;
//!     }
//! })
//! .await?;
//! pool.close()?;
//! ```

mod worker;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use flume::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::WorkerPoolConfig;
use crate::core::error::{Error, Result};
use crate::runtime::TokioSpawner;

/// Submission attempts before a job is rejected with [`Error::PoolFull`].
pub const ADMISSION_ATTEMPTS: usize = 3;

const COMPONENT: &str = "worker pool";

type JobFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// A queued unit of work. The pool scope is handed to it when it runs.
pub(crate) type Job = Box<dyn FnOnce(CancellationToken) -> JobFuture + Send>;

/// Queue slot: `None` is the shrink sentinel that retires one worker.
pub(crate) type Slot = Option<Job>;

/// Lifecycle state of a [`WorkerPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PoolState {
    /// Workers are being added.
    Spawning = 0,
    /// Idle or processing, no resize in progress.
    Steady = 1,
    /// Retirement sentinels are being queued.
    Shrinking = 2,
    /// Terminal; no further jobs are accepted.
    Closed = 3,
}

impl PoolState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Spawning,
            1 => Self::Steady,
            2 => Self::Shrinking,
            _ => Self::Closed,
        }
    }
}

/// Outcome of a periodic shrink check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShrinkDecision {
    /// Jobs are waiting; keep every worker.
    Busy,
    /// Already at or below the floor.
    AtFloor,
    /// Retire this many workers.
    Shrink(usize),
}

/// Decide whether an idle pool should retire workers.
///
/// `floor` is the initial capacity; the pool never drops below it.
#[must_use]
pub const fn shrink_decision(queued: usize, total: usize, floor: usize, step: usize) -> ShrinkDecision {
    if queued > 0 {
        return ShrinkDecision::Busy;
    }
    if total <= floor {
        return ShrinkDecision::AtFloor;
    }
    let excess = total - floor;
    ShrinkDecision::Shrink(if step < excess { step } else { excess })
}

/// Snapshot of pool utilisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Live workers as tracked by the pool.
    pub workers: usize,
    /// Jobs waiting in the queue.
    pub queued: usize,
    /// Queue capacity, equal to the initial worker count.
    pub capacity: usize,
    /// Current lifecycle state.
    pub state: PoolState,
}

struct Inner {
    config: WorkerPoolConfig,
    /// Dropped on close so the queue disconnects.
    tx: Mutex<Option<Sender<Slot>>>,
    rx: Receiver<Slot>,
    scope: CancellationToken,
    total: AtomicUsize,
    state: AtomicU8,
    next_worker_id: AtomicU64,
    spawner: TokioSpawner,
}

impl Inner {
    /// Move from `from` to `to`; fails if another transition got there first.
    ///
    /// `Closed` is only ever stored directly by `close`, so a closed pool
    /// never leaves that state.
    fn transition(&self, from: PoolState, to: PoolState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn state(&self) -> PoolState {
        if self.scope.is_cancelled() {
            return PoolState::Closed;
        }
        PoolState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Add `n` workers. A shrink in progress keeps reporting `Shrinking`.
    fn spawn(&self, n: usize) {
        self.transition(PoolState::Steady, PoolState::Spawning);
        for _ in 0..n {
            let worker_id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
            self.spawner.spawn(worker::run(
                worker_id,
                self.rx.clone(),
                self.scope.clone(),
            ));
        }
        let total = self.total.fetch_add(n, Ordering::AcqRel) + n;
        self.transition(PoolState::Spawning, PoolState::Steady);
        debug!(added = n, total = total, "worker pool grew");
    }

    /// Queue retirement sentinels when the pool is idle and above its floor.
    ///
    /// Returns `false` once the pool is closed and maintenance should stop.
    async fn shrink(&self) -> bool {
        let queued = self.rx.len();
        let total = self.total.load(Ordering::Acquire);
        let n = match shrink_decision(queued, total, self.config.initial, self.config.increase_by) {
            ShrinkDecision::Busy | ShrinkDecision::AtFloor => return true,
            ShrinkDecision::Shrink(n) => n,
        };

        let tx = self.tx.lock().clone();
        let Some(tx) = tx else {
            return false;
        };
        // Growth is synchronous, so waiting for it to finish is brief.
        while !self.transition(PoolState::Steady, PoolState::Shrinking) {
            if self.state() == PoolState::Closed {
                return false;
            }
            tokio::task::yield_now().await;
        }
        for _ in 0..n {
            tokio::select! {
                biased;
                () = self.scope.cancelled() => return false,
                sent = tx.send_async(None) => {
                    if sent.is_err() {
                        return false;
                    }
                }
            }
        }
        let total = self.total.fetch_sub(n, Ordering::AcqRel).saturating_sub(n);
        self.transition(PoolState::Shrinking, PoolState::Steady);
        info!(retired = n, total = total, "worker pool shrank");
        true
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        // Last handle gone: stop workers and maintenance even without close().
        self.scope.cancel();
    }
}

/// Worker pool with a bounded queue and dynamically grown workers.
///
/// Cloning yields another handle to the same pool.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<Inner>,
}

impl WorkerPool {
    /// Create a pool whose scope is derived from `parent`.
    ///
    /// Spawns `config.initial` workers and the shrink maintenance task on the
    /// current Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if the configuration is invalid
    /// - [`Error::Runtime`] if called outside a Tokio runtime
    pub fn new(parent: &CancellationToken, config: WorkerPoolConfig) -> Result<Self> {
        config.validate().map_err(Error::InvalidArgument)?;
        let spawner = TokioSpawner::current()?;
        let (tx, rx) = flume::bounded(config.initial);

        let inner = Arc::new(Inner {
            tx: Mutex::new(Some(tx)),
            rx,
            scope: parent.child_token(),
            total: AtomicUsize::new(0),
            state: AtomicU8::new(PoolState::Spawning as u8),
            next_worker_id: AtomicU64::new(0),
            spawner,
            config,
        });

        inner.spawn(inner.config.initial);
        inner.spawner.spawn(worker::maintain(
            Arc::downgrade(&inner),
            inner.scope.clone(),
            inner.config.shrink_interval(),
        ));

        info!(
            initial = inner.config.initial,
            increase_by = inner.config.increase_by,
            shrink_interval_secs = inner.config.shrink_interval_secs,
            "worker pool started"
        );
        Ok(Self { inner })
    }

    /// Create a pool with the default shrink interval.
    ///
    /// # Errors
    ///
    /// See [`WorkerPool::new`].
    pub fn with_sizes(parent: &CancellationToken, initial: usize, increase_by: usize) -> Result<Self> {
        Self::new(
            parent,
            WorkerPoolConfig::new()
                .with_initial(initial)
                .with_increase_by(increase_by),
        )
    }

    /// Submit a job; it receives the pool scope when a worker runs it.
    ///
    /// On a full queue the pool grows by `increase_by` workers and yields
    /// before retrying, up to [`ADMISSION_ATTEMPTS`] times.
    ///
    /// # Errors
    ///
    /// - [`Error::Closed`] if the pool is closed
    /// - [`Error::PoolFull`] if the job could not be queued after growing
    pub async fn exec<F, Fut>(&self, job: F) -> Result<()>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.inner.scope.is_cancelled() {
            return Err(Error::Closed(COMPONENT));
        }
        let tx = self
            .inner
            .tx
            .lock()
            .clone()
            .ok_or(Error::Closed(COMPONENT))?;

        let job: Job = Box::new(move |scope| -> JobFuture { Box::pin(job(scope)) });
        let mut pending = Some(job);
        for _ in 0..ADMISSION_ATTEMPTS {
            let Some(job) = pending.take() else {
                break;
            };
            if self.inner.scope.is_cancelled() {
                return Err(Error::Closed(COMPONENT));
            }
            match tx.try_send(Some(job)) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Disconnected(_)) => return Err(Error::Closed(COMPONENT)),
                Err(TrySendError::Full(returned)) => {
                    pending = returned;
                    self.inner.spawn(self.inner.config.increase_by);
                    tokio::task::yield_now().await;
                }
            }
        }

        let workers = self.inner.total.load(Ordering::Acquire);
        let queued = tx.len();
        warn!(workers = workers, queued = queued, "worker pool overrun, rejecting job");
        Err(Error::PoolFull { workers, queued })
    }

    /// Cancel the pool scope and close the queue.
    ///
    /// Running jobs observe cancellation through their scope; queued jobs are
    /// dropped once every worker has exited.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the pool was already closed. A cancelled
    /// parent scope stops the workers but still permits one close.
    pub fn close(&self) -> Result<()> {
        let mut tx = self.inner.tx.lock();
        if tx.is_none() {
            return Err(Error::Closed(COMPONENT));
        }
        self.inner.scope.cancel();
        *tx = None;
        self.inner
            .state
            .store(PoolState::Closed as u8, Ordering::Release);
        info!(
            workers = self.inner.total.load(Ordering::Acquire),
            "worker pool closed"
        );
        Ok(())
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PoolState {
        self.inner.state()
    }

    /// Live worker count.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.inner.total.load(Ordering::Acquire)
    }

    /// Current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            workers: self.workers(),
            queued: self.inner.rx.len(),
            capacity: self.inner.config.initial,
            state: self.state(),
        }
    }

    /// The pool scope; cancelled when the pool closes.
    #[must_use]
    pub fn scope(&self) -> CancellationToken {
        self.inner.scope.clone()
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool").field("stats", &self.stats()).finish()
    }
}
