//! Named recurring tasks, each running in its own cancellable loop.
//!
//! A task fires once after `start_in` and then every `every` until it is
//! stopped, its task function returns [`StopTask`], or the scheduler scope is
//! cancelled. The registry only supervises: each loop owns its timer and
//! cancellation token and runs without holding the registry lock.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::core::error::{AppResult, Error, Result};
use crate::runtime::TokioSpawner;

/// Delay used when a task is started with a zero `start_in`.
pub const DEFAULT_START_IN: Duration = Duration::from_secs(1);

/// Returned from a task function to end its recurring loop.
///
/// ```rust,ignore
/// scheduler.start("drain", |_scope, _at| async move {
///     if queue_is_empty().await {
///         return Err(StopTask.into());
///     }
///     Ok(())
/// }, Duration::from_secs(1), Duration::from_secs(10))?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("STOP")]
pub struct StopTask;

/// A recurring task body.
///
/// Implemented for every `Fn(CancellationToken, DateTime<Utc>) -> Future`
/// returning `anyhow::Result<()>`, so closures can be passed directly.
#[async_trait]
pub trait TaskFn: Send + Sync + 'static {
    /// Run one tick. `scope` is the task's own scope; `fired_at` is the tick time.
    ///
    /// Errors other than [`StopTask`] are not inspected by the scheduler.
    async fn tick(&self, scope: CancellationToken, fired_at: DateTime<Utc>) -> AppResult<()>;
}

#[async_trait]
impl<F, Fut> TaskFn for F
where
    F: Fn(CancellationToken, DateTime<Utc>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<()>> + Send + 'static,
{
    async fn tick(&self, scope: CancellationToken, fired_at: DateTime<Utc>) -> AppResult<()> {
        (self)(scope, fired_at).await
    }
}

/// Registry entry for a running task.
struct TaskHandle {
    /// Distinguishes successive registrations of the same id.
    run_id: Uuid,
    cancel: CancellationToken,
}

struct Inner {
    tasks: Mutex<HashMap<String, TaskHandle>>,
    scope: CancellationToken,
    spawner: TokioSpawner,
}

impl Inner {
    /// Remove `id` only if it still belongs to `run_id`.
    fn forget(&self, id: &str, run_id: Uuid) {
        let mut tasks = self.tasks.lock();
        if tasks.get(id).is_some_and(|t| t.run_id == run_id) {
            tasks.remove(id);
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}

/// Scheduler of named recurring tasks.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Create a scheduler whose scope is derived from `parent`.
    ///
    /// Dropping the last handle cancels every task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Runtime`] when called outside a Tokio runtime.
    pub fn new(parent: &CancellationToken) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(Inner {
                tasks: Mutex::new(HashMap::new()),
                scope: parent.child_token(),
                spawner: TokioSpawner::current()?,
            }),
        })
    }

    /// Register and start task `id`.
    ///
    /// The first tick fires after `start_in` (zero falls back to
    /// [`DEFAULT_START_IN`]), later ticks every `every`.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyExists`] if `id` is registered
    /// - [`Error::InvalidArgument`] if `every` is zero
    pub fn start<T>(&self, id: impl Into<String>, task: T, start_in: Duration, every: Duration) -> Result<()>
    where
        T: TaskFn,
    {
        let id = id.into();
        if every.is_zero() {
            return Err(Error::InvalidArgument(format!("task {id:?}: interval must be non-zero")));
        }
        let start_in = if start_in.is_zero() { DEFAULT_START_IN } else { start_in };

        let mut tasks = self.inner.tasks.lock();
        if tasks.contains_key(&id) {
            return Err(Error::AlreadyExists(id));
        }

        let run_id = Uuid::new_v4();
        let cancel = self.inner.scope.child_token();
        tasks.insert(
            id.clone(),
            TaskHandle {
                run_id,
                cancel: cancel.clone(),
            },
        );

        let task_loop = TaskLoop {
            id: id.clone(),
            scope: cancel,
            start_in,
            every,
            task: Box::new(task),
        };
        let registry = Arc::downgrade(&self.inner);
        self.inner.spawner.spawn(async move {
            let id = task_loop.id.clone();
            task_loop.run().await;
            if let Some(inner) = registry.upgrade() {
                inner.forget(&id, run_id);
            }
            debug!(task = %id, "scheduled task finished");
        });

        debug!(task = %id, start_in_ms = start_in.as_millis(), every_ms = every.as_millis(), "scheduled task started");
        Ok(())
    }

    /// Cancel task `id` and remove it from the registry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `id` is not registered.
    pub fn stop(&self, id: &str) -> Result<()> {
        let handle = self
            .inner
            .tasks
            .lock()
            .remove(id)
            .ok_or_else(|| Error::NotFound(id.to_owned()))?;
        handle.cancel.cancel();
        debug!(task = %id, "scheduled task stopped");
        Ok(())
    }

    /// Cancel the scheduler scope and with it every task.
    ///
    /// Does not wait for task loops to exit; they leave the registry as they do.
    pub fn stop_all(&self) {
        self.inner.scope.cancel();
    }

    /// Whether `id` is registered.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.inner.tasks.lock().contains_key(id)
    }

    /// Registered task ids, sorted.
    #[must_use]
    pub fn task_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.tasks.lock().keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of registered tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.tasks.lock().len()
    }

    /// Whether no task is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("tasks", &self.task_ids())
            .field("cancelled", &self.inner.scope.is_cancelled())
            .finish()
    }
}

/// One task's timer loop.
struct TaskLoop {
    id: String,
    scope: CancellationToken,
    start_in: Duration,
    every: Duration,
    task: Box<dyn TaskFn>,
}

impl TaskLoop {
    async fn run(self) {
        let mut ticker = interval_at(Instant::now() + self.start_in, self.start_in);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut steady = false;

        loop {
            tokio::select! {
                biased;
                () = self.scope.cancelled() => return,
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.task.tick(self.scope.clone(), Utc::now()).await {
                if e.is::<StopTask>() {
                    debug!(task = %self.id, "scheduled task requested stop");
                    return;
                }
            }

            if !steady {
                steady = true;
                ticker = interval_at(Instant::now() + self.every, self.every);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            }
        }
    }
}
