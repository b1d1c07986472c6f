//! Worker loop and shrink maintenance task.

use std::panic::AssertUnwindSafe;
use std::sync::Weak;
use std::time::Duration;

use flume::Receiver;
use futures::FutureExt;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{Inner, Slot};

/// Run jobs from the queue until a retirement sentinel, a closed queue or
/// scope cancellation.
pub(super) async fn run(worker_id: u64, rx: Receiver<Slot>, scope: CancellationToken) {
    debug!(worker_id = worker_id, "worker started");
    loop {
        let slot = tokio::select! {
            biased;
            () = scope.cancelled() => break,
            slot = rx.recv_async() => slot,
        };

        match slot {
            Ok(Some(job)) => {
                // Panics stay inside the job; the worker keeps draining the queue.
                let run = async { job(scope.clone()).await };
                if let Err(panic) = AssertUnwindSafe(run).catch_unwind().await {
                    warn!(
                        worker_id = worker_id,
                        panic = panic_message(panic.as_ref()),
                        "job panicked"
                    );
                }
            }
            Ok(None) => {
                debug!(worker_id = worker_id, "worker retired");
                break;
            }
            Err(_) => break,
        }
    }
    debug!(worker_id = worker_id, "worker exiting");
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Periodically retire idle workers above the pool floor.
///
/// Holds only a weak reference so an abandoned pool can be dropped.
pub(super) async fn maintain(pool: Weak<Inner>, scope: CancellationToken, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            () = scope.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let Some(pool) = pool.upgrade() else {
            return;
        };
        if !pool.shrink().await {
            return;
        }
    }
}
