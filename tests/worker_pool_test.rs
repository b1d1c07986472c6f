//! Integration tests for WorkerPool
//!
//! These tests validate:
//! - Job execution with the pool scope
//! - Growth under a full queue before any rejection
//! - Close semantics and cancellation of running jobs
//! - Shrinking back to the initial size once idle

use lifecycle_kit::config::WorkerPoolConfig;
use lifecycle_kit::core::{Error, PoolState, WorkerPool};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Wait until `counter` reaches `target` or the timeout expires.
async fn wait_for(counter: &AtomicUsize, target: usize, timeout: Duration) -> bool {
    tokio::time::timeout(timeout, async {
        while counter.load(Ordering::SeqCst) < target {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .is_ok()
}

/// Submit `n` jobs that block until `gate` is cancelled; returns accepted count.
async fn submit_gated(
    pool: &WorkerPool,
    n: usize,
    gate: &CancellationToken,
    done: &Arc<AtomicUsize>,
) -> (usize, Vec<Error>) {
    let mut accepted = 0;
    let mut rejected = Vec::new();
    for _ in 0..n {
        let gate = gate.clone();
        let done = Arc::clone(done);
        let res = pool
            .exec(move |_scope| async move {
                gate.cancelled().await;
                done.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        match res {
            Ok(()) => accepted += 1,
            Err(e) => rejected.push(e),
        }
    }
    (accepted, rejected)
}

// ============================================================================
// TESTS
// ============================================================================

/// Jobs run and receive the pool scope
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_exec_runs_jobs() {
    let root = CancellationToken::new();
    let pool = WorkerPool::with_sizes(&root, 4, 2).expect("Failed to create pool");
    let done = Arc::new(AtomicUsize::new(0));

    for _ in 0..4 {
        let done = Arc::clone(&done);
        pool.exec(move |scope| async move {
            assert!(!scope.is_cancelled());
            done.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .expect("Failed to submit");
    }

    assert!(wait_for(&done, 4, Duration::from_secs(5)).await);
    assert_eq!(pool.state(), PoolState::Steady);
    pool.close().unwrap();
}

/// A full queue grows the pool before any job is rejected
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_full_queue_grows_pool() {
    let root = CancellationToken::new();
    let pool = WorkerPool::with_sizes(&root, 2, 2).expect("Failed to create pool");
    let initial = pool.workers();
    let gate = CancellationToken::new();
    let done = Arc::new(AtomicUsize::new(0));

    let (accepted, rejected) = submit_gated(&pool, 20, &gate, &done).await;

    // At most `initial` running plus `initial` queued without growth.
    assert!(accepted > 4, "accepted only {accepted} jobs");
    assert!(pool.workers() > initial, "pool did not grow");
    for err in &rejected {
        assert!(matches!(err, Error::PoolFull { workers, .. } if *workers > initial));
    }

    gate.cancel();
    assert!(wait_for(&done, accepted, Duration::from_secs(5)).await);
    pool.close().unwrap();
}

/// Close cancels the scope seen by running jobs and rejects new work
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_close_semantics() {
    let root = CancellationToken::new();
    let pool = WorkerPool::with_sizes(&root, 2, 1).expect("Failed to create pool");
    let observed = Arc::new(AtomicUsize::new(0));
    let started = Arc::new(AtomicUsize::new(0));

    {
        let observed = Arc::clone(&observed);
        let started = Arc::clone(&started);
        pool.exec(move |scope| async move {
            started.fetch_add(1, Ordering::SeqCst);
            scope.cancelled().await;
            observed.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();
    }
    assert!(wait_for(&started, 1, Duration::from_secs(5)).await);

    pool.close().unwrap();
    assert_eq!(pool.state(), PoolState::Closed);
    assert!(wait_for(&observed, 1, Duration::from_secs(5)).await);

    assert!(matches!(pool.exec(|_| async {}).await, Err(Error::Closed(_))));
    assert!(matches!(pool.close(), Err(Error::Closed(_))));
}

/// Idle workers are retired down to the initial size, never below
#[tokio::test(start_paused = true)]
async fn test_idle_pool_shrinks_to_floor() {
    let root = CancellationToken::new();
    let config = WorkerPoolConfig::new()
        .with_initial(1)
        .with_increase_by(2)
        .with_shrink_interval(Duration::from_secs(1));
    let pool = WorkerPool::new(&root, config).expect("Failed to create pool");
    let gate = CancellationToken::new();
    let done = Arc::new(AtomicUsize::new(0));

    let (accepted, _) = submit_gated(&pool, 6, &gate, &done).await;
    let grown = pool.workers();
    assert!(grown > 1);

    gate.cancel();
    assert!(wait_for(&done, accepted, Duration::from_secs(5)).await);

    tokio::time::sleep(Duration::from_secs(30)).await;
    let stats = pool.stats();
    assert_eq!(stats.workers, 1);
    assert_eq!(stats.capacity, 1);
    assert_eq!(stats.state, PoolState::Steady);

    // Still serviceable after shrinking.
    let after = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&after);
    pool.exec(move |_| async move {
        counter.fetch_add(1, Ordering::SeqCst);
    })
    .await
    .unwrap();
    assert!(wait_for(&after, 1, Duration::from_secs(1)).await);
}

/// Cancelling the parent scope stops the pool without calling close
#[tokio::test]
async fn test_parent_scope_cascades() {
    let root = CancellationToken::new();
    let pool = WorkerPool::with_sizes(&root, 2, 1).expect("Failed to create pool");
    root.cancel();
    assert!(pool.scope().is_cancelled());
    assert!(matches!(pool.exec(|_| async {}).await, Err(Error::Closed(_))));
}

/// A panicking job is contained; the worker keeps serving queued jobs
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panicking_job_keeps_worker_alive() {
    let root = CancellationToken::new();
    let pool = WorkerPool::with_sizes(&root, 1, 1).expect("Failed to create pool");
    let ran = Arc::new(AtomicUsize::new(0));

    pool.exec(|_scope| async { panic!("job failed") }).await.unwrap();
    pool.exec(|_scope| -> std::future::Ready<()> { panic!("job failed before its future") })
        .await
        .unwrap();
    for _ in 0..3 {
        let ran = Arc::clone(&ran);
        pool.exec(move |_scope| async move {
            ran.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();
    }

    assert!(wait_for(&ran, 3, Duration::from_secs(5)).await, "queued jobs never ran");
    let stats = pool.stats();
    assert!(stats.workers >= 1);
    assert_eq!(stats.queued, 0);
    assert_eq!(stats.state, PoolState::Steady);
    pool.close().unwrap();
}
