//! Tests for tokio spawner utilities

use lifecycle_kit::core::Error;
use lifecycle_kit::runtime::TokioSpawner;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(async move {
        tx.send(123).unwrap();
    });

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

#[tokio::test]
async fn test_current_inside_runtime() {
    let spawner = TokioSpawner::current().expect("inside a runtime");
    let out = spawner.spawn(async { 7 }).await.unwrap();
    assert_eq!(out, 7);
}

#[test]
fn test_current_outside_runtime() {
    assert!(matches!(TokioSpawner::current(), Err(Error::Runtime(_))));
}

#[cfg(unix)]
#[test]
fn test_default_shutdown_signals() {
    use tokio::signal::unix::SignalKind;

    let signals = lifecycle_kit::runtime::signals::default_shutdown_signals();
    assert!(signals.contains(&SignalKind::interrupt()));
    assert!(signals.contains(&SignalKind::terminate()));
}
