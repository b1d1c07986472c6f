//! Tests for error types

use lifecycle_kit::core::{merge_errors, Error, ErrorList, StopTask};

#[test]
fn test_closed_error() {
    let err = Error::Closed("worker pool");
    assert_eq!(format!("{}", err), "worker pool is closed");
}

#[test]
fn test_registry_errors() {
    assert_eq!(Error::AlreadyExists("sweep".into()).to_string(), r#"task "sweep" already exists"#);
    assert_eq!(Error::NotFound("sweep".into()).to_string(), r#"task "sweep" does not exist"#);
}

#[test]
fn test_pool_full_error() {
    let err = Error::PoolFull { workers: 8, queued: 4 };
    assert_eq!(err.to_string(), "the pool is full (workers: 8, queued: 4)");
}

#[test]
fn test_io_error_is_transparent() {
    let io = std::io::Error::new(std::io::ErrorKind::Other, "no handler");
    let err: Error = io.into();
    assert_eq!(err.to_string(), "no handler");
}

#[test]
fn test_error_list_aggregate() {
    let mut list = ErrorList::new();
    assert!(list.clone().into_result().is_ok());

    list.push("error closing db: timeout");
    list.extend([None, Some("error closing cache: refused")]);
    assert_eq!(list.len(), 2);

    let err = list.into_result().unwrap_err();
    assert_eq!(err.to_string(), "error closing db: timeout | error closing cache: refused");
}

#[test]
fn test_merge_errors() {
    assert_eq!(merge_errors::<_, &str>("; ", [None, None]), None);
    assert_eq!(merge_errors("; ", [Some("a"), None, Some("b")]).as_deref(), Some("a; b"));
}

#[test]
fn test_stop_task_is_recognisable() {
    let err = anyhow::Error::new(StopTask);
    assert!(err.is::<StopTask>());
    assert_eq!(err.to_string(), "STOP");
}
