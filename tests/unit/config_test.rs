//! Tests for configuration validation

use lifecycle_kit::config::{SemaphoreConfig, ToolkitConfig, WorkerPoolConfig, DEFAULT_SHRINK_INTERVAL_SECS};
use std::time::Duration;

#[test]
fn test_pool_config_defaults() {
    let cfg = WorkerPoolConfig::default();
    assert_eq!(cfg.initial, num_cpus::get());
    assert_eq!(cfg.increase_by, 1);
    assert_eq!(cfg.shrink_interval(), Duration::from_secs(DEFAULT_SHRINK_INTERVAL_SECS));
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_pool_config_invalid_initial() {
    let invalid = WorkerPoolConfig::new().with_initial(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_pool_config_invalid_increase_by() {
    let invalid = WorkerPoolConfig::new().with_increase_by(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_pool_config_invalid_shrink_interval() {
    let invalid = WorkerPoolConfig::new().with_shrink_interval(Duration::from_millis(500));
    assert_eq!(invalid.shrink_interval_secs, 0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_semaphore_zero_size_means_one() {
    assert_eq!(SemaphoreConfig { size: 0 }.effective_size(), 1);
    assert_eq!(SemaphoreConfig { size: 4 }.effective_size(), 4);
    assert_eq!(SemaphoreConfig::default().effective_size(), 1);
}

#[test]
fn test_toolkit_config_from_json() {
    let json = r#"{
        "semaphore": { "size": 8 },
        "pool": { "initial": 4, "increase_by": 2, "shrink_interval_secs": 30 }
    }"#;
    let cfg = ToolkitConfig::from_json_str(json).expect("valid config");
    assert_eq!(cfg.semaphore.size, 8);
    assert_eq!(cfg.pool.initial, 4);
    assert_eq!(cfg.pool.increase_by, 2);
    assert_eq!(cfg.pool.shrink_interval(), Duration::from_secs(30));
}

#[test]
fn test_toolkit_config_partial_json_uses_defaults() {
    let cfg = ToolkitConfig::from_json_str(r#"{ "pool": { "initial": 3 } }"#).expect("valid config");
    assert_eq!(cfg.pool.initial, 3);
    assert_eq!(cfg.pool.increase_by, 1);
    assert_eq!(cfg.semaphore, SemaphoreConfig::default());
}

#[test]
fn test_toolkit_config_rejects_invalid_json() {
    let err = ToolkitConfig::from_json_str(r#"{ "pool": { "initial": 0 } }"#).unwrap_err();
    assert!(err.starts_with("pool invalid"), "{err}");
    let err = ToolkitConfig::from_json_str("{ not json").unwrap_err();
    assert!(err.starts_with("parse error"), "{err}");
}

#[test]
fn test_toolkit_config_from_env() {
    std::env::set_var("LIFECYCLE_POOL_INITIAL", "6");
    std::env::set_var("LIFECYCLE_POOL_SHRINK_SECS", "15");
    let cfg = ToolkitConfig::from_env().expect("valid env config");
    assert_eq!(cfg.pool.initial, 6);
    assert_eq!(cfg.pool.shrink_interval_secs, 15);

    std::env::set_var("LIFECYCLE_POOL_INITIAL", "many");
    let err = ToolkitConfig::from_env().unwrap_err();
    assert!(err.contains("LIFECYCLE_POOL_INITIAL"), "{err}");

    std::env::remove_var("LIFECYCLE_POOL_INITIAL");
    std::env::remove_var("LIFECYCLE_POOL_SHRINK_SECS");
}
