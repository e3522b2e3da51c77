//! Загрузка конфигурации и построение компонентов по ней

use heapdb::catalog::Catalog;
use heapdb::common::{DatabaseConfig, DeadlockPolicy};
use heapdb::core::BufferPool;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_config_file_drives_components() {
    let temp_dir = TempDir::new().expect("temp dir");
    let path = temp_dir.path().join("heapdb.toml");
    std::fs::write(
        &path,
        r#"
[storage]
buffer_pool_pages = 8

[lock]
timeout_ms = 250
deadlock_policy = "wait_for_graph"
"#,
    )
    .expect("write config");

    let config = DatabaseConfig::from_file(&path).expect("config loads");
    assert_eq!(config.storage.page_size, 4096);
    assert_eq!(config.logging, DatabaseConfig::default().logging);

    let buffer_pool = BufferPool::new(&config, Arc::new(Catalog::new()));
    assert_eq!(buffer_pool.capacity(), 8);
    let lock_manager = buffer_pool.lock_manager();
    assert_eq!(lock_manager.default_timeout(), Duration::from_millis(250));
    assert_eq!(lock_manager.deadlock_policy(), DeadlockPolicy::WaitForGraph);
}

#[test]
fn test_config_round_trips_through_file() {
    let temp_dir = TempDir::new().expect("temp dir");
    let path = temp_dir.path().join("saved.toml");

    let mut config = DatabaseConfig::default();
    config.lock.timeout_ms = 42;
    config.logging.level = "debug".to_string();
    config.to_file(&path).expect("config saves");

    assert_eq!(DatabaseConfig::from_file(&path).expect("config loads"), config);
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let temp_dir = TempDir::new().expect("temp dir");
    let path = temp_dir.path().join("bad.toml");
    std::fs::write(&path, "[storage]\npage_size = 1000\n").expect("write config");

    assert!(DatabaseConfig::from_file(&path).is_err());
}
