//! Интеграционные тесты для heapdb

pub mod common;
pub mod concurrency_tests;
pub mod config_tests;
pub mod scan_tests;
