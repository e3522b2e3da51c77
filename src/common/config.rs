//! Конфигурация для heapdb
//!
//! Предоставляет структуры конфигурации хранилища, менеджера блокировок и логирования

use crate::common::constants::{
    DEFAULT_BUFFER_POOL_PAGES, DEFAULT_LOCK_TIMEOUT_MS, DEFAULT_PAGE_SIZE, MAX_LOCK_TIMEOUT_MS,
    SUPPORTED_PAGE_SIZES,
};
use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Основная конфигурация базы данных
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub storage: StorageConfig,
    pub lock: LockConfig,
    pub logging: LoggingConfig,
}

/// Конфигурация хранения
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Размер страницы в байтах
    pub page_size: usize,
    /// Размер пула буферов (в страницах)
    pub buffer_pool_pages: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            buffer_pool_pages: DEFAULT_BUFFER_POOL_PAGES,
        }
    }
}

/// Стратегия борьбы с дедлоками
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadlockPolicy {
    /// Только ограничение времени ожидания
    Timeout,
    /// Таймаут плюс поиск циклов в графе ожидания при каждом ожидании
    WaitForGraph,
}

impl FromStr for DeadlockPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "timeout" => Ok(DeadlockPolicy::Timeout),
            "wait_for_graph" | "wait-for-graph" | "graph" => Ok(DeadlockPolicy::WaitForGraph),
            other => Err(Error::configuration(format!(
                "Unknown deadlock policy: {}",
                other
            ))),
        }
    }
}

/// Конфигурация менеджера блокировок
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Таймаут ожидания блокировки (в миллисекундах)
    pub timeout_ms: u64,
    /// Стратегия обработки дедлоков
    pub deadlock_policy: DeadlockPolicy,
}

impl LockConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            deadlock_policy: DeadlockPolicy::Timeout,
        }
    }
}

/// Конфигурация логирования
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Уровень логирования
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl DatabaseConfig {
    /// Загружает конфигурацию из TOML файла
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: DatabaseConfig = toml::from_str(&content).map_err(|e| {
            Error::configuration(format!("Invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Сохраняет конфигурацию в TOML файл
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Сериализует конфигурацию в TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::configuration(format!("Failed to serialize config: {}", e)))
    }

    /// Накладывает переменные окружения поверх текущих значений
    pub fn apply_env(mut self) -> Result<Self> {
        if let Ok(page_size) = std::env::var("HEAPDB_PAGE_SIZE") {
            self.storage.page_size = parse_env("HEAPDB_PAGE_SIZE", &page_size)?;
        }

        if let Ok(pages) = std::env::var("HEAPDB_BUFFER_POOL_PAGES") {
            self.storage.buffer_pool_pages = parse_env("HEAPDB_BUFFER_POOL_PAGES", &pages)?;
        }

        if let Ok(timeout) = std::env::var("HEAPDB_LOCK_TIMEOUT_MS") {
            self.lock.timeout_ms = parse_env("HEAPDB_LOCK_TIMEOUT_MS", &timeout)?;
        }

        if let Ok(policy) = std::env::var("HEAPDB_DEADLOCK_POLICY") {
            self.lock.deadlock_policy = policy.parse()?;
        }

        if let Ok(level) = std::env::var("HEAPDB_LOG_LEVEL") {
            self.logging.level = level;
        }

        self.validate()?;
        Ok(self)
    }

    /// Загружает конфигурацию из переменных окружения
    pub fn from_env() -> Result<Self> {
        DatabaseConfig::default().apply_env()
    }

    /// Валидирует конфигурацию
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_PAGE_SIZES.contains(&self.storage.page_size) {
            return Err(Error::configuration(format!(
                "Unsupported page size {}, expected one of {:?}",
                self.storage.page_size, SUPPORTED_PAGE_SIZES
            )));
        }

        if self.storage.buffer_pool_pages == 0 {
            return Err(Error::configuration(
                "Buffer pool size must be greater than 0",
            ));
        }

        if self.lock.timeout_ms == 0 || self.lock.timeout_ms > MAX_LOCK_TIMEOUT_MS {
            return Err(Error::configuration(format!(
                "Lock timeout must be in 1..={} ms",
                MAX_LOCK_TIMEOUT_MS
            )));
        }

        if self.logging.level.parse::<log::LevelFilter>().is_err() {
            return Err(Error::configuration(format!(
                "Unknown log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::configuration(format!("Invalid value for {}: {}", name, value)))
}
