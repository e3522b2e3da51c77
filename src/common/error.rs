//! Обработка ошибок для heapdb

use crate::common::types::{PageId, PageNumber, TableId, TransactionId};
use thiserror::Error;

/// Основной тип ошибки для heapdb
#[derive(Error, Debug)]
pub enum Error {
    /// Блокировка не получена за отведенное время (вероятный дедлок)
    #[error("Lock timeout: {transaction_id} waited {waited_ms} ms for page {page_id}")]
    LockTimeout {
        transaction_id: TransactionId,
        page_id: PageId,
        waited_ms: u64,
    },

    /// Обнаружен цикл в графе ожидания
    #[error("Deadlock detected: {transaction_id} waiting for page {page_id}, cycle {cycle:?}")]
    Deadlock {
        transaction_id: TransactionId,
        page_id: PageId,
        cycle: Vec<TransactionId>,
    },

    /// Таблица или страница не существует
    #[error("Storage not found: table {table_id}{}: {message}", fmt_page(.page_number))]
    StorageNotFound {
        table_id: TableId,
        page_number: Option<PageNumber>,
        message: String,
    },

    /// Ошибка чтения носителя
    #[error("Storage I/O error: table {table_id}{}: {source}", fmt_page(.page_number))]
    StorageIo {
        table_id: TableId,
        page_number: Option<PageNumber>,
        #[source]
        source: std::io::Error,
    },

    /// Нарушение внутреннего инварианта таблицы блокировок
    #[error("Invalid lock state: {message}")]
    InvalidLockState { message: String },

    /// Ошибка транзакции
    #[error("Transaction error: {message}")]
    Transaction { message: String },

    /// Ошибка валидации
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Ошибка конфигурации
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Ошибка I/O операций
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn fmt_page(page_number: &Option<PageNumber>) -> String {
    match page_number {
        Some(n) => format!(", page {}", n),
        None => String::new(),
    }
}

/// Тип результата для heapdb
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Создает ошибку отсутствующей таблицы или страницы
    pub fn storage_not_found(
        table_id: TableId,
        page_number: Option<PageNumber>,
        message: impl Into<String>,
    ) -> Self {
        Self::StorageNotFound {
            table_id,
            page_number,
            message: message.into(),
        }
    }

    /// Преобразует ошибку чтения в типизированную ошибку хранилища.
    /// `NotFound` от файловой системы не повторяется, остальное считается сбоем I/O.
    pub fn storage_io(
        table_id: TableId,
        page_number: Option<PageNumber>,
        source: std::io::Error,
    ) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::StorageNotFound {
                table_id,
                page_number,
                message: source.to_string(),
            }
        } else {
            Self::StorageIo {
                table_id,
                page_number,
                source,
            }
        }
    }

    /// Создает ошибку состояния блокировок
    pub fn invalid_lock_state(message: impl Into<String>) -> Self {
        Self::InvalidLockState {
            message: message.into(),
        }
    }

    /// Создает ошибку транзакции
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
        }
    }

    /// Создает ошибку валидации
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Создает ошибку конфигурации
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Ошибка означает, что транзакцию нужно прервать и освободить ее блокировки
    pub fn is_transaction_abort(&self) -> bool {
        matches!(self, Error::LockTimeout { .. } | Error::Deadlock { .. })
    }

    /// Вызывающий код может повторить операцию
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::StorageIo { .. })
    }
}
