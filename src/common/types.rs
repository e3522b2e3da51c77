//! Базовые типы данных для heapdb

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Идентификатор таблицы (единицы хранения)
pub type TableId = u64;

/// Номер страницы внутри файла
pub type PageNumber = u32;

/// Идентификатор страницы: таблица + позиция страницы в файле
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageId {
    /// Таблица, которой принадлежит страница
    pub table_id: TableId,
    /// Номер страницы (смещение в страницах от начала файла)
    pub page_number: PageNumber,
}

impl PageId {
    pub fn new(table_id: TableId, page_number: PageNumber) -> Self {
        Self {
            table_id,
            page_number,
        }
    }

    /// Смещение страницы в байтах при заданном размере страницы
    pub fn byte_offset(&self, page_size: usize) -> u64 {
        self.page_number as u64 * page_size as u64
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table_id, self.page_number)
    }
}

/// Счетчик для выдачи уникальных идентификаторов транзакций
static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Уникальный идентификатор транзакции
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(pub u64);

impl TransactionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Выдает новый идентификатор, который больше никогда не повторится в процессе
    pub fn next() -> Self {
        Self(NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TXN{}", self.0)
    }
}

/// Права доступа, с которыми транзакция запрашивает страницу
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    /// Только чтение
    ReadOnly,
    /// Чтение и запись
    ReadWrite,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::ReadOnly => write!(f, "READ_ONLY"),
            Permission::ReadWrite => write!(f, "READ_WRITE"),
        }
    }
}
