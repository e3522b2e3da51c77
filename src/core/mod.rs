//! Ядро heapdb: блокировки, пул буферов и транзакции

pub mod buffer;
pub mod lock;
pub mod transaction;

// Переэкспортируем основные типы
pub use buffer::{BufferPool, BufferStats, PageCache};
pub use lock::{LockEntry, LockManager, LockManagerStats, LockMode, WaitForGraph};
pub use transaction::{TransactionManager, TransactionManagerStats};
