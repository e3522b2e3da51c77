//! Общие утилиты для интеграционных тестов

use heapdb::catalog::Catalog;
use heapdb::common::{DatabaseConfig, DeadlockPolicy, TableId};
use heapdb::core::{BufferPool, TransactionManager};
use heapdb::storage::{encode_page, HeapFile};
use std::sync::Arc;
use tempfile::TempDir;

pub const PAGE_SIZE: usize = 4096;
pub const TUPLE_SIZE: usize = 16;

/// Контекст интеграционного теста: база в временной директории
#[allow(dead_code)]
pub struct TestDatabase {
    pub temp_dir: TempDir,
    pub config: DatabaseConfig,
    pub catalog: Arc<Catalog>,
    pub buffer_pool: Arc<BufferPool>,
    pub transactions: TransactionManager,
}

#[allow(dead_code)]
impl TestDatabase {
    pub fn new(lock_timeout_ms: u64, deadlock_policy: DeadlockPolicy) -> Self {
        let mut config = DatabaseConfig::default();
        config.storage.buffer_pool_pages = 16;
        config.lock.timeout_ms = lock_timeout_ms;
        config.lock.deadlock_policy = deadlock_policy;

        let catalog = Arc::new(Catalog::new());
        let buffer_pool = Arc::new(BufferPool::new(&config, Arc::clone(&catalog)));
        let transactions = TransactionManager::new(Arc::clone(&buffer_pool));

        Self {
            temp_dir: TempDir::new().expect("temp dir"),
            config,
            catalog,
            buffer_pool,
            transactions,
        }
    }

    /// Создает таблицу: `counts[i]` кортежей на странице `i`, кортежи пронумерованы подряд
    pub fn create_table(&self, name: &str, counts: &[usize]) -> (TableId, Arc<HeapFile>) {
        let path = self.temp_dir.path().join(format!("{}.dat", name));
        let mut bytes = Vec::new();
        let mut next = 0u64;
        for &count in counts {
            let tuples: Vec<Vec<u8>> = (0..count)
                .map(|_| {
                    let tuple = make_tuple(next);
                    next += 1;
                    tuple
                })
                .collect();
            let refs: Vec<&[u8]> = tuples.iter().map(Vec::as_slice).collect();
            bytes.extend(encode_page(PAGE_SIZE, TUPLE_SIZE, &refs).expect("encode page"));
        }
        std::fs::write(&path, bytes).expect("write heap file");

        let file = HeapFile::open(&path, TUPLE_SIZE, PAGE_SIZE).expect("open heap file");
        let table_id = self.catalog.add_table(name, file);
        let file = self.catalog.get_file(table_id).expect("registered file");
        (table_id, file)
    }
}

/// Кортеж с номером в первых восьми байтах и его дополнением в остальных
pub fn make_tuple(n: u64) -> Vec<u8> {
    let mut tuple = Vec::with_capacity(TUPLE_SIZE);
    tuple.extend_from_slice(&n.to_le_bytes());
    tuple.extend_from_slice(&(!n).to_le_bytes());
    tuple
}

/// Номер кортежа, записанного `make_tuple`
pub fn tuple_number(data: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[..8]);
    u64::from_le_bytes(bytes)
}
