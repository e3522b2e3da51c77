//! Общие утилиты для тестирования

use crate::catalog::Catalog;
use crate::common::{LockConfig, PageId, TableId};
use crate::core::{BufferPool, LockManager};
use crate::storage::heap_file::HeapFile;
use crate::storage::page::encode_page;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const TEST_PAGE_SIZE: usize = 4096;
pub const TEST_TUPLE_SIZE: usize = 8;

/// Кортеж, начинающийся с номера `n` в little-endian
pub fn tuple_bytes(n: u32, tuple_size: usize) -> Vec<u8> {
    let mut data = vec![0u8; tuple_size];
    data[..4].copy_from_slice(&n.to_le_bytes());
    data
}

/// Записывает файл кучи: каждая страница - список кортежей в слотах 0, 1, ...
pub fn write_heap_file(
    dir: &Path,
    name: &str,
    page_size: usize,
    tuple_size: usize,
    pages: &[Vec<Vec<u8>>],
) -> PathBuf {
    let path = dir.join(name);
    let mut bytes = Vec::new();
    for tuples in pages {
        let refs: Vec<&[u8]> = tuples.iter().map(Vec::as_slice).collect();
        bytes.extend_from_slice(&encode_page(page_size, tuple_size, &refs).unwrap());
    }
    std::fs::write(&path, bytes).unwrap();
    path
}

/// Страницы с последовательно пронумерованными кортежами: `counts[i]` кортежей на странице `i`
pub fn numbered_pages(counts: &[usize]) -> Vec<Vec<Vec<u8>>> {
    let mut next = 0u32;
    counts
        .iter()
        .map(|&count| {
            (0..count)
                .map(|_| {
                    let tuple = tuple_bytes(next, TEST_TUPLE_SIZE);
                    next += 1;
                    tuple
                })
                .collect()
        })
        .collect()
}

/// Первые четыре байта кортежа как число
pub fn tuple_number(data: &[u8]) -> u32 {
    u32::from_le_bytes([data[0], data[1], data[2], data[3]])
}

/// Тестовое окружение: временная директория, каталог и пул буферов
pub struct TestStore {
    pub temp_dir: TempDir,
    pub catalog: Arc<Catalog>,
    pub buffer_pool: Arc<BufferPool>,
}

impl TestStore {
    pub fn new(capacity: usize, lock_timeout: Duration) -> Self {
        let config = LockConfig {
            timeout_ms: lock_timeout.as_millis() as u64,
            ..LockConfig::default()
        };
        let catalog = Arc::new(Catalog::new());
        let lock_manager = Arc::new(LockManager::with_config(&config));
        let buffer_pool = Arc::new(BufferPool::with_lock_manager(
            capacity,
            lock_manager,
            Arc::clone(&catalog),
        ));
        Self {
            temp_dir: TempDir::new().unwrap(),
            catalog,
            buffer_pool,
        }
    }

    /// Создает таблицу с заданным числом кортежей на каждой странице
    pub fn add_table(&self, name: &str, counts: &[usize]) -> (TableId, Arc<HeapFile>) {
        let path = write_heap_file(
            self.temp_dir.path(),
            name,
            TEST_PAGE_SIZE,
            TEST_TUPLE_SIZE,
            &numbered_pages(counts),
        );
        let file = HeapFile::open(path, TEST_TUPLE_SIZE, TEST_PAGE_SIZE).unwrap();
        let table_id = self.catalog.add_table(name, file);
        (table_id, self.catalog.get_file(table_id).unwrap())
    }

    pub fn page(&self, table_id: TableId, page_number: u32) -> PageId {
        PageId::new(table_id, page_number)
    }
}
