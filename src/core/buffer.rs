//! Пул буферов (кэш страниц) для heapdb
//!
//! Каждое обращение к странице проходит через менеджер блокировок: сначала
//! транзакция получает блокировку в режиме, соответствующем правам доступа,
//! и только потом получает страницу. При промахе страница читается из
//! файла кучи, найденного через каталог.

use crate::catalog::Catalog;
use crate::common::{DatabaseConfig, PageId, Permission, Result, TransactionId};
use crate::core::lock::{LockManager, LockMode};
use crate::storage::page::HeapPage;
use log::debug;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Источник страниц, обязанный выдавать страницу только после получения блокировки
pub trait PageCache: Send + Sync {
    /// Возвращает страницу, предварительно заблокировав ее для транзакции
    fn fetch_page(
        &self,
        transaction_id: TransactionId,
        page_id: PageId,
        permission: Permission,
    ) -> Result<Arc<HeapPage>>;
}

/// Статистика буфера
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BufferStats {
    /// Количество обращений к кэшу
    pub total_accesses: u64,
    /// Количество попаданий в кэш
    pub cache_hits: u64,
    /// Количество промахов кэша
    pub cache_misses: u64,
    /// Количество вытесненных страниц
    pub evictions: u64,
}

impl BufferStats {
    /// Возвращает hit ratio (отношение попаданий к общему количеству обращений)
    pub fn hit_ratio(&self) -> f64 {
        if self.total_accesses == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total_accesses as f64
        }
    }

    /// Регистрирует обращение к кэшу
    fn record_access(&mut self, is_hit: bool) {
        self.total_accesses += 1;
        if is_hit {
            self.cache_hits += 1;
        } else {
            self.cache_misses += 1;
        }
    }
}

/// Резидентные страницы в порядке последнего обращения
#[derive(Debug, Default)]
struct Frames {
    pages: HashMap<PageId, Arc<HeapPage>>,
    /// Очередь LRU: в начале самая давно использованная страница
    lru_queue: VecDeque<PageId>,
    stats: BufferStats,
}

impl Frames {
    fn touch(&mut self, page_id: PageId) {
        if let Some(pos) = self.lru_queue.iter().position(|&id| id == page_id) {
            self.lru_queue.remove(pos);
        }
        self.lru_queue.push_back(page_id);
    }

    fn remove(&mut self, page_id: PageId) -> Option<Arc<HeapPage>> {
        if let Some(pos) = self.lru_queue.iter().position(|&id| id == page_id) {
            self.lru_queue.remove(pos);
        }
        self.pages.remove(&page_id)
    }

    fn evict_lru(&mut self) {
        if let Some(victim) = self.lru_queue.pop_front() {
            self.pages.remove(&victim);
            self.stats.evictions += 1;
            debug!("Evicted page {} from buffer pool", victim);
        }
    }
}

/// Пул буферов с LRU вытеснением
pub struct BufferPool {
    lock_manager: Arc<LockManager>,
    catalog: Arc<Catalog>,
    capacity: usize,
    frames: Mutex<Frames>,
}

impl BufferPool {
    /// Создает пул буферов и собственный менеджер блокировок по конфигурации
    pub fn new(config: &DatabaseConfig, catalog: Arc<Catalog>) -> Self {
        let lock_manager = Arc::new(LockManager::with_config(&config.lock));
        Self::with_lock_manager(config.storage.buffer_pool_pages, lock_manager, catalog)
    }

    /// Создает пул буферов поверх существующего менеджера блокировок
    pub fn with_lock_manager(
        capacity: usize,
        lock_manager: Arc<LockManager>,
        catalog: Arc<Catalog>,
    ) -> Self {
        Self {
            lock_manager,
            catalog,
            capacity: capacity.max(1),
            frames: Mutex::new(Frames::default()),
        }
    }

    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.lock_manager
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Освобождает блокировку одной страницы до конца транзакции
    pub fn release_page(&self, transaction_id: TransactionId, page_id: PageId) -> bool {
        self.lock_manager.release(transaction_id, page_id)
    }

    pub fn holds_lock(&self, transaction_id: TransactionId, page_id: PageId) -> bool {
        self.lock_manager.holds_lock(transaction_id, page_id)
    }

    /// Завершает транзакцию: снимает все ее блокировки
    pub fn transaction_complete(&self, transaction_id: TransactionId) -> usize {
        self.lock_manager.release_all(transaction_id)
    }

    /// Убирает страницу из кэша без записи на диск
    pub fn discard_page(&self, page_id: PageId) -> bool {
        self.frames.lock().remove(page_id).is_some()
    }

    pub fn is_resident(&self, page_id: PageId) -> bool {
        self.frames.lock().pages.contains_key(&page_id)
    }

    /// Резидентные страницы, начиная с самой давно использованной
    pub fn resident_pages(&self) -> Vec<PageId> {
        self.frames.lock().lru_queue.iter().copied().collect()
    }

    /// Возвращает статистику буфера
    pub fn get_stats(&self) -> BufferStats {
        self.frames.lock().stats.clone()
    }

    fn cached(&self, page_id: PageId) -> Option<Arc<HeapPage>> {
        let mut frames = self.frames.lock();
        let page = frames.pages.get(&page_id).cloned();
        frames.stats.record_access(page.is_some());
        if page.is_some() {
            frames.touch(page_id);
        }
        page
    }

    fn install(&self, page: HeapPage) -> Arc<HeapPage> {
        let page_id = page.id();
        let mut frames = self.frames.lock();

        // Другой поток мог прочитать ту же страницу, пока мы читали файл
        if let Some(existing) = frames.pages.get(&page_id).cloned() {
            frames.touch(page_id);
            return existing;
        }

        while frames.pages.len() >= self.capacity && !frames.lru_queue.is_empty() {
            frames.evict_lru();
        }

        let page = Arc::new(page);
        frames.pages.insert(page_id, Arc::clone(&page));
        frames.lru_queue.push_back(page_id);
        page
    }
}

impl PageCache for BufferPool {
    fn fetch_page(
        &self,
        transaction_id: TransactionId,
        page_id: PageId,
        permission: Permission,
    ) -> Result<Arc<HeapPage>> {
        self.lock_manager
            .acquire(transaction_id, page_id, LockMode::from(permission))?;

        if let Some(page) = self.cached(page_id) {
            return Ok(page);
        }

        let file = self.catalog.get_file(page_id.table_id)?;
        let page = file.read_page(page_id)?;
        debug!("{} loaded page {} from {}", transaction_id, page_id, file.path().display());
        Ok(self.install(page))
    }
}
