//! Константы для heapdb

/// Размер страницы по умолчанию
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Поддерживаемые размеры страниц
pub const SUPPORTED_PAGE_SIZES: &[usize] = &[1024, 2048, 4096, 8192, 16384, 32768, 65536];

/// Количество страниц в пуле буферов по умолчанию
pub const DEFAULT_BUFFER_POOL_PAGES: usize = 50;

/// Таймаут блокировки по умолчанию (в миллисекундах)
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 1000;

/// Максимальный таймаут блокировки (в миллисекундах)
pub const MAX_LOCK_TIMEOUT_MS: u64 = 300_000;

/// Зерно хеша для идентификаторов таблиц
pub const TABLE_ID_SEED: u64 = 0x5254_5342;
