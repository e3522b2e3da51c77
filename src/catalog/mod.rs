//! Каталог таблиц heapdb
//!
//! Сопоставляет идентификатор таблицы с ее файлом кучи и размером страницы.

use crate::common::{Error, Result, TableId};
use crate::storage::heap_file::HeapFile;
use log::{debug, warn};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[cfg(test)]
mod tests;

/// Запись каталога
#[derive(Debug, Clone)]
pub struct TableEntry {
    pub name: String,
    pub file: Arc<HeapFile>,
}

#[derive(Debug, Default)]
struct Tables {
    by_id: HashMap<TableId, TableEntry>,
    by_name: HashMap<String, TableId>,
}

/// Каталог таблиц
#[derive(Debug, Default)]
pub struct Catalog {
    tables: RwLock<Tables>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Регистрирует таблицу. Таблица с тем же именем или тем же файлом заменяется.
    pub fn add_table(&self, name: impl Into<String>, file: HeapFile) -> TableId {
        let name = name.into();
        let table_id = file.id();
        let mut tables = self.tables.write();

        if let Some(old_id) = tables.by_name.remove(&name) {
            if old_id != table_id {
                warn!("Table {} is replaced: id {} -> {}", name, old_id, table_id);
                tables.by_id.remove(&old_id);
            }
        }
        if let Some(old) = tables.by_id.remove(&table_id) {
            if old.name != name {
                warn!("File {} is re-registered as {} (was {})", file.path().display(), name, old.name);
                tables.by_name.remove(&old.name);
            }
        }

        debug!("Registered table {} ({}) at {}", name, table_id, file.path().display());
        tables.by_name.insert(name.clone(), table_id);
        tables.by_id.insert(
            table_id,
            TableEntry {
                name,
                file: Arc::new(file),
            },
        );
        table_id
    }

    /// Файл кучи таблицы
    pub fn get_file(&self, table_id: TableId) -> Result<Arc<HeapFile>> {
        self.tables
            .read()
            .by_id
            .get(&table_id)
            .map(|entry| Arc::clone(&entry.file))
            .ok_or_else(|| Error::storage_not_found(table_id, None, "table is not in the catalog"))
    }

    /// Идентификатор таблицы по имени
    pub fn table_id(&self, name: &str) -> Option<TableId> {
        self.tables.read().by_name.get(name).copied()
    }

    /// Имя таблицы по идентификатору
    pub fn table_name(&self, table_id: TableId) -> Result<String> {
        self.tables
            .read()
            .by_id
            .get(&table_id)
            .map(|entry| entry.name.clone())
            .ok_or_else(|| Error::storage_not_found(table_id, None, "table is not in the catalog"))
    }

    /// Размер страницы таблицы
    pub fn page_size(&self, table_id: TableId) -> Result<usize> {
        Ok(self.get_file(table_id)?.page_size())
    }

    /// Идентификаторы всех таблиц по возрастанию
    pub fn table_ids(&self) -> Vec<TableId> {
        let mut ids: Vec<TableId> = self.tables.read().by_id.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.tables.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut tables = self.tables.write();
        tables.by_id.clear();
        tables.by_name.clear();
    }
}
