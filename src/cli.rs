//! CLI интерфейс для heapdb
//!
//! Предоставляет командную строку для просмотра и сканирования файлов кучи

use crate::catalog::Catalog;
use crate::common::DatabaseConfig;
use crate::core::{BufferPool, TransactionManager};
use crate::storage::heap_file::HeapFile;
use crate::storage::page::{encode_page, slots_per_page};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// heapdb - страничное хранилище кучи с двухфазным блокированием
#[derive(Parser)]
#[command(name = "heapdb")]
#[command(about = "heapdb - heap-file page storage with a two-phase lock manager")]
#[command(version)]
pub struct Cli {
    /// Конфигурационный файл
    #[arg(short, long, value_name = "CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Уровень детализации логирования
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Показать информацию о файле кучи
    Info {
        /// Файл кучи
        file: PathBuf,

        /// Размер кортежа в байтах
        #[arg(short, long)]
        tuple_size: usize,

        /// Вывести в формате JSON
        #[arg(long)]
        json: bool,
    },

    /// Просканировать файл кучи в одной транзакции
    Scan {
        /// Файл кучи
        file: PathBuf,

        /// Размер кортежа в байтах
        #[arg(short, long)]
        tuple_size: usize,

        /// Максимальное количество выводимых кортежей
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Создать файл кучи с пронумерованными кортежами
    Create {
        /// Файл кучи
        file: PathBuf,

        /// Размер кортежа в байтах
        #[arg(short, long)]
        tuple_size: usize,

        /// Количество кортежей
        #[arg(long)]
        tuples: usize,

        /// Перезаписать существующий файл
        #[arg(long)]
        force: bool,
    },

    /// Показать действующую конфигурацию
    Config,
}

#[derive(Debug, Serialize)]
struct FileInfo {
    path: String,
    table_id: u64,
    page_size: usize,
    tuple_size: usize,
    byte_len: u64,
    page_count: usize,
    slots_per_page: usize,
}

impl Cli {
    /// Загружает конфигурацию: файл, затем переменные окружения, затем аргументы
    pub fn load_config(&self) -> anyhow::Result<DatabaseConfig> {
        let config = match &self.config {
            Some(path) => DatabaseConfig::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => DatabaseConfig::default(),
        };

        let mut config = config.apply_env()?;
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
            config.validate()?;
        }

        Ok(config)
    }

    /// Выполняет команду
    pub fn execute(&self, config: &DatabaseConfig) -> anyhow::Result<()> {
        match &self.command {
            Commands::Info {
                file,
                tuple_size,
                json,
            } => self.show_info(config, file, *tuple_size, *json),
            Commands::Scan {
                file,
                tuple_size,
                limit,
            } => self.scan(config, file, *tuple_size, *limit),
            Commands::Create {
                file,
                tuple_size,
                tuples,
                force,
            } => self.create(config, file, *tuple_size, *tuples, *force),
            Commands::Config => {
                print!("{}", config.to_toml()?);
                Ok(())
            }
        }
    }

    fn show_info(
        &self,
        config: &DatabaseConfig,
        path: &Path,
        tuple_size: usize,
        json: bool,
    ) -> anyhow::Result<()> {
        let file = HeapFile::open(path, tuple_size, config.storage.page_size)?;
        let info = FileInfo {
            path: file.path().display().to_string(),
            table_id: file.id(),
            page_size: file.page_size(),
            tuple_size,
            byte_len: file.byte_len()?,
            page_count: file.page_count()?,
            slots_per_page: slots_per_page(file.page_size(), tuple_size),
        };

        if json {
            println!("{}", serde_json::to_string_pretty(&info)?);
        } else {
            println!("File:           {}", info.path);
            println!("Table id:       {}", info.table_id);
            println!("Page size:      {}", info.page_size);
            println!("Tuple size:     {}", info.tuple_size);
            println!("Bytes:          {}", info.byte_len);
            println!("Pages:          {}", info.page_count);
            println!("Slots per page: {}", info.slots_per_page);
        }
        Ok(())
    }

    fn scan(
        &self,
        config: &DatabaseConfig,
        path: &Path,
        tuple_size: usize,
        limit: Option<usize>,
    ) -> anyhow::Result<()> {
        let catalog = Arc::new(Catalog::new());
        let file = HeapFile::open(path, tuple_size, config.storage.page_size)?;
        let table_id = catalog.add_table(path.display().to_string(), file);
        let file = catalog.get_file(table_id)?;

        let buffer_pool = Arc::new(BufferPool::new(config, Arc::clone(&catalog)));
        let transactions = TransactionManager::new(Arc::clone(&buffer_pool));

        let printed = transactions.run(|transaction_id| {
            let mut printed = 0usize;
            for tuple in file.scan(transaction_id, buffer_pool.as_ref()) {
                if limit.is_some_and(|limit| printed >= limit) {
                    break;
                }
                let tuple = tuple?;
                println!("{}\t{}", tuple.record_id, to_hex(tuple.data()));
                printed += 1;
            }
            Ok(printed)
        })?;

        let stats = buffer_pool.get_stats();
        log::info!(
            "Scanned {} tuples, {} page reads, {} cache hits",
            printed,
            stats.cache_misses,
            stats.cache_hits
        );
        Ok(())
    }

    fn create(
        &self,
        config: &DatabaseConfig,
        path: &Path,
        tuple_size: usize,
        tuples: usize,
        force: bool,
    ) -> anyhow::Result<()> {
        if path.exists() && !force {
            bail!("{} already exists, use --force to overwrite", path.display());
        }

        let page_size = config.storage.page_size;
        let per_page = slots_per_page(page_size, tuple_size);
        if per_page == 0 {
            bail!("Tuple size {} does not fit into a {} byte page", tuple_size, page_size);
        }

        let rows: Vec<Vec<u8>> = (0..tuples)
            .map(|i| numbered_tuple(i as u64, tuple_size))
            .collect();

        let mut bytes = Vec::with_capacity(rows.len().div_ceil(per_page) * page_size);
        for chunk in rows.chunks(per_page) {
            let refs: Vec<&[u8]> = chunk.iter().map(Vec::as_slice).collect();
            bytes.extend_from_slice(&encode_page(page_size, tuple_size, &refs)?);
        }

        std::fs::write(path, &bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!(
            "Wrote {} tuples in {} pages to {}",
            tuples,
            bytes.len() / page_size,
            path.display()
        );
        Ok(())
    }
}

/// Кортеж, начинающийся с номера в little-endian
fn numbered_tuple(n: u64, tuple_size: usize) -> Vec<u8> {
    let mut data = vec![0u8; tuple_size];
    let encoded = n.to_le_bytes();
    let len = encoded.len().min(tuple_size);
    data[..len].copy_from_slice(&encoded[..len]);
    data
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
