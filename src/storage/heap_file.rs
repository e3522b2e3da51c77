//! Файл кучи для heapdb
//!
//! Файл кучи - это плоская последовательность страниц фиксированного
//! размера без заголовка. Страница адресуется только своей позицией.
//! Последовательное сканирование получает каждую страницу через кэш
//! страниц с правами только на чтение, поэтому подчиняется тем же
//! блокировкам, что и любой другой доступ к странице.

use crate::common::{Error, PageId, PageNumber, Permission, Result, TableId, TransactionId};
use crate::common::constants::TABLE_ID_SEED;
use crate::core::buffer::PageCache;
use crate::storage::page::{slots_per_page, HeapPage, Tuple};
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use twox_hash::XxHash64;

/// Файл кучи, хранящий одну таблицу
#[derive(Debug, Clone)]
pub struct HeapFile {
    path: PathBuf,
    id: TableId,
    page_size: usize,
    tuple_size: usize,
}

impl HeapFile {
    /// Открывает файл кучи. Сам файл может еще не существовать.
    pub fn open(path: impl AsRef<Path>, tuple_size: usize, page_size: usize) -> Result<Self> {
        if page_size == 0 {
            return Err(Error::validation("Page size must be greater than 0"));
        }
        if slots_per_page(page_size, tuple_size) == 0 {
            return Err(Error::validation(format!(
                "Tuple size {} does not fit into a {} byte page",
                tuple_size, page_size
            )));
        }

        let path = std::path::absolute(path.as_ref())?;
        let id = table_id_for(&path);

        Ok(Self {
            path,
            id,
            page_size,
            tuple_size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Стабильный идентификатор таблицы: хеш абсолютного пути файла
    pub fn id(&self) -> TableId {
        self.id
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn tuple_size(&self) -> usize {
        self.tuple_size
    }

    /// Длина файла в байтах
    pub fn byte_len(&self) -> Result<u64> {
        std::fs::metadata(&self.path)
            .map(|metadata| metadata.len())
            .map_err(|e| Error::storage_io(self.id, None, e))
    }

    /// Количество страниц: длина файла, деленная на размер страницы с округлением вверх
    pub fn page_count(&self) -> Result<usize> {
        Ok(self.byte_len()?.div_ceil(self.page_size as u64) as usize)
    }

    /// Читает одну страницу. Неполная последняя страница дополняется нулями.
    pub fn read_page(&self, page_id: PageId) -> Result<HeapPage> {
        let page_number = Some(page_id.page_number);
        if page_id.table_id != self.id {
            return Err(Error::storage_not_found(
                page_id.table_id,
                page_number,
                format!("page does not belong to table {}", self.id),
            ));
        }

        let mut file =
            File::open(&self.path).map_err(|e| Error::storage_io(self.id, page_number, e))?;
        let len = file
            .metadata()
            .map_err(|e| Error::storage_io(self.id, page_number, e))?
            .len();

        let offset = page_id.byte_offset(self.page_size);
        if offset >= len {
            return Err(Error::storage_not_found(
                self.id,
                page_number,
                format!(
                    "page is beyond the end of {} ({} pages)",
                    self.path.display(),
                    len.div_ceil(self.page_size as u64)
                ),
            ));
        }

        let available = (len - offset).min(self.page_size as u64) as usize;
        let mut data = vec![0u8; self.page_size];
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| Error::storage_io(self.id, page_number, e))?;
        file.read_exact(&mut data[..available]).map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                Error::storage_not_found(self.id, page_number, "file was truncated during read")
            } else {
                Error::storage_io(self.id, page_number, e)
            }
        })?;

        HeapPage::new(page_id, data, self.tuple_size)
    }

    /// Создает ленивое сканирование всех кортежей файла для транзакции
    pub fn scan<'a, C: PageCache + ?Sized>(
        &'a self,
        transaction_id: TransactionId,
        cache: &'a C,
    ) -> HeapFileScan<'a, C> {
        HeapFileScan {
            file: self,
            cache,
            transaction_id,
            page_count: 0,
            current_page: 0,
            tuples: Vec::new().into_iter(),
            state: ScanState::New,
        }
    }
}

fn table_id_for(path: &Path) -> TableId {
    XxHash64::oneshot(TABLE_ID_SEED, path.to_string_lossy().as_bytes())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    New,
    Open,
    Closed,
}

/// Последовательное сканирование файла кучи.
///
/// Выдает кортежи страницы 0, затем страницы 1 и так далее. Закрытие не
/// снимает блокировок: они освобождаются только в конце транзакции.
pub struct HeapFileScan<'a, C: PageCache + ?Sized> {
    file: &'a HeapFile,
    cache: &'a C,
    transaction_id: TransactionId,
    page_count: usize,
    current_page: usize,
    tuples: std::vec::IntoIter<Tuple>,
    state: ScanState,
}

impl<'a, C: PageCache + ?Sized> HeapFileScan<'a, C> {
    /// Открывает сканирование и получает первую страницу
    pub fn open(&mut self) -> Result<()> {
        self.close();
        self.page_count = self.file.page_count()?;
        if self.page_count > 0 {
            self.load_page(0)?;
        }
        self.state = ScanState::Open;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.state == ScanState::Open
    }

    /// Индекс страницы, кортежи которой выдаются сейчас
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    fn load_page(&mut self, index: usize) -> Result<()> {
        let page_number = PageNumber::try_from(index).map_err(|_| {
            Error::storage_not_found(self.file.id(), None, format!("page {} is out of range", index))
        })?;
        let page_id = PageId::new(self.file.id(), page_number);

        let page = match self
            .cache
            .fetch_page(self.transaction_id, page_id, Permission::ReadOnly)
        {
            Ok(page) => page,
            Err(e) => {
                self.close();
                return Err(e);
            }
        };

        self.tuples = page.tuples().into_iter();
        self.current_page = index;
        Ok(())
    }

    /// Есть ли еще кортежи. Переходит на следующие страницы по мере необходимости.
    pub fn has_next(&mut self) -> Result<bool> {
        if self.state != ScanState::Open {
            return Ok(false);
        }

        loop {
            if !self.tuples.as_slice().is_empty() {
                return Ok(true);
            }
            if self.current_page + 1 >= self.page_count {
                return Ok(false);
            }
            self.load_page(self.current_page + 1)?;
        }
    }

    /// Следующий кортеж или `None`, если сканирование исчерпано или не открыто
    pub fn next_tuple(&mut self) -> Result<Option<Tuple>> {
        if self.has_next()? {
            Ok(self.tuples.next())
        } else {
            Ok(None)
        }
    }

    /// Перематывает сканирование в начало, заново получая страницу 0
    pub fn rewind(&mut self) -> Result<()> {
        self.open()
    }

    /// Закрывает сканирование. Безопасно вызывать в любой момент.
    pub fn close(&mut self) {
        self.tuples = Vec::new().into_iter();
        self.current_page = 0;
        self.state = ScanState::Closed;
    }
}

impl<'a, C: PageCache + ?Sized> Iterator for HeapFileScan<'a, C> {
    type Item = Result<Tuple>;

    /// Открывает сканирование при первом вызове; после ошибки больше ничего не выдает
    fn next(&mut self) -> Option<Self::Item> {
        if self.state == ScanState::New {
            if let Err(e) = self.open() {
                return Some(Err(e));
            }
        }
        self.next_tuple().transpose()
    }
}
