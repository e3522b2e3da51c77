//! Формат страницы кучи для heapdb
//!
//! Страница состоит из битовой карты занятых слотов и массива кортежей
//! фиксированного размера. Для кортежа размером `t` байт и страницы
//! размером `P` байт число слотов равно `floor(P * 8 / (t * 8 + 1))`:
//! каждому слоту нужно `t` байт данных и один бит заголовка. Бит `i % 8`
//! байта `i / 8` (младший бит первым) отмечает слот `i` как занятый.

use crate::common::{Error, PageId, Result};
use std::fmt;

/// Адрес кортежа: страница + номер слота
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: usize,
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.page_id, self.slot)
    }
}

/// Кортеж, прочитанный со страницы. Содержимое для ядра непрозрачно.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    pub record_id: RecordId,
    pub data: Vec<u8>,
}

impl Tuple {
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Число слотов на странице
pub fn slots_per_page(page_size: usize, tuple_size: usize) -> usize {
    if tuple_size == 0 {
        return 0;
    }
    (page_size * 8) / (tuple_size * 8 + 1)
}

/// Размер битовой карты заголовка в байтах
pub fn header_size(num_slots: usize) -> usize {
    num_slots.div_ceil(8)
}

fn check_layout(page_size: usize, tuple_size: usize) -> Result<usize> {
    if tuple_size == 0 {
        return Err(Error::validation("Tuple size must be greater than 0"));
    }
    let num_slots = slots_per_page(page_size, tuple_size);
    if num_slots == 0 {
        return Err(Error::validation(format!(
            "Tuple size {} does not fit into a {} byte page",
            tuple_size, page_size
        )));
    }
    Ok(num_slots)
}

/// Страница кучи
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapPage {
    id: PageId,
    data: Vec<u8>,
    tuple_size: usize,
    num_slots: usize,
}

impl HeapPage {
    /// Разбирает страницу из байтов. Длина `data` задает размер страницы.
    pub fn new(id: PageId, data: Vec<u8>, tuple_size: usize) -> Result<Self> {
        let num_slots = check_layout(data.len(), tuple_size)?;
        Ok(Self {
            id,
            data,
            tuple_size,
            num_slots,
        })
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn page_size(&self) -> usize {
        self.data.len()
    }

    pub fn tuple_size(&self) -> usize {
        self.tuple_size
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    pub fn header_len(&self) -> usize {
        header_size(self.num_slots)
    }

    /// Проверяет, занят ли слот
    pub fn is_slot_used(&self, slot: usize) -> bool {
        slot < self.num_slots && self.data[slot / 8] & (1 << (slot % 8)) != 0
    }

    /// Номера занятых слотов по возрастанию
    pub fn used_slots(&self) -> Vec<usize> {
        (0..self.num_slots)
            .filter(|slot| self.is_slot_used(*slot))
            .collect()
    }

    pub fn num_empty_slots(&self) -> usize {
        self.num_slots - self.used_slots().len()
    }

    /// Кортеж в слоте, если слот занят
    pub fn tuple(&self, slot: usize) -> Option<Tuple> {
        if !self.is_slot_used(slot) {
            return None;
        }
        let start = self.header_len() + slot * self.tuple_size;
        Some(Tuple {
            record_id: RecordId {
                page_id: self.id,
                slot,
            },
            data: self.data[start..start + self.tuple_size].to_vec(),
        })
    }

    /// Все кортежи страницы в порядке слотов
    pub fn tuples(&self) -> Vec<Tuple> {
        (0..self.num_slots).filter_map(|slot| self.tuple(slot)).collect()
    }
}

/// Собирает байты страницы, размещая кортежи в слотах 0, 1, ...
pub fn encode_page(page_size: usize, tuple_size: usize, tuples: &[&[u8]]) -> Result<Vec<u8>> {
    let num_slots = check_layout(page_size, tuple_size)?;
    if tuples.len() > num_slots {
        return Err(Error::validation(format!(
            "{} tuples do not fit into a page with {} slots",
            tuples.len(),
            num_slots
        )));
    }

    let header_len = header_size(num_slots);
    let mut data = vec![0u8; page_size];
    for (slot, tuple) in tuples.iter().enumerate() {
        if tuple.len() != tuple_size {
            return Err(Error::validation(format!(
                "Tuple in slot {} has {} bytes, expected {}",
                slot,
                tuple.len(),
                tuple_size
            )));
        }
        data[slot / 8] |= 1 << (slot % 8);
        let start = header_len + slot * tuple_size;
        data[start..start + tuple_size].copy_from_slice(tuple);
    }

    Ok(data)
}
