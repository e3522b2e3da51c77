//! Хранилище данных heapdb

pub mod heap_file;
pub mod page;

#[cfg(test)]
pub mod tests;

pub use heap_file::{HeapFile, HeapFileScan};
pub use page::{encode_page, HeapPage, RecordId, Tuple};
