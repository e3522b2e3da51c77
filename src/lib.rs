//! heapdb - страничное хранилище кучи и менеджер блокировок
//!
//! Этот модуль предоставляет файлы кучи из страниц фиксированного размера,
//! кэш страниц, через который проходит любой доступ к странице, и менеджер
//! блокировок, обеспечивающий строгое двухфазное блокирование страниц.

pub mod catalog;
pub mod cli;
pub mod common;
pub mod core;
pub mod storage;

pub use common::error::{Error, Result};
pub use common::types::*;

/// Версия библиотеки
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
