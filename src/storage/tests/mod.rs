//! Тесты для модуля storage
//!
//! Формат страницы кучи, чтение страниц из файла и последовательное сканирование.
