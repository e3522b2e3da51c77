//! Тесты для каталога таблиц
