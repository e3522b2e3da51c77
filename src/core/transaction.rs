//! Менеджер транзакций для heapdb
//!
//! Выдает идентификаторы транзакций и в конце каждой транзакции (фиксация
//! или откат) снимает все ее блокировки через пул буферов. Таймаут или
//! дедлок при получении блокировки трактуется как сигнал к откату.

use crate::common::{Error, Result, TransactionId};
use crate::core::buffer::BufferPool;
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Статистика менеджера транзакций
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransactionManagerStats {
    /// Общее количество запущенных транзакций
    pub total_transactions: u64,
    /// Количество активных транзакций
    pub active_transactions: u64,
    /// Количество зафиксированных транзакций
    pub committed_transactions: u64,
    /// Количество отмененных транзакций
    pub aborted_transactions: u64,
    /// Количество откатов из-за таймаута блокировки или дедлока
    pub lock_aborts: u64,
}

#[derive(Debug, Default)]
struct Transactions {
    active: HashSet<TransactionId>,
    stats: TransactionManagerStats,
}

/// Менеджер транзакций
pub struct TransactionManager {
    buffer_pool: Arc<BufferPool>,
    state: Mutex<Transactions>,
}

impl TransactionManager {
    pub fn new(buffer_pool: Arc<BufferPool>) -> Self {
        Self {
            buffer_pool,
            state: Mutex::new(Transactions::default()),
        }
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.buffer_pool
    }

    /// Начинает новую транзакцию
    pub fn begin(&self) -> TransactionId {
        let transaction_id = TransactionId::next();
        let mut state = self.state.lock();
        state.active.insert(transaction_id);
        state.stats.total_transactions += 1;
        let active = state.active.len() as u64;
        state.stats.active_transactions = active;
        debug!("{} started", transaction_id);
        transaction_id
    }

    /// Фиксирует транзакцию и снимает все ее блокировки
    pub fn commit(&self, transaction_id: TransactionId) -> Result<()> {
        self.finish(transaction_id)?;
        let released = self.buffer_pool.transaction_complete(transaction_id);
        self.state.lock().stats.committed_transactions += 1;
        info!("{} committed, released {} locks", transaction_id, released);
        Ok(())
    }

    /// Откатывает транзакцию и снимает все ее блокировки
    pub fn abort(&self, transaction_id: TransactionId) -> Result<()> {
        self.finish(transaction_id)?;
        let released = self.buffer_pool.transaction_complete(transaction_id);
        self.state.lock().stats.aborted_transactions += 1;
        info!("{} aborted, released {} locks", transaction_id, released);
        Ok(())
    }

    fn finish(&self, transaction_id: TransactionId) -> Result<()> {
        let mut state = self.state.lock();
        if !state.active.remove(&transaction_id) {
            return Err(Error::transaction(format!(
                "{} is not active",
                transaction_id
            )));
        }
        let active = state.active.len() as u64;
        state.stats.active_transactions = active;
        Ok(())
    }

    /// Выполняет замыкание в новой транзакции: фиксирует при успехе, откатывает при ошибке
    pub fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(TransactionId) -> Result<T>,
    {
        let transaction_id = self.begin();
        match f(transaction_id) {
            Ok(value) => {
                self.commit(transaction_id)?;
                Ok(value)
            }
            Err(e) => {
                if e.is_transaction_abort() {
                    warn!("{} aborted by lock manager: {}", transaction_id, e);
                    self.state.lock().stats.lock_aborts += 1;
                }
                self.abort(transaction_id)?;
                Err(e)
            }
        }
    }

    pub fn is_active(&self, transaction_id: TransactionId) -> bool {
        self.state.lock().active.contains(&transaction_id)
    }

    /// Активные транзакции по возрастанию идентификатора
    pub fn active_transactions(&self) -> Vec<TransactionId> {
        let mut active: Vec<TransactionId> = self.state.lock().active.iter().copied().collect();
        active.sort();
        active
    }

    pub fn get_statistics(&self) -> TransactionManagerStats {
        self.state.lock().stats.clone()
    }
}
