//! Менеджер блокировок для heapdb
//!
//! Реализует строгое двухфазное блокирование страниц: Shared/Exclusive
//! блокировки, повышение Shared до Exclusive, ожидание с дедлайном и
//! (по желанию) поиск циклов в графе ожидания.
//!
//! Вся таблица блокировок, граф ожидания и статистика живут в одном
//! контейнере под одним мьютексом. Ожидающие потоки спят на условной
//! переменной, которая отпускает мьютекс на время ожидания и будится при
//! каждом освобождении блокировки.

use crate::common::{DeadlockPolicy, Error, LockConfig, PageId, Permission, Result, TransactionId};
use log::{debug, warn};
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::{Duration, Instant};

/// Режим блокировки
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum LockMode {
    /// Разделяемая блокировка (Shared) - для чтения
    Shared,
    /// Исключительная блокировка (Exclusive) - для записи
    Exclusive,
}

impl LockMode {
    /// Проверяет совместимость режимов блокировки разных транзакций
    pub fn is_compatible(&self, other: &LockMode) -> bool {
        matches!((self, other), (LockMode::Shared, LockMode::Shared))
    }

    /// Удерживаемый режим покрывает запрошенный (Exclusive покрывает Shared)
    pub fn covers(&self, requested: LockMode) -> bool {
        *self >= requested
    }
}

impl From<Permission> for LockMode {
    fn from(permission: Permission) -> Self {
        match permission {
            Permission::ReadOnly => LockMode::Shared,
            Permission::ReadWrite => LockMode::Exclusive,
        }
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Shared => write!(f, "S"),
            LockMode::Exclusive => write!(f, "X"),
        }
    }
}

/// Состояние блокировок одной страницы.
///
/// Страница либо разделяется набором читателей, либо принадлежит ровно
/// одному писателю, но никогда не находится в обоих состояниях сразу.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockEntry {
    shared: HashSet<TransactionId>,
    exclusive: Option<TransactionId>,
}

impl LockEntry {
    pub fn shared_holders(&self) -> &HashSet<TransactionId> {
        &self.shared
    }

    pub fn exclusive_holder(&self) -> Option<TransactionId> {
        self.exclusive
    }

    /// Режим, в котором транзакция держит страницу
    pub fn mode_of(&self, transaction_id: TransactionId) -> Option<LockMode> {
        if self.exclusive == Some(transaction_id) {
            Some(LockMode::Exclusive)
        } else if self.shared.contains(&transaction_id) {
            Some(LockMode::Shared)
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.shared.is_empty() && self.exclusive.is_none()
    }

    /// Количество удерживаемых блокировок на странице
    pub fn holder_count(&self) -> usize {
        self.shared.len() + usize::from(self.exclusive.is_some())
    }

    /// Другие транзакции, мешающие выдать `mode` транзакции `transaction_id`
    fn conflicting_holders(
        &self,
        transaction_id: TransactionId,
        mode: LockMode,
    ) -> Vec<TransactionId> {
        let mut conflicts: Vec<TransactionId> = self
            .exclusive
            .into_iter()
            .filter(|holder| *holder != transaction_id)
            .collect();

        if mode == LockMode::Exclusive {
            conflicts.extend(
                self.shared
                    .iter()
                    .copied()
                    .filter(|holder| *holder != transaction_id),
            );
        }

        conflicts
    }

    /// Выдает блокировку. Возвращает `true`, если это было повышение Shared -> Exclusive.
    fn grant(&mut self, transaction_id: TransactionId, mode: LockMode) -> Result<bool> {
        if !self.conflicting_holders(transaction_id, mode).is_empty() {
            return Err(Error::invalid_lock_state(format!(
                "{} lock granted to {} while other holders exist: {:?}",
                mode, transaction_id, self
            )));
        }

        match mode {
            LockMode::Shared => {
                if self.exclusive != Some(transaction_id) {
                    self.shared.insert(transaction_id);
                }
                Ok(false)
            }
            LockMode::Exclusive => {
                let upgraded = self.shared.remove(&transaction_id);
                self.exclusive = Some(transaction_id);
                Ok(upgraded)
            }
        }
    }

    /// Снимает любую блокировку транзакции. Возвращает `true`, если что-то было снято.
    fn remove(&mut self, transaction_id: TransactionId) -> bool {
        let mut removed = self.shared.remove(&transaction_id);
        if self.exclusive == Some(transaction_id) {
            self.exclusive = None;
            removed = true;
        }
        removed
    }
}

/// Граф ожидания для обнаружения дедлоков.
///
/// Хранит только то, какую страницу и в каком режиме ждет каждая
/// транзакция. Рёбра строятся заново при каждой проверке по текущим
/// держателям блокировок, поэтому граф не расходится с таблицей блокировок.
#[derive(Debug, Default)]
pub struct WaitForGraph {
    /// Ожидающая транзакция -> страница и запрошенный режим
    waiting: HashMap<TransactionId, (PageId, LockMode)>,
}

impl WaitForGraph {
    /// Отмечает, что транзакция ждет блокировку страницы
    pub fn set_waiting(&mut self, transaction: TransactionId, page_id: PageId, mode: LockMode) {
        self.waiting.insert(transaction, (page_id, mode));
    }

    /// Транзакция больше ничего не ждет
    pub fn clear_waiting(&mut self, transaction: TransactionId) {
        self.waiting.remove(&transaction);
    }

    /// Страница и режим, которые ждет транзакция
    pub fn waiting_on(&self, transaction: TransactionId) -> Option<(PageId, LockMode)> {
        self.waiting.get(&transaction).copied()
    }

    /// Ищет цикл, проходящий через `start`. Возвращает путь цикла, начиная с `start`.
    ///
    /// `blockers(waiter, page, mode)` возвращает транзакции, которые прямо
    /// сейчас мешают выдать `waiter` блокировку `mode` на `page`.
    pub fn find_cycle_through<F>(&self, start: TransactionId, blockers: F) -> Option<Vec<TransactionId>>
    where
        F: Fn(TransactionId, PageId, LockMode) -> Vec<TransactionId>,
    {
        let mut visited = HashSet::new();
        let mut path = vec![start];
        if self.dfs(start, start, &blockers, &mut visited, &mut path) {
            Some(path)
        } else {
            None
        }
    }

    fn dfs<F>(
        &self,
        current: TransactionId,
        start: TransactionId,
        blockers: &F,
        visited: &mut HashSet<TransactionId>,
        path: &mut Vec<TransactionId>,
    ) -> bool
    where
        F: Fn(TransactionId, PageId, LockMode) -> Vec<TransactionId>,
    {
        visited.insert(current);

        let Some((page_id, mode)) = self.waiting_on(current) else {
            return false;
        };

        let mut neighbors = blockers(current, page_id, mode);
        neighbors.sort();
        for neighbor in neighbors {
            if neighbor == current {
                continue;
            }
            if neighbor == start {
                return true;
            }
            if !visited.contains(&neighbor) {
                path.push(neighbor);
                if self.dfs(neighbor, start, blockers, visited, path) {
                    return true;
                }
                path.pop();
            }
        }

        false
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }
}

/// Статистика менеджера блокировок
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LockManagerStats {
    /// Общее количество запросов блокировок
    pub total_lock_requests: u64,
    /// Количество успешно полученных блокировок (без повторных запросов уже удерживаемых)
    pub locks_acquired: u64,
    /// Количество повышений Shared -> Exclusive
    pub upgrades: u64,
    /// Количество освобожденных блокировок
    pub locks_released: u64,
    /// Количество запросов, которым пришлось ждать
    pub blocked_requests: u64,
    /// Количество запросов, прерванных по таймауту
    pub timeouts: u64,
    /// Количество обнаруженных дедлоков
    pub deadlocks_detected: u64,
    /// Количество запросов, ожидающих прямо сейчас
    pub waiting_requests: u64,
    /// Количество активных блокировок
    pub active_locks: u64,
}

/// Состояние под мьютексом менеджера
#[derive(Debug, Default)]
struct LockTable {
    entries: HashMap<PageId, LockEntry>,
    wait_for: WaitForGraph,
    stats: LockManagerStats,
}

impl LockTable {
    fn stop_waiting(&mut self, transaction_id: TransactionId) {
        self.wait_for.clear_waiting(transaction_id);
        self.stats.waiting_requests = self.stats.waiting_requests.saturating_sub(1);
    }

    fn remove_holder(&mut self, transaction_id: TransactionId, page_id: PageId) -> bool {
        let Some(entry) = self.entries.get_mut(&page_id) else {
            return false;
        };
        let removed = entry.remove(transaction_id);
        if entry.is_empty() {
            self.entries.remove(&page_id);
        }
        if removed {
            self.stats.locks_released += 1;
            self.stats.active_locks = self.stats.active_locks.saturating_sub(1);
        }
        removed
    }
}

/// Менеджер блокировок
pub struct LockManager {
    table: Mutex<LockTable>,
    /// Будится при каждом освобождении блокировки
    released: Condvar,
    default_timeout: Duration,
    deadlock_policy: DeadlockPolicy,
}

impl LockManager {
    /// Создает новый менеджер блокировок с настройками по умолчанию
    pub fn new() -> Self {
        Self::with_config(&LockConfig::default())
    }

    /// Создает менеджер блокировок с заданной конфигурацией
    pub fn with_config(config: &LockConfig) -> Self {
        Self {
            table: Mutex::new(LockTable::default()),
            released: Condvar::new(),
            default_timeout: config.timeout(),
            deadlock_policy: config.deadlock_policy,
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn deadlock_policy(&self) -> DeadlockPolicy {
        self.deadlock_policy
    }

    /// Получает блокировку, ожидая не дольше таймаута по умолчанию
    pub fn acquire(
        &self,
        transaction_id: TransactionId,
        page_id: PageId,
        mode: LockMode,
    ) -> Result<()> {
        self.acquire_with_timeout(transaction_id, page_id, mode, self.default_timeout)
    }

    /// Получает блокировку, ожидая не дольше `timeout`.
    ///
    /// Возвращает `LockTimeout`, если блокировка не стала доступной до
    /// дедлайна, и `Deadlock`, если включен граф ожидания и запрос замкнул
    /// цикл. В обоих случаях транзакция ничего не получает.
    pub fn acquire_with_timeout(
        &self,
        transaction_id: TransactionId,
        page_id: PageId,
        mode: LockMode,
        timeout: Duration,
    ) -> Result<()> {
        let started = Instant::now();
        let deadline = started.checked_add(timeout).ok_or_else(|| {
            Error::validation(format!("Lock timeout {:?} is out of range", timeout))
        })?;

        let mut table = self.table.lock();
        table.stats.total_lock_requests += 1;
        let mut waiting = false;

        loop {
            let state = &mut *table;
            let (held, conflicts) = match state.entries.get(&page_id) {
                Some(entry) => (
                    entry.mode_of(transaction_id),
                    entry.conflicting_holders(transaction_id, mode),
                ),
                None => (None, Vec::new()),
            };

            if held.is_some_and(|held| held.covers(mode)) {
                if waiting {
                    state.stop_waiting(transaction_id);
                }
                return Ok(());
            }

            if conflicts.is_empty() {
                let upgraded = state.entries.entry(page_id).or_default().grant(transaction_id, mode)?;
                if upgraded {
                    state.stats.upgrades += 1;
                } else {
                    state.stats.active_locks += 1;
                }
                state.stats.locks_acquired += 1;
                if waiting {
                    state.stop_waiting(transaction_id);
                }
                debug!(
                    "{} acquired {} lock on page {}{}",
                    transaction_id,
                    mode,
                    page_id,
                    if upgraded { " (upgrade)" } else { "" }
                );
                return Ok(());
            }

            if !waiting {
                waiting = true;
                state.stats.blocked_requests += 1;
                state.stats.waiting_requests += 1;
                debug!(
                    "{} waits for {} lock on page {} held by {:?}",
                    transaction_id, mode, page_id, conflicts
                );
            }

            if self.deadlock_policy == DeadlockPolicy::WaitForGraph {
                state.wait_for.set_waiting(transaction_id, page_id, mode);
                let entries = &state.entries;
                let cycle = state
                    .wait_for
                    .find_cycle_through(transaction_id, |waiter, page, requested| {
                        entries
                            .get(&page)
                            .map(|entry| entry.conflicting_holders(waiter, requested))
                            .unwrap_or_default()
                    });
                if let Some(cycle) = cycle {
                    state.stop_waiting(transaction_id);
                    state.stats.deadlocks_detected += 1;
                    warn!(
                        "Deadlock: {} waiting for page {}, cycle {:?}",
                        transaction_id, page_id, cycle
                    );
                    return Err(Error::Deadlock {
                        transaction_id,
                        page_id,
                        cycle,
                    });
                }
            }

            if Instant::now() >= deadline {
                state.stop_waiting(transaction_id);
                state.stats.timeouts += 1;
                let waited_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                warn!(
                    "{} timed out after {} ms waiting for {} lock on page {}",
                    transaction_id, waited_ms, mode, page_id
                );
                return Err(Error::LockTimeout {
                    transaction_id,
                    page_id,
                    waited_ms,
                });
            }

            self.released.wait_until(&mut table, deadline);
        }
    }

    /// Освобождает блокировку транзакции на странице и будит ожидающих
    pub fn release(&self, transaction_id: TransactionId, page_id: PageId) -> bool {
        let removed = {
            let mut table = self.table.lock();
            table.remove_holder(transaction_id, page_id)
        };

        if removed {
            debug!("{} released lock on page {}", transaction_id, page_id);
            self.released.notify_all();
        }
        removed
    }

    /// Освобождает все блокировки транзакции. Возвращает количество снятых блокировок.
    pub fn release_all(&self, transaction_id: TransactionId) -> usize {
        let released = {
            let mut table = self.table.lock();
            let state = &mut *table;

            let pages: Vec<PageId> = state
                .entries
                .iter()
                .filter(|(_, entry)| entry.mode_of(transaction_id).is_some())
                .map(|(page_id, _)| *page_id)
                .collect();

            let released = pages
                .into_iter()
                .filter(|page_id| state.remove_holder(transaction_id, *page_id))
                .count();

            state.wait_for.clear_waiting(transaction_id);
            released
        };

        if released > 0 {
            debug!("{} released {} locks", transaction_id, released);
            self.released.notify_all();
        }
        released
    }

    /// Проверяет, держит ли транзакция какую-либо блокировку на странице
    pub fn holds_lock(&self, transaction_id: TransactionId, page_id: PageId) -> bool {
        self.lock_mode(transaction_id, page_id).is_some()
    }

    /// Режим блокировки транзакции на странице
    pub fn lock_mode(&self, transaction_id: TransactionId, page_id: PageId) -> Option<LockMode> {
        self.table
            .lock()
            .entries
            .get(&page_id)
            .and_then(|entry| entry.mode_of(transaction_id))
    }

    /// Страницы, заблокированные транзакцией, по возрастанию
    pub fn locked_pages(&self, transaction_id: TransactionId) -> Vec<PageId> {
        let table = self.table.lock();
        let mut pages: Vec<PageId> = table
            .entries
            .iter()
            .filter(|(_, entry)| entry.mode_of(transaction_id).is_some())
            .map(|(page_id, _)| *page_id)
            .collect();
        pages.sort();
        pages
    }

    /// Снимок состояния блокировок страницы
    pub fn lock_entry(&self, page_id: PageId) -> Option<LockEntry> {
        self.table.lock().entries.get(&page_id).cloned()
    }

    /// Количество страниц, на которых есть хотя бы одна блокировка
    pub fn locked_page_count(&self) -> usize {
        self.table.lock().entries.len()
    }

    /// Количество активных блокировок по всем страницам
    pub fn active_lock_count(&self) -> usize {
        self.table
            .lock()
            .entries
            .values()
            .map(LockEntry::holder_count)
            .sum()
    }

    /// Получает статистику менеджера блокировок
    pub fn get_statistics(&self) -> LockManagerStats {
        self.table.lock().stats.clone()
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}
