//! Конкурентные сценарии: дедлоки, откаты и повторные попытки

use super::common::*;
use heapdb::common::{DeadlockPolicy, Error, Permission, Result};
use heapdb::core::PageCache;
use heapdb::PageId;
use std::sync::{Arc, Barrier};
use std::thread;

/// Две транзакции берут страницы в противоположном порядке и повторяют попытку после отката
fn run_crossed_writers(db: &Arc<TestDatabase>, table_id: u64) -> Vec<usize> {
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = [(0u32, 1u32), (1, 0)]
        .into_iter()
        .map(|(first, second)| {
            let db = Arc::clone(db);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut attempts = 0;
                loop {
                    attempts += 1;
                    let result = db.transactions.run(|tid| {
                        db.buffer_pool.fetch_page(
                            tid,
                            PageId::new(table_id, first),
                            Permission::ReadWrite,
                        )?;
                        if attempts == 1 {
                            barrier.wait();
                        }
                        db.buffer_pool.fetch_page(
                            tid,
                            PageId::new(table_id, second),
                            Permission::ReadWrite,
                        )?;
                        Ok(())
                    });
                    match result {
                        Ok(()) => return attempts,
                        Err(e) if e.is_transaction_abort() => continue,
                        Err(e) => panic!("unexpected error: {}", e),
                    }
                }
            })
        })
        .collect();

    handles
        .into_iter()
        .map(|handle| handle.join().expect("writer thread"))
        .collect()
}

#[test]
fn test_deadlock_detected_and_retried() {
    let db = Arc::new(TestDatabase::new(5000, DeadlockPolicy::WaitForGraph));
    let (table_id, _) = db.create_table("crossed", &[1, 1]);

    let attempts = run_crossed_writers(&db, table_id);

    // Один участник цикла откатывается, второй проходит с первой попытки
    assert!(attempts.contains(&1));
    assert!(attempts.iter().any(|&a| a > 1));

    let lock_stats = db.buffer_pool.lock_manager().get_statistics();
    assert!(lock_stats.deadlocks_detected >= 1);
    assert_eq!(lock_stats.active_locks, 0);

    let stats = db.transactions.get_statistics();
    assert_eq!(stats.committed_transactions, 2);
    assert!(stats.lock_aborts >= 1);
    assert_eq!(stats.active_transactions, 0);
}

#[test]
fn test_deadlock_resolved_by_timeout() {
    let db = Arc::new(TestDatabase::new(100, DeadlockPolicy::Timeout));
    let (table_id, _) = db.create_table("crossed", &[1, 1]);

    let attempts = run_crossed_writers(&db, table_id);
    assert!(attempts.iter().sum::<usize>() >= 3);

    let lock_stats = db.buffer_pool.lock_manager().get_statistics();
    assert!(lock_stats.timeouts >= 1);
    assert_eq!(lock_stats.deadlocks_detected, 0);
    assert_eq!(db.buffer_pool.lock_manager().locked_page_count(), 0);
    assert_eq!(db.transactions.get_statistics().committed_transactions, 2);
}

#[test]
fn test_upgrade_after_shared_scan() {
    let db = TestDatabase::new(100, DeadlockPolicy::Timeout);
    let (table_id, file) = db.create_table("upgrade", &[2]);

    db.transactions
        .run(|tid| {
            let tuples = file
                .scan(tid, db.buffer_pool.as_ref())
                .collect::<Result<Vec<_>>>()?;
            assert_eq!(tuples.len(), 2);

            // Единственный читатель может сразу повысить блокировку
            let page_id = PageId::new(table_id, 0);
            db.buffer_pool
                .fetch_page(tid, page_id, Permission::ReadWrite)?;
            assert_eq!(
                db.buffer_pool.lock_manager().lock_mode(tid, page_id),
                Some(heapdb::core::LockMode::Exclusive)
            );
            Ok(())
        })
        .expect("upgrade succeeds");

    assert_eq!(db.buffer_pool.lock_manager().get_statistics().upgrades, 1);
}

#[test]
fn test_mixed_readers_and_writers_all_finish() {
    let db = Arc::new(TestDatabase::new(50, DeadlockPolicy::WaitForGraph));
    let (table_id, file) = db.create_table("mixed", &[10, 10, 10, 10]);

    let handles: Vec<_> = (0..6u32)
        .map(|i| {
            let db = Arc::clone(&db);
            let file = Arc::clone(&file);
            thread::spawn(move || {
                let mut committed = 0;
                while committed < 5 {
                    let result = db.transactions.run(|tid| {
                        if i % 2 == 0 {
                            let count = file
                                .scan(tid, db.buffer_pool.as_ref())
                                .collect::<Result<Vec<_>>>()?
                                .len();
                            assert_eq!(count, 40);
                        } else {
                            let page_id = PageId::new(table_id, i % 4);
                            db.buffer_pool
                                .fetch_page(tid, page_id, Permission::ReadWrite)?;
                        }
                        Ok(())
                    });
                    match result {
                        Ok(()) => committed += 1,
                        Err(Error::LockTimeout { .. }) | Err(Error::Deadlock { .. }) => {}
                        Err(e) => panic!("unexpected error: {}", e),
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("worker thread");
    }

    assert_eq!(db.transactions.get_statistics().committed_transactions, 30);
    assert_eq!(db.buffer_pool.lock_manager().locked_page_count(), 0);
}
