//! Сканирование таблиц через полный стек: каталог, пул буферов, блокировки

use super::common::*;
use heapdb::common::{DeadlockPolicy, Permission, Result};
use heapdb::core::{LockMode, PageCache};
use std::sync::Arc;
use std::thread;

#[test]
fn test_full_scan_inside_transaction() {
    let db = TestDatabase::new(200, DeadlockPolicy::Timeout);
    let (table_id, file) = db.create_table("numbers", &[250, 250, 17]);

    let tuples = db
        .transactions
        .run(|tid| {
            let tuples = file
                .scan(tid, db.buffer_pool.as_ref())
                .collect::<Result<Vec<_>>>()?;

            // Пока транзакция активна, все страницы заблокированы
            for n in 0..3 {
                let pid = heapdb::PageId::new(table_id, n);
                assert!(db.buffer_pool.holds_lock(tid, pid));
            }
            Ok(tuples)
        })
        .expect("scan succeeds");

    assert_eq!(tuples.len(), 517);
    for (i, tuple) in tuples.iter().enumerate() {
        assert_eq!(tuple_number(tuple.data()), i as u64);
        assert_eq!(tuple.data(), make_tuple(i as u64).as_slice());
    }
    let pages: Vec<u32> = tuples.iter().map(|t| t.record_id.page_id.page_number).collect();
    assert!(pages.windows(2).all(|w| w[0] <= w[1]));

    // После фиксации блокировок не осталось
    assert_eq!(db.buffer_pool.lock_manager().locked_page_count(), 0);
    assert_eq!(db.transactions.get_statistics().committed_transactions, 1);
}

#[test]
fn test_second_scan_is_served_from_cache() {
    let db = TestDatabase::new(200, DeadlockPolicy::Timeout);
    let (_, file) = db.create_table("cached", &[5, 5]);

    for _ in 0..2 {
        db.transactions
            .run(|tid| {
                file.scan(tid, db.buffer_pool.as_ref())
                    .collect::<Result<Vec<_>>>()
            })
            .expect("scan succeeds");
    }

    let stats = db.buffer_pool.get_stats();
    assert_eq!(stats.cache_misses, 2);
    assert_eq!(stats.cache_hits, 2);
}

#[test]
fn test_concurrent_readers_share_pages() {
    let db = Arc::new(TestDatabase::new(1000, DeadlockPolicy::Timeout));
    let (_, file) = db.create_table("shared", &[100, 100, 100]);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let db = Arc::clone(&db);
            let file = Arc::clone(&file);
            thread::spawn(move || {
                db.transactions
                    .run(|tid| {
                        let count = file
                            .scan(tid, db.buffer_pool.as_ref())
                            .collect::<Result<Vec<_>>>()?
                            .len();
                        Ok(count)
                    })
                    .expect("readers never conflict")
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().expect("reader thread"), 300);
    }
    assert_eq!(db.transactions.get_statistics().lock_aborts, 0);
}

#[test]
fn test_writer_blocks_scan_until_commit() {
    let db = Arc::new(TestDatabase::new(5000, DeadlockPolicy::Timeout));
    let (table_id, file) = db.create_table("guarded", &[3, 3]);

    let writer = db.transactions.begin();
    db.buffer_pool
        .fetch_page(writer, heapdb::PageId::new(table_id, 1), Permission::ReadWrite)
        .expect("writer gets page");

    let (done_tx, done_rx) = crossbeam::channel::bounded(1);
    let reader = {
        let db = Arc::clone(&db);
        let file = Arc::clone(&file);
        thread::spawn(move || {
            let result = db.transactions.run(|tid| {
                file.scan(tid, db.buffer_pool.as_ref())
                    .collect::<Result<Vec<_>>>()
            });
            let _ = done_tx.send(());
            result
        })
    };

    // Читатель ждет на второй странице
    assert!(done_rx
        .recv_timeout(std::time::Duration::from_millis(200))
        .is_err());

    db.transactions.commit(writer).expect("writer commits");
    let tuples = reader
        .join()
        .expect("reader thread")
        .expect("scan finishes after commit");
    assert_eq!(tuples.len(), 6);

    assert_eq!(
        db.buffer_pool
            .lock_manager()
            .lock_mode(writer, heapdb::PageId::new(table_id, 1)),
        None::<LockMode>
    );
}
