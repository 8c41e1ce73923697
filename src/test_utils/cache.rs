//! A [TransactionCache] wrapper that fails on demand.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use crate::{
    Error,
    cache::{SQLiteTransactionCache, TransactionCache},
    cursor::SyncCursor,
    transaction::{Transaction, TransactionFilter},
};

/// Delegates to an in-memory SQLite cache, except that the `fail_at`-th
/// upsert (counting from 1) returns [Error::DatabaseLockError] without
/// writing anything.
#[derive(Debug)]
pub(crate) struct FailingUpsertCache {
    inner: Arc<SQLiteTransactionCache>,
    fail_at: usize,
    upsert_count: AtomicUsize,
}

impl FailingUpsertCache {
    pub(crate) fn new(inner: Arc<SQLiteTransactionCache>, fail_at: usize) -> Self {
        Self {
            inner,
            fail_at,
            upsert_count: AtomicUsize::new(0),
        }
    }
}

impl TransactionCache for FailingUpsertCache {
    fn upsert(&self, transaction: &Transaction) -> Result<(), Error> {
        let attempt = self.upsert_count.fetch_add(1, Ordering::SeqCst) + 1;

        if attempt == self.fail_at {
            return Err(Error::DatabaseLockError);
        }

        self.inner.upsert(transaction)
    }

    fn get(&self, remote_id: &str) -> Result<Transaction, Error> {
        self.inner.get(remote_id)
    }

    fn list(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>, Error> {
        self.inner.list(filter)
    }

    fn count(&self) -> Result<u32, Error> {
        self.inner.count()
    }

    fn oldest(&self) -> Result<Option<Transaction>, Error> {
        self.inner.oldest()
    }

    fn newest(&self) -> Result<Option<Transaction>, Error> {
        self.inner.newest()
    }

    fn get_cursor(&self) -> Result<Option<SyncCursor>, Error> {
        self.inner.get_cursor()
    }

    fn set_cursor(&self, cursor: &SyncCursor) -> Result<(), Error> {
        self.inner.set_cursor(cursor)
    }
}
