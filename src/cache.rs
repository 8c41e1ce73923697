//! Defines the transaction cache trait and its SQLite implementation.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::{
    Error,
    cursor::{SyncCursor, get_sync_cursor, set_sync_cursor},
    transaction::{
        Transaction, TransactionFilter, count_transactions, get_newest_transaction,
        get_oldest_transaction, get_transaction, list_transactions, upsert_transaction,
    },
};

/// Durable storage for mirrored transactions and the sync cursor.
///
/// Implementations must provide read-your-writes consistency and make
/// [TransactionCache::upsert] idempotent by remote ID.
pub trait TransactionCache: Send + Sync {
    /// Insert `transaction`, or replace the stored one with the same remote ID.
    fn upsert(&self, transaction: &Transaction) -> Result<(), Error>;

    /// Retrieve a transaction by its remote ID.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if there is no such transaction.
    fn get(&self, remote_id: &str) -> Result<Transaction, Error>;

    /// Retrieve the transactions matching `filter`, most recent first.
    fn list(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>, Error>;

    /// The number of cached transactions.
    fn count(&self) -> Result<u32, Error>;

    /// The transaction that occurred first, if any.
    fn oldest(&self) -> Result<Option<Transaction>, Error>;

    /// The transaction that occurred last, if any.
    fn newest(&self) -> Result<Option<Transaction>, Error>;

    /// The sync cursor, or `None` if no sync has completed yet.
    fn get_cursor(&self) -> Result<Option<SyncCursor>, Error>;

    /// Replace the sync cursor. The last write wins.
    fn set_cursor(&self, cursor: &SyncCursor) -> Result<(), Error>;
}

/// Caches transactions in a SQLite database.
///
/// The tables must have been created with [crate::initialize_db].
#[derive(Debug, Clone)]
pub struct SQLiteTransactionCache {
    connection: Arc<Mutex<Connection>>,
}

impl SQLiteTransactionCache {
    /// Create a new cache for the SQLite `connection`.
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.connection.lock().map_err(|error| {
            tracing::error!("could not acquire database lock: {error}");
            Error::DatabaseLockError
        })
    }
}

impl TransactionCache for SQLiteTransactionCache {
    fn upsert(&self, transaction: &Transaction) -> Result<(), Error> {
        upsert_transaction(transaction, &*self.connection()?)
    }

    fn get(&self, remote_id: &str) -> Result<Transaction, Error> {
        get_transaction(remote_id, &*self.connection()?)
    }

    fn list(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>, Error> {
        list_transactions(filter, &*self.connection()?)
    }

    fn count(&self) -> Result<u32, Error> {
        count_transactions(&*self.connection()?)
    }

    fn oldest(&self) -> Result<Option<Transaction>, Error> {
        get_oldest_transaction(&*self.connection()?)
    }

    fn newest(&self) -> Result<Option<Transaction>, Error> {
        get_newest_transaction(&*self.connection()?)
    }

    fn get_cursor(&self) -> Result<Option<SyncCursor>, Error> {
        get_sync_cursor(&*self.connection()?)
    }

    fn set_cursor(&self, cursor: &SyncCursor) -> Result<(), Error> {
        set_sync_cursor(cursor, &*self.connection()?)
    }
}
