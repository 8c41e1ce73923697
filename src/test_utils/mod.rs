#![allow(missing_docs)]

pub(crate) mod bank;
pub(crate) mod cache;

use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use serde_json::json;
use time::OffsetDateTime;

use crate::{
    cache::SQLiteTransactionCache,
    db::initialize,
    transaction::{Transaction, TransactionSide, TransactionStatus},
};

pub(crate) use bank::FakeBank;
pub(crate) use cache::FailingUpsertCache;

/// An initialised cache backed by an in-memory database.
pub(crate) fn get_test_cache() -> Arc<SQLiteTransactionCache> {
    let conn = Connection::open_in_memory().unwrap();
    initialize(&conn).unwrap();

    Arc::new(SQLiteTransactionCache::new(Arc::new(Mutex::new(conn))))
}

/// A completed debit on "acc-1" that settled at `settled_at`.
pub(crate) fn completed_transaction(remote_id: &str, settled_at: OffsetDateTime) -> Transaction {
    Transaction {
        remote_id: remote_id.to_owned(),
        bank_account_id: "acc-1".to_owned(),
        amount: 12.5,
        currency: "EUR".to_owned(),
        side: TransactionSide::Debit,
        label: format!("Payment {remote_id}"),
        status: TransactionStatus::Completed,
        emitted_at: settled_at,
        settled_at: Some(settled_at),
        payload: json!({ "transaction_id": remote_id }),
    }
}
