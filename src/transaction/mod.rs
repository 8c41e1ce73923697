//! Cached bank transactions.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and its status and side enums
//! - Database functions for upserting, querying, and counting transactions

mod core;
mod query;

pub use core::{
    Transaction, TransactionSide, TransactionStatus, count_transactions, create_transaction_table,
    get_newest_transaction, get_oldest_transaction, get_transaction, upsert_transaction,
};
pub use query::{TransactionFilter, list_transactions};

pub(crate) use core::to_utc;
