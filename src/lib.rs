//! Ledger Sync mirrors the completed transactions of a remote bank account
//! into a local SQLite cache.
//!
//! Syncs pull only what is new since the stored watermark, never run
//! concurrently, and can be gated behind a cooldown. Reads are served from
//! the cache without contacting the bank.

#![warn(missing_docs)]

pub mod bank;
mod cache;
pub mod config;
mod cursor;
mod db;
mod error;
mod query;
pub mod sync;
#[cfg(test)]
mod test_utils;
mod transaction;

pub use cache::{SQLiteTransactionCache, TransactionCache};
pub use cursor::SyncCursor;
pub use db::initialize as initialize_db;
pub use error::Error;
pub use query::{CacheQueryFacade, CacheStats};
pub use transaction::{Transaction, TransactionFilter, TransactionSide, TransactionStatus};
