//! The read path over the transaction cache.

use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    Error,
    sync::SyncCoordinator,
    transaction::{Transaction, TransactionFilter},
};

/// A summary of the cache contents and sync progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    /// The number of cached transactions.
    pub total_cached: u32,
    /// The stored watermark, `None` before any transaction was synced.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_sync_watermark: Option<OffsetDateTime>,
    /// When the last successful sync finished, `None` before the first one.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_run_at: Option<OffsetDateTime>,
    /// The cached transaction that occurred first.
    pub oldest_transaction: Option<Transaction>,
    /// The cached transaction that occurred last.
    pub newest_transaction: Option<Transaction>,
}

/// Serves reads from the cache without contacting the bank, except for
/// [CacheQueryFacade::refresh].
pub struct CacheQueryFacade {
    coordinator: Arc<SyncCoordinator>,
}

impl CacheQueryFacade {
    /// Create a facade reading from the cache of `coordinator`.
    pub fn new(coordinator: Arc<SyncCoordinator>) -> Self {
        Self { coordinator }
    }

    /// List the cached transactions matching every field set in `filter`,
    /// most recent first.
    ///
    /// # Errors
    /// Returns an error if the cache cannot be read.
    pub fn list_cached(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>, Error> {
        self.coordinator.cache().list(filter)
    }

    /// Get a cached transaction by its remote ID.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if the transaction is not cached.
    pub fn get_cached(&self, remote_id: &str) -> Result<Transaction, Error> {
        self.coordinator.cache().get(remote_id)
    }

    /// Summarise the cache without contacting the bank.
    ///
    /// # Errors
    /// Returns an error if the cache cannot be read.
    pub fn stats(&self) -> Result<CacheStats, Error> {
        let cache = self.coordinator.cache();
        let cursor = cache.get_cursor()?;

        Ok(CacheStats {
            total_cached: cache.count()?,
            last_sync_watermark: cursor.as_ref().and_then(|cursor| cursor.last_synced_at),
            last_run_at: cursor.map(|cursor| cursor.last_run_at),
            oldest_transaction: cache.oldest()?,
            newest_transaction: cache.newest()?,
        })
    }

    /// Run an incremental sync, then read `remote_id` from the cache.
    ///
    /// # Errors
    /// Returns the sync error if the sync fails, including [Error::SyncBusy],
    /// or [Error::NotFound] if the transaction is still not cached.
    pub async fn refresh(&self, remote_id: &str) -> Result<Transaction, Error> {
        self.coordinator.sync(false).await?;
        self.get_cached(remote_id)
    }
}
