//! Pulls completed transactions from the bank into the cache.

use std::{sync::Arc, time::Instant};

use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    Error,
    bank::{BankApiClient, TransactionQuery},
    cache::TransactionCache,
    sync::{
        CursorStrategy, SyncEvent, SyncLock, SyncObserver, TracingObserver,
        policy::{Watermark, exclude_boundary, next_cursor},
    },
    transaction::TransactionStatus,
};

/// Whether a run fetched the whole history or only what is new.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// No watermark was used, every completed transaction was requested.
    Full,
    /// Only transactions settled at or after the stored watermark were
    /// requested.
    Incremental,
}

/// The time range a run asked the bank for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncWindow {
    /// Whether the run was full or incremental.
    pub mode: SyncMode,
    /// The inclusive lower bound sent to the bank, `None` for full runs.
    #[serde(with = "time::serde::rfc3339::option")]
    pub from: Option<OffsetDateTime>,
    /// When the run started. The bank query itself has no upper bound.
    #[serde(with = "time::serde::rfc3339")]
    pub to: OffsetDateTime,
}

/// The outcome of a successful sync run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncResult {
    /// The number of transactions upserted by this run.
    pub synced: usize,
    /// The number of transactions in the cache after this run.
    pub total: u32,
    /// The window the run requested.
    pub window: SyncWindow,
}

/// Runs syncs between a [BankApiClient] and a [TransactionCache].
///
/// At most one run is in flight per [SyncLock]. A run that finds the lock
/// held fails immediately with [Error::SyncBusy] instead of waiting.
pub struct SyncCoordinator {
    bank: Arc<dyn BankApiClient>,
    cache: Arc<dyn TransactionCache>,
    lock: SyncLock,
    observer: Arc<dyn SyncObserver>,
    cursor_strategy: CursorStrategy,
}

impl SyncCoordinator {
    /// Create a coordinator with its own lock, the default cursor strategy and
    /// a [TracingObserver].
    pub fn new(bank: Arc<dyn BankApiClient>, cache: Arc<dyn TransactionCache>) -> Self {
        Self {
            bank,
            cache,
            lock: SyncLock::new(),
            observer: Arc::new(TracingObserver),
            cursor_strategy: CursorStrategy::default(),
        }
    }

    /// Use `lock` instead of a private lock, e.g. to share it with another
    /// coordinator writing to the same cache.
    pub fn with_lock(mut self, lock: SyncLock) -> Self {
        self.lock = lock;
        self
    }

    /// Send sync events to `observer` instead of logging them.
    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Set how the transaction on the watermark boundary is handled.
    pub fn with_cursor_strategy(mut self, cursor_strategy: CursorStrategy) -> Self {
        self.cursor_strategy = cursor_strategy;
        self
    }

    /// The cache this coordinator writes to.
    pub fn cache(&self) -> &Arc<dyn TransactionCache> {
        &self.cache
    }

    /// Whether a run currently holds this coordinator's lock.
    pub fn is_syncing(&self) -> bool {
        self.lock.is_held()
    }

    /// Sync completed transactions from the bank into the cache.
    ///
    /// Without `force`, only transactions settled at or after the stored
    /// watermark are requested. With `force`, or before the first successful
    /// run, the full history is requested. Either way the watermark never
    /// moves backward.
    ///
    /// # Errors
    /// - [Error::SyncBusy] if another run holds the lock. The cache is not
    ///   touched.
    /// - [Error::NoBankAccount] if the organization has no bank account.
    /// - [Error::RemoteUnavailable] if the bank could not be queried.
    /// - [Error::SqlError] or [Error::DatabaseLockError] if the cache could
    ///   not be written.
    ///
    /// On error the cursor is left as it was. Transactions upserted before the
    /// failure stay in the cache, which is safe because upserts are
    /// idempotent and the next run fetches them again.
    pub async fn sync(&self, force: bool) -> Result<SyncResult, Error> {
        let Some(_guard) = self.lock.try_acquire() else {
            self.observer.on_event(&SyncEvent::Busy);
            return Err(Error::SyncBusy);
        };

        let start_time = Instant::now();
        let outcome = self.run(force).await;
        let elapsed = start_time.elapsed();

        match &outcome {
            Ok(result) => self
                .observer
                .on_event(&SyncEvent::Finished { result, elapsed }),
            Err(error) => self.observer.on_event(&SyncEvent::Failed { error, elapsed }),
        }

        outcome
    }

    async fn run(&self, force: bool) -> Result<SyncResult, Error> {
        let started_at = OffsetDateTime::now_utc();
        // Read even when forced so a full run cannot move the watermark back.
        let stored_cursor = self.cache.get_cursor()?;

        let from = if force {
            None
        } else {
            stored_cursor
                .as_ref()
                .and_then(|cursor| cursor.last_synced_at)
        };
        let window = SyncWindow {
            mode: match from {
                Some(_) => SyncMode::Incremental,
                None => SyncMode::Full,
            },
            from,
            to: started_at,
        };
        self.observer.on_event(&SyncEvent::Started {
            force,
            window: &window,
        });

        let bank_account = self
            .bank
            .list_organization_accounts()
            .await?
            .into_iter()
            .next()
            .ok_or(Error::NoBankAccount)?;

        let query = TransactionQuery {
            bank_account_id: bank_account.id,
            status: TransactionStatus::Completed,
            settled_from: window.from,
        };
        let fetched = self.bank.list_transactions(&query).await?;
        let fetched_count = fetched.len();

        let (transactions, skipped) = match window.mode {
            SyncMode::Incremental => {
                exclude_boundary(fetched, stored_cursor.as_ref(), self.cursor_strategy)
            }
            SyncMode::Full => (fetched, 0),
        };
        self.observer.on_event(&SyncEvent::Fetched {
            fetched: fetched_count,
            skipped,
        });

        let mut watermark = None;
        for transaction in &transactions {
            self.cache.upsert(transaction)?;
            watermark = Watermark::observe(watermark, transaction);
        }

        let cursor = next_cursor(
            stored_cursor.as_ref(),
            watermark,
            self.cursor_strategy,
            OffsetDateTime::now_utc(),
        );
        self.cache.set_cursor(&cursor)?;

        Ok(SyncResult {
            synced: transactions.len(),
            total: self.cache.count()?,
            window,
        })
    }
}
