//! Decides whether an automatic sync is due.

use std::{sync::Arc, time::Duration};

use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    Error,
    config::DEFAULT_SYNC_COOLDOWN,
    sync::{SyncCoordinator, SyncResult},
};

/// What [SyncScheduler::auto_sync] did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutoSyncOutcome {
    /// Whether a sync ran.
    pub synced: bool,
    /// The result of the sync, if one ran.
    pub result: Option<SyncResult>,
}

/// Gates automatic syncs behind a cooldown.
///
/// The check runs against the wall clock whenever [SyncScheduler::auto_sync]
/// is called, there is no background timer.
pub struct SyncScheduler {
    coordinator: Arc<SyncCoordinator>,
    cooldown: Duration,
}

impl SyncScheduler {
    /// Create a scheduler with the default one hour cooldown.
    pub fn new(coordinator: Arc<SyncCoordinator>) -> Self {
        Self {
            coordinator,
            cooldown: DEFAULT_SYNC_COOLDOWN,
        }
    }

    /// Set the minimum time between the end of one successful sync and the
    /// next automatic sync.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Whether the cooldown has passed since the last successful sync.
    ///
    /// Always true before the first successful sync.
    ///
    /// # Errors
    /// Returns an error if the cursor cannot be read from the cache.
    pub fn needs_sync(&self) -> Result<bool, Error> {
        self.needs_sync_at(OffsetDateTime::now_utc())
    }

    fn needs_sync_at(&self, now: OffsetDateTime) -> Result<bool, Error> {
        let Some(cursor) = self.coordinator.cache().get_cursor()? else {
            return Ok(true);
        };

        // A last run in the future (clock change) counts as zero elapsed time.
        let elapsed = now - cursor.last_run_at;
        Ok(elapsed >= self.cooldown)
    }

    /// Run a non-forced sync if one is due.
    ///
    /// When no sync is due the bank is not contacted and the lock is not
    /// touched.
    ///
    /// # Errors
    /// Returns the error of the sync if one ran and failed, including
    /// [Error::SyncBusy] when a manual sync is already in flight.
    pub async fn auto_sync(&self) -> Result<AutoSyncOutcome, Error> {
        if !self.needs_sync()? {
            tracing::debug!("Skipping automatic sync, cooldown has not passed");
            return Ok(AutoSyncOutcome {
                synced: false,
                result: None,
            });
        }

        let result = self.coordinator.sync(false).await?;

        Ok(AutoSyncOutcome {
            synced: true,
            result: Some(result),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use time::{OffsetDateTime, macros::datetime};

    use crate::{
        Error,
        cache::TransactionCache,
        cursor::SyncCursor,
        sync::{SyncCoordinator, SyncLock},
        test_utils::{FakeBank, completed_transaction, get_test_cache},
    };

    use super::SyncScheduler;

    fn get_scheduler(last_run_at: Option<OffsetDateTime>) -> (SyncScheduler, Arc<FakeBank>) {
        let cache = get_test_cache();
        if let Some(last_run_at) = last_run_at {
            cache
                .set_cursor(&SyncCursor {
                    last_synced_at: Some(datetime!(2025-10-01 09:00 UTC)),
                    last_synced_id: None,
                    last_run_at,
                })
                .unwrap();
        }
        let transaction = completed_transaction("A", datetime!(2025-10-02 09:00 UTC));
        let bank = Arc::new(
            FakeBank::with_accounts(&["acc-1"]).then_respond(Ok(vec![transaction])),
        );
        let coordinator = SyncCoordinator::new(bank.clone(), cache);

        (SyncScheduler::new(Arc::new(coordinator)), bank)
    }

    #[test]
    fn needs_sync_before_first_sync() {
        let (scheduler, _bank) = get_scheduler(None);

        assert_eq!(scheduler.needs_sync(), Ok(true));
    }

    #[test]
    fn needs_sync_respects_cooldown_boundary() {
        let last_run_at = datetime!(2025-10-10 12:00 UTC);
        let (scheduler, _bank) = get_scheduler(Some(last_run_at));

        assert_eq!(
            scheduler.needs_sync_at(last_run_at + Duration::from_secs(59 * 60)),
            Ok(false)
        );
        assert_eq!(
            scheduler.needs_sync_at(last_run_at + Duration::from_secs(60 * 60)),
            Ok(true)
        );
    }

    #[test]
    fn last_run_in_the_future_does_not_need_sync() {
        let last_run_at = datetime!(2025-10-10 12:00 UTC);
        let (scheduler, _bank) = get_scheduler(Some(last_run_at));

        assert_eq!(
            scheduler.needs_sync_at(last_run_at - Duration::from_secs(60)),
            Ok(false)
        );
    }

    #[test]
    fn custom_cooldown_is_used() {
        let last_run_at = datetime!(2025-10-10 12:00 UTC);
        let (scheduler, _bank) = get_scheduler(Some(last_run_at));
        let scheduler = scheduler.with_cooldown(Duration::from_secs(60));

        assert_eq!(
            scheduler.needs_sync_at(last_run_at + Duration::from_secs(61)),
            Ok(true)
        );
    }

    #[tokio::test]
    async fn auto_sync_within_cooldown_makes_no_remote_calls() {
        let thirty_minutes_ago = OffsetDateTime::now_utc() - Duration::from_secs(30 * 60);
        let (scheduler, bank) = get_scheduler(Some(thirty_minutes_ago));

        let outcome = scheduler.auto_sync().await.unwrap();

        assert!(!outcome.synced);
        assert_eq!(outcome.result, None);
        assert_eq!(bank.call_count(), 0);
    }

    #[tokio::test]
    async fn auto_sync_after_cooldown_runs_incremental_sync() {
        let two_hours_ago = OffsetDateTime::now_utc() - Duration::from_secs(2 * 60 * 60);
        let (scheduler, bank) = get_scheduler(Some(two_hours_ago));

        let outcome = scheduler.auto_sync().await.unwrap();

        assert!(outcome.synced);
        assert_eq!(outcome.result.map(|result| result.synced), Some(1));
        assert_eq!(
            bank.queries()[0].settled_from,
            Some(datetime!(2025-10-01 09:00 UTC))
        );
        assert_eq!(scheduler.needs_sync(), Ok(false));
    }

    #[tokio::test]
    async fn auto_sync_before_first_sync_runs_full_sync() {
        let (scheduler, bank) = get_scheduler(None);

        let outcome = scheduler.auto_sync().await.unwrap();

        assert!(outcome.synced);
        assert_eq!(bank.queries()[0].settled_from, None);
    }

    #[tokio::test]
    async fn auto_sync_reports_busy_when_manual_sync_holds_lock() {
        let lock = SyncLock::new();
        let cache = get_test_cache();
        let bank = Arc::new(FakeBank::with_accounts(&["acc-1"]));
        let coordinator = SyncCoordinator::new(bank.clone(), cache).with_lock(lock.clone());
        let scheduler = SyncScheduler::new(Arc::new(coordinator));
        let _guard = lock.try_acquire().unwrap();

        let outcome = scheduler.auto_sync().await;

        assert_eq!(outcome, Err(Error::SyncBusy));
        assert_eq!(bank.call_count(), 0);
    }
}
