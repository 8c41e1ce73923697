//! Progress events emitted by the sync coordinator.

use std::time::Duration;

use crate::{
    Error,
    sync::{SyncMode, SyncResult, SyncWindow},
};

/// Something that happened during a sync run.
#[derive(Debug)]
pub enum SyncEvent<'a> {
    /// A run took the lock and is about to query the bank.
    Started {
        /// Whether the run ignores the stored cursor.
        force: bool,
        /// The window the run will request.
        window: &'a SyncWindow,
    },
    /// The bank returned the transactions for the window.
    Fetched {
        /// The number of transactions the bank returned.
        fetched: usize,
        /// The number of boundary transactions dropped before upserting.
        skipped: usize,
    },
    /// The run upserted everything and advanced the cursor.
    Finished {
        /// The outcome returned to the caller.
        result: &'a SyncResult,
        /// How long the run took.
        elapsed: Duration,
    },
    /// The run stopped with an error, the cursor was not advanced.
    Failed {
        /// Why the run stopped.
        error: &'a Error,
        /// How long the run took before failing.
        elapsed: Duration,
    },
    /// The run was rejected because another run holds the lock.
    Busy,
}

/// Receives [SyncEvent]s from the coordinator.
///
/// Observers are called inline, so they should return quickly.
pub trait SyncObserver: Send + Sync {
    /// Handle one event.
    fn on_event(&self, event: &SyncEvent<'_>);
}

/// Logs sync events with `tracing`.
///
/// Busy rejections are expected when manual and scheduled syncs overlap, so
/// they are logged at the debug level, never as errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl SyncObserver for TracingObserver {
    fn on_event(&self, event: &SyncEvent<'_>) {
        match event {
            SyncEvent::Started { force, window } => match window.mode {
                SyncMode::Full => tracing::info!(force, "Starting full sync"),
                SyncMode::Incremental => tracing::info!(
                    force,
                    from = ?window.from,
                    "Starting incremental sync"
                ),
            },
            SyncEvent::Fetched { fetched, skipped } => {
                tracing::debug!(fetched, skipped, "Fetched transactions from the bank")
            }
            SyncEvent::Finished { result, elapsed } => tracing::info!(
                synced = result.synced,
                total = result.total,
                "Sync completed in {}ms",
                elapsed.as_millis()
            ),
            SyncEvent::Failed { error, elapsed } => match error {
                Error::NoBankAccount | Error::RemoteUnavailable(_) => tracing::warn!(
                    "Sync failed after {}ms: {error}",
                    elapsed.as_millis()
                ),
                error => tracing::error!("Sync failed after {}ms: {error}", elapsed.as_millis()),
            },
            SyncEvent::Busy => tracing::debug!("Sync rejected, another sync is in progress"),
        }
    }
}
