//! How the cursor moves and how the watermark boundary is treated.

use time::OffsetDateTime;

use crate::{cursor::SyncCursor, transaction::Transaction};

/// How a run treats the transaction sitting exactly on the watermark.
///
/// The bank's `settled_at_from` filter is inclusive, so an incremental run
/// always gets the last transaction of the previous run again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CursorStrategy {
    /// Upsert the boundary transaction again. Upserts are idempotent, so this
    /// only costs a redundant write and picks up any remote change to it.
    #[default]
    Watermark,
    /// Remember the remote ID of the boundary transaction and drop it from
    /// the next incremental fetch.
    BoundaryId,
}

/// The latest transaction seen by a run.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Watermark {
    pub(crate) at: OffsetDateTime,
    pub(crate) remote_id: String,
}

impl Watermark {
    /// Move the watermark forward to `transaction` if it occurred later.
    pub(crate) fn observe(current: Option<Watermark>, transaction: &Transaction) -> Option<Self> {
        let at = transaction.occurred_at();

        match current {
            Some(current) if current.at >= at => Some(current),
            _ => Some(Watermark {
                at,
                remote_id: transaction.remote_id.clone(),
            }),
        }
    }
}

/// Remove the boundary transaction of the previous run from `fetched`.
///
/// Only [CursorStrategy::BoundaryId] drops anything, and only when the cursor
/// recorded a boundary ID. Returns the transactions to upsert and the number
/// dropped.
pub(crate) fn exclude_boundary(
    fetched: Vec<Transaction>,
    cursor: Option<&SyncCursor>,
    strategy: CursorStrategy,
) -> (Vec<Transaction>, usize) {
    let boundary_id = match (strategy, cursor) {
        (CursorStrategy::BoundaryId, Some(SyncCursor {
            last_synced_id: Some(id),
            ..
        })) => id,
        _ => return (fetched, 0),
    };

    let fetched_count = fetched.len();
    let kept: Vec<Transaction> = fetched
        .into_iter()
        .filter(|transaction| &transaction.remote_id != boundary_id)
        .collect();
    let skipped = fetched_count - kept.len();

    (kept, skipped)
}

/// Compute the cursor to store after a successful run.
///
/// The watermark never moves backward: if the run saw nothing, or only
/// transactions older than the stored watermark (clock skew, late delivery),
/// the stored watermark is kept. `last_run_at` always becomes `finished_at`
/// so the cooldown restarts after every successful run.
pub(crate) fn next_cursor(
    stored: Option<&SyncCursor>,
    observed: Option<Watermark>,
    strategy: CursorStrategy,
    finished_at: OffsetDateTime,
) -> SyncCursor {
    let stored_watermark = stored.and_then(|cursor| {
        cursor
            .last_synced_at
            .map(|at| (at, cursor.last_synced_id.clone()))
    });

    let (last_synced_at, last_synced_id) = match (stored_watermark, observed) {
        (Some((stored_at, stored_id)), Some(observed)) if stored_at > observed.at => {
            (Some(stored_at), stored_id)
        }
        (_, Some(observed)) => (Some(observed.at), Some(observed.remote_id)),
        (Some((stored_at, stored_id)), None) => (Some(stored_at), stored_id),
        (None, None) => (None, None),
    };

    let last_synced_id = match strategy {
        CursorStrategy::Watermark => None,
        CursorStrategy::BoundaryId => last_synced_id,
    };

    SyncCursor {
        last_synced_at,
        last_synced_id,
        last_run_at: finished_at,
    }
}
