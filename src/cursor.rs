//! The durable record of how far the cache has been synced.
//!
//! There is only ever one cursor, stored as the single row of the
//! `sync_cursor` table.

use rusqlite::Connection;
use serde::Serialize;
use time::OffsetDateTime;

use crate::{Error, transaction::to_utc};

/// Tracks sync progress across restarts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncCursor {
    /// The watermark: every remote transaction that occurred before this
    /// instant is known to be cached.
    ///
    /// `None` after a first sync that found no transactions.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_synced_at: Option<OffsetDateTime>,
    /// The remote ID of the transaction on the watermark, only tracked when
    /// the boundary transaction is excluded from the next fetch.
    pub last_synced_id: Option<String>,
    /// When the last successful sync finished.
    #[serde(with = "time::serde::rfc3339")]
    pub last_run_at: OffsetDateTime,
}

/// Create the sync_cursor table in the database.
///
/// The `CHECK` constraint keeps the table to a single row.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_sync_cursor_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS sync_cursor (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            last_synced_at TEXT,
            last_synced_id TEXT,
            last_run_at TEXT NOT NULL
        )",
        (),
    )?;

    Ok(())
}

/// Get the sync cursor, or `None` if no sync has completed yet.
///
/// # Errors
/// Returns [Error::SqlError] if the query fails.
pub fn get_sync_cursor(connection: &Connection) -> Result<Option<SyncCursor>, Error> {
    let maybe_cursor = connection
        .prepare("SELECT last_synced_at, last_synced_id, last_run_at FROM sync_cursor WHERE id = 1")?
        .query_one([], |row| {
            Ok(SyncCursor {
                last_synced_at: row.get(0)?,
                last_synced_id: row.get(1)?,
                last_run_at: row.get(2)?,
            })
        });

    match maybe_cursor {
        Ok(cursor) => Ok(Some(cursor)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(error) => Err(error.into()),
    }
}

/// Replace the stored sync cursor with `cursor`.
///
/// The last write wins. Keeping the watermark monotonic is up to the sync
/// coordinator, the only writer.
///
/// # Errors
/// Returns [Error::SqlError] if the write fails.
pub fn set_sync_cursor(cursor: &SyncCursor, connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "INSERT INTO sync_cursor (id, last_synced_at, last_synced_id, last_run_at)
         VALUES (1, ?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET
             last_synced_at = excluded.last_synced_at,
             last_synced_id = excluded.last_synced_id,
             last_run_at = excluded.last_run_at",
        (
            cursor.last_synced_at.map(to_utc),
            &cursor.last_synced_id,
            to_utc(cursor.last_run_at),
        ),
    )?;

    Ok(())
}
