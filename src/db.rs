//! Initialises the SQLite database that backs the transaction cache.

use rusqlite::Connection;

use crate::{Error, cursor::create_sync_cursor_table, transaction::create_transaction_table};

/// Create the cache tables if they do not exist yet.
///
/// The tables are created inside a single exclusive transaction so that a
/// half-initialised database is never left behind.
///
/// # Errors
/// Returns [Error::SqlError] if a table cannot be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    let transaction = connection.unchecked_transaction()?;

    create_transaction_table(&transaction)?;
    create_sync_cursor_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}
