//! Defines the cached transaction model and its database queries.

use std::fmt::Display;

use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Type, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset};

use crate::Error;

// ============================================================================
// MODELS
// ============================================================================

/// The processing state of a transaction at the bank.
///
/// Only [TransactionStatus::Completed] transactions are fetched by the sync
/// engine, the other states exist so that stored rows and remote payloads
/// can be represented faithfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// The transaction has been emitted but not settled yet.
    Pending,
    /// The transaction has settled.
    Completed,
    /// The bank refused the transaction.
    Declined,
    /// The transaction was cancelled after being emitted.
    Reversed,
}

impl TransactionStatus {
    /// The lowercase name used by the bank API and the cache.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Declined => "declined",
            TransactionStatus::Reversed => "reversed",
        }
    }

    /// Parse the lowercase name used by the bank API and the cache.
    ///
    /// # Errors
    /// Returns [Error::InvalidStatus] if `text` is not a known status.
    pub fn parse(text: &str) -> Result<Self, Error> {
        match text {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "declined" => Ok(TransactionStatus::Declined),
            "reversed" => Ok(TransactionStatus::Reversed),
            other => Err(Error::InvalidStatus(other.to_owned())),
        }
    }
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for TransactionStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        TransactionStatus::parse(value.as_str()?)
            .map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

/// Whether money entered or left the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionSide {
    /// Money was received.
    Credit,
    /// Money was spent.
    Debit,
}

impl TransactionSide {
    /// The lowercase name used by the bank API and the cache.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionSide::Credit => "credit",
            TransactionSide::Debit => "debit",
        }
    }

    /// Parse the lowercase name used by the bank API and the cache.
    ///
    /// # Errors
    /// Returns [Error::InvalidSide] if `text` is not a known side.
    pub fn parse(text: &str) -> Result<Self, Error> {
        match text {
            "credit" => Ok(TransactionSide::Credit),
            "debit" => Ok(TransactionSide::Debit),
            other => Err(Error::InvalidSide(other.to_owned())),
        }
    }
}

impl Display for TransactionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for TransactionSide {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionSide {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        TransactionSide::parse(value.as_str()?)
            .map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

/// One entry of the remote bank's ledger, as cached locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The bank's identifier for the transaction, stable across fetches.
    pub remote_id: String,
    /// The bank account the transaction belongs to.
    pub bank_account_id: String,
    /// The absolute amount of money that moved, see `side` for the direction.
    pub amount: f64,
    /// The ISO 4217 currency code of `amount`, e.g. "EUR".
    pub currency: String,
    /// Whether money entered or left the account.
    pub side: TransactionSide,
    /// A human-readable description from the bank.
    pub label: String,
    /// The processing state at the bank.
    pub status: TransactionStatus,
    /// When the transaction was emitted.
    #[serde(with = "time::serde::rfc3339")]
    pub emitted_at: OffsetDateTime,
    /// When the transaction settled, if it has.
    #[serde(with = "time::serde::rfc3339::option")]
    pub settled_at: Option<OffsetDateTime>,
    /// The remote object exactly as the bank sent it.
    pub payload: serde_json::Value,
}

impl Transaction {
    /// The instant used to order transactions: `settled_at`, falling back to
    /// `emitted_at` for transactions that have not settled.
    pub fn occurred_at(&self) -> OffsetDateTime {
        self.settled_at.unwrap_or(self.emitted_at)
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// The columns selected by every transaction query, in the order expected by
/// [map_transaction_row].
pub(crate) const TRANSACTION_COLUMNS: &str = "remote_id, bank_account_id, amount, currency, side, \
    label, status, emitted_at, settled_at, payload";

/// Insert `transaction`, or replace the stored row with the same remote ID.
///
/// Applying the same transaction any number of times leaves exactly one row
/// holding the values of the latest write.
///
/// # Errors
/// This function will return a:
/// - [Error::JSONSerializationError] if the payload cannot be serialized,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn upsert_transaction(transaction: &Transaction, connection: &Connection) -> Result<(), Error> {
    let payload = serde_json::to_string(&transaction.payload)
        .map_err(|error| Error::JSONSerializationError(error.to_string()))?;
    let settled_at = transaction.settled_at.map(to_utc);

    connection.execute(
        "INSERT INTO \"transaction\" (remote_id, bank_account_id, amount, currency, side, label, \
            status, emitted_at, settled_at, occurred_at, payload)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(remote_id) DO UPDATE SET
             bank_account_id = excluded.bank_account_id,
             amount = excluded.amount,
             currency = excluded.currency,
             side = excluded.side,
             label = excluded.label,
             status = excluded.status,
             emitted_at = excluded.emitted_at,
             settled_at = excluded.settled_at,
             occurred_at = excluded.occurred_at,
             payload = excluded.payload",
        (
            &transaction.remote_id,
            &transaction.bank_account_id,
            transaction.amount,
            &transaction.currency,
            transaction.side,
            &transaction.label,
            transaction.status,
            to_utc(transaction.emitted_at),
            settled_at,
            to_utc(transaction.occurred_at()),
            payload,
        ),
    )?;

    Ok(())
}

/// Retrieve a transaction from the database by its `remote_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `remote_id` does not refer to a cached transaction,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(remote_id: &str, connection: &Connection) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE remote_id = :remote_id"
        ))?
        .query_one(&[(":remote_id", remote_id)], map_transaction_row)?;

    Ok(transaction)
}

/// Get the total number of transactions in the database.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn count_transactions(connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row("SELECT COUNT(remote_id) FROM \"transaction\";", [], |row| {
            row.get(0)
        })
        .map_err(|error| error.into())
}

/// Get the transaction that occurred first, or `None` if the cache is empty.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn get_oldest_transaction(connection: &Connection) -> Result<Option<Transaction>, Error> {
    get_first_by_occurred_at("ASC", connection)
}

/// Get the transaction that occurred last, or `None` if the cache is empty.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn get_newest_transaction(connection: &Connection) -> Result<Option<Transaction>, Error> {
    get_first_by_occurred_at("DESC", connection)
}

fn get_first_by_occurred_at(
    direction: &str,
    connection: &Connection,
) -> Result<Option<Transaction>, Error> {
    let query = format!(
        "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" \
        ORDER BY occurred_at {direction}, remote_id {direction} LIMIT 1"
    );

    match connection.prepare(&query)?.query_one([], map_transaction_row) {
        Ok(transaction) => Ok(Some(transaction)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(error) => Err(error.into()),
    }
}

/// Create the transaction table in the database.
///
/// `occurred_at` duplicates `COALESCE(settled_at, emitted_at)` so that it can
/// be indexed for the date range filters and ordering.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                remote_id TEXT PRIMARY KEY NOT NULL,
                bank_account_id TEXT NOT NULL,
                amount REAL NOT NULL,
                currency TEXT NOT NULL,
                side TEXT NOT NULL,
                label TEXT NOT NULL,
                status TEXT NOT NULL,
                emitted_at TEXT NOT NULL,
                settled_at TEXT,
                occurred_at TEXT NOT NULL,
                payload TEXT NOT NULL
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_occurred_at ON \"transaction\"(occurred_at);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let remote_id = row.get(0)?;
    let bank_account_id = row.get(1)?;
    let amount = row.get(2)?;
    let currency = row.get(3)?;
    let side = row.get(4)?;
    let label = row.get(5)?;
    let status = row.get(6)?;
    let emitted_at = row.get(7)?;
    let settled_at = row.get(8)?;
    let payload: String = row.get(9)?;
    let payload = serde_json::from_str(&payload).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(error))
    })?;

    Ok(Transaction {
        remote_id,
        bank_account_id,
        amount,
        currency,
        side,
        label,
        status,
        emitted_at,
        settled_at,
        payload,
    })
}

/// Normalise `instant` to UTC so that the text stored by SQLite sorts in
/// chronological order.
pub(crate) fn to_utc(instant: OffsetDateTime) -> OffsetDateTime {
    instant.to_offset(UtcOffset::UTC)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod database_tests {
    use rusqlite::Connection;
    use serde_json::json;
    use time::macros::datetime;

    use crate::{
        Error,
        db::initialize,
        transaction::{
            Transaction, TransactionSide, TransactionStatus, count_transactions,
            get_newest_transaction, get_oldest_transaction, get_transaction, upsert_transaction,
        },
    };

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    fn test_transaction(remote_id: &str, amount: f64) -> Transaction {
        Transaction {
            remote_id: remote_id.to_owned(),
            bank_account_id: "acc-1".to_owned(),
            amount,
            currency: "EUR".to_owned(),
            side: TransactionSide::Debit,
            label: format!("transaction {remote_id}"),
            status: TransactionStatus::Completed,
            emitted_at: datetime!(2025-10-01 09:00 UTC),
            settled_at: Some(datetime!(2025-10-02 09:00 UTC)),
            payload: json!({"transaction_id": remote_id, "note": "hello"}),
        }
    }

    #[test]
    fn upsert_then_get_round_trips() {
        let conn = get_test_connection();
        let want = test_transaction("tx-1", 12.3);

        upsert_transaction(&want, &conn).expect("Could not upsert transaction");
        let got = get_transaction("tx-1", &conn).expect("Could not get transaction");

        assert_eq!(want, got);
    }

    #[test]
    fn upsert_twice_keeps_one_row_with_latest_values() {
        let conn = get_test_connection();
        let first = test_transaction("tx-1", 12.3);
        let mut second = test_transaction("tx-1", 45.6);
        second.label = "updated".to_owned();

        upsert_transaction(&first, &conn).expect("Could not upsert transaction");
        upsert_transaction(&second, &conn).expect("Could not upsert transaction");

        assert_eq!(count_transactions(&conn), Ok(1));
        assert_eq!(get_transaction("tx-1", &conn), Ok(second));
    }

    #[test]
    fn upsert_normalises_offsets_to_utc() {
        let conn = get_test_connection();
        let mut want = test_transaction("tx-1", 1.0);
        want.settled_at = Some(datetime!(2025-10-02 11:00 +02:00));

        upsert_transaction(&want, &conn).expect("Could not upsert transaction");
        let got = get_transaction("tx-1", &conn).expect("Could not get transaction");

        assert_eq!(got.settled_at, Some(datetime!(2025-10-02 09:00 UTC)));
    }

    #[test]
    fn get_missing_transaction_returns_not_found() {
        let conn = get_test_connection();

        assert_eq!(get_transaction("nope", &conn), Err(Error::NotFound));
    }

    #[test]
    fn get_count() {
        let conn = get_test_connection();
        let want_count = 20;
        for i in 1..=want_count {
            upsert_transaction(&test_transaction(&format!("tx-{i}"), i as f64), &conn)
                .expect("Could not upsert transaction");
        }

        let got_count = count_transactions(&conn).expect("Could not get count");

        assert_eq!(want_count, got_count);
    }

    #[test]
    fn oldest_and_newest_fall_back_to_emitted_at() {
        let conn = get_test_connection();
        let mut settled = test_transaction("settled", 1.0);
        settled.settled_at = Some(datetime!(2025-10-05 09:00 UTC));
        let mut unsettled = test_transaction("unsettled", 2.0);
        unsettled.settled_at = None;
        unsettled.emitted_at = datetime!(2025-10-07 09:00 UTC);
        let mut early = test_transaction("early", 3.0);
        early.settled_at = Some(datetime!(2025-09-01 09:00 UTC));
        for transaction in [&settled, &unsettled, &early] {
            upsert_transaction(transaction, &conn).expect("Could not upsert transaction");
        }

        assert_eq!(get_oldest_transaction(&conn), Ok(Some(early)));
        assert_eq!(get_newest_transaction(&conn), Ok(Some(unsettled)));
    }

    #[test]
    fn oldest_and_newest_are_none_for_empty_cache() {
        let conn = get_test_connection();

        assert_eq!(get_oldest_transaction(&conn), Ok(None));
        assert_eq!(get_newest_transaction(&conn), Ok(None));
    }

    #[test]
    fn unknown_status_is_rejected() {
        let conn = get_test_connection();
        upsert_transaction(&test_transaction("tx-1", 1.0), &conn).unwrap();
        conn.execute(
            "UPDATE \"transaction\" SET status = 'exploded' WHERE remote_id = 'tx-1'",
            (),
        )
        .unwrap();

        let got = get_transaction("tx-1", &conn);

        assert!(
            matches!(got, Err(Error::SqlError(_))),
            "want SQL conversion error, got {got:?}"
        );
    }
}
