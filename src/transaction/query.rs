//! Filtered listing of cached transactions.

use rusqlite::{Connection, ToSql, params_from_iter};
use time::OffsetDateTime;

use crate::Error;

use super::core::{
    TRANSACTION_COLUMNS, Transaction, TransactionSide, TransactionStatus, map_transaction_row,
    to_utc,
};

/// Defines which cached transactions [list_transactions] returns.
///
/// Every field that is set narrows the result, i.e. the filters form a
/// conjunction. The default filter matches every transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    /// Only include transactions that occurred at or after this instant.
    pub from: Option<OffsetDateTime>,
    /// Only include transactions that occurred at or before this instant.
    pub to: Option<OffsetDateTime>,
    /// Only include transactions with this status.
    pub status: Option<TransactionStatus>,
    /// Only include credits or debits.
    pub side: Option<TransactionSide>,
    /// Only include transactions in this currency.
    pub currency: Option<String>,
    /// Only include transactions of this bank account.
    pub bank_account_id: Option<String>,
    /// Only include transactions whose label contains this text, ignoring
    /// ASCII case.
    pub label_contains: Option<String>,
    /// Return at most this many transactions.
    pub limit: Option<u64>,
    /// Skip this many transactions.
    pub offset: u64,
}

/// Get the cached transactions that match `filter`, most recent first.
///
/// Transactions are ordered by `settled_at`, falling back to `emitted_at`,
/// and then by remote ID to keep the order stable.
///
/// # Errors
/// Returns [Error::SqlError] if:
/// - SQL query preparation or execution fails
/// - Transaction row mapping fails
pub fn list_transactions(
    filter: &TransactionFilter,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let mut query_string_parts = vec![format!(
        "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\""
    )];
    let mut where_clause_parts = vec![];
    let mut query_parameters: Vec<Box<dyn ToSql>> = vec![];

    // Each condition has a single `?` placeholder for its parameter.
    let mut push_condition = |condition: &str, parameter: Box<dyn ToSql>| {
        query_parameters.push(parameter);
        where_clause_parts.push(condition.replace('?', &format!("?{}", query_parameters.len())));
    };

    if let Some(from) = filter.from {
        push_condition("occurred_at >= ?", Box::new(to_utc(from)));
    }

    if let Some(to) = filter.to {
        push_condition("occurred_at <= ?", Box::new(to_utc(to)));
    }

    if let Some(status) = filter.status {
        push_condition("status = ?", Box::new(status));
    }

    if let Some(side) = filter.side {
        push_condition("side = ?", Box::new(side));
    }

    if let Some(currency) = &filter.currency {
        push_condition("currency = ?", Box::new(currency.clone()));
    }

    if let Some(bank_account_id) = &filter.bank_account_id {
        push_condition("bank_account_id = ?", Box::new(bank_account_id.clone()));
    }

    if let Some(label) = &filter.label_contains {
        push_condition("instr(lower(label), lower(?)) > 0", Box::new(label.clone()));
    }

    if !where_clause_parts.is_empty() {
        query_string_parts.push(String::from("WHERE ") + &where_clause_parts.join(" AND "));
    }

    query_string_parts.push("ORDER BY occurred_at DESC, remote_id ASC".to_owned());

    // SQLite only accepts OFFSET after LIMIT, and a negative LIMIT means no limit.
    match (filter.limit, filter.offset) {
        (Some(limit), offset) => {
            query_string_parts.push(format!("LIMIT {limit} OFFSET {offset}"));
        }
        (None, 0) => {}
        (None, offset) => query_string_parts.push(format!("LIMIT -1 OFFSET {offset}")),
    }

    let query_string = query_string_parts.join(" ");
    let params = params_from_iter(query_parameters.iter());

    connection
        .prepare(&query_string)?
        .query_map(params, map_transaction_row)?
        .map(|transaction_result| transaction_result.map_err(Error::from))
        .collect()
}
