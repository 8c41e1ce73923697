//! The interface to the remote bank whose ledger is mirrored into the cache.
//!
//! The sync engine only needs two read operations from the bank: listing the
//! organization's bank accounts and listing the transactions that match a
//! [TransactionQuery]. [BankApiClient] captures exactly that, so the engine
//! can be driven by [HttpBankClient] in production and by a scripted fake in
//! tests.

mod http;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::transaction::{Transaction, TransactionStatus};

pub use http::HttpBankClient;

/// A bank account belonging to the remote organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankAccount {
    /// The remote identifier of the account.
    pub id: String,
}

/// The filters sent to [BankApiClient::list_transactions].
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionQuery {
    /// The account to list transactions for.
    pub bank_account_id: String,
    /// Only transactions with this status are returned.
    ///
    /// The sync engine always asks for [TransactionStatus::Completed].
    pub status: TransactionStatus,
    /// Only return transactions settled at or after this instant (inclusive).
    ///
    /// `None` requests the full history.
    pub settled_from: Option<OffsetDateTime>,
}

/// The errors that may occur while talking to the bank.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum RemoteError {
    /// The request could not be sent or no response arrived before the
    /// transport timeout.
    #[error("could not reach the bank API: {0}")]
    Transport(String),

    /// The bank rejected the credentials.
    ///
    /// Credentials are managed outside of this crate. Callers should trigger
    /// re-authentication rather than retry.
    #[error("the bank API rejected the credentials (HTTP {status}): {body}")]
    Unauthorized {
        /// The HTTP status code, 401 or 403.
        status: u16,
        /// The response body, useful for debugging.
        body: String,
    },

    /// The bank responded with a non-success status code.
    #[error("the bank API responded with HTTP {status}: {body}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The response body, useful for debugging.
        body: String,
    },

    /// The response could not be parsed, or a query parameter could not be
    /// encoded in the format the API expects.
    #[error("could not encode or parse bank API data: {0}")]
    Decode(String),
}

/// Read access to the remote bank.
#[async_trait]
pub trait BankApiClient: Send + Sync {
    /// List the bank accounts of the remote organization.
    ///
    /// # Errors
    /// Returns a [RemoteError] on any transport, authentication or parsing
    /// failure.
    async fn list_organization_accounts(&self) -> Result<Vec<BankAccount>, RemoteError>;

    /// List every transaction matching `query`.
    ///
    /// An empty list is a valid result.
    ///
    /// # Errors
    /// Returns a [RemoteError] on any transport, authentication or parsing
    /// failure.
    async fn list_transactions(
        &self,
        query: &TransactionQuery,
    ) -> Result<Vec<Transaction>, RemoteError>;
}
