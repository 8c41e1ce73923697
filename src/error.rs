//! Defines the crate level error type and conversions from storage errors.

use crate::bank::RemoteError;

/// The errors that may occur while syncing or reading the transaction cache.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// Another sync is already in flight.
    ///
    /// This is an expected outcome when a manual and a scheduled sync race
    /// each other. The caller should retry later or rely on the next
    /// scheduled run; the rejected call did not touch the cache.
    #[error("a sync is already in progress")]
    SyncBusy,

    /// The remote organization has no bank account to sync from.
    ///
    /// This is a configuration problem on the bank side and is not retried.
    #[error("the organization has no bank account to sync")]
    NoBankAccount,

    /// The bank API could not be reached, rejected the request, or sent a
    /// response that could not be parsed.
    ///
    /// The underlying cause is preserved so callers can tell authentication
    /// failures apart, see [Error::requires_reauthentication].
    #[error("the bank API is unavailable: {0}")]
    RemoteUnavailable(RemoteError),

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// A transaction status stored in the cache was not recognised.
    #[error("invalid transaction status \"{0}\"")]
    InvalidStatus(String),

    /// A transaction side stored in the cache was not recognised.
    #[error("invalid transaction side \"{0}\"")]
    InvalidSide(String),

    /// An error occurred while serializing a transaction payload as JSON
    #[error("could not serialize as JSON: {0}")]
    JSONSerializationError(String),

    /// A required environment variable is not set.
    #[error("the environment variable '{0}' must be set")]
    MissingEnvironmentVariable(String),
}

impl Error {
    /// Whether the bank rejected the credentials used for the request.
    ///
    /// Credentials are managed outside of the sync engine, so the engine
    /// passes these failures through untouched for the caller to act on.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(
            self,
            Error::RemoteUnavailable(RemoteError::Unauthorized { .. })
        )
    }
}

impl From<RemoteError> for Error {
    fn from(value: RemoteError) -> Self {
        Error::RemoteUnavailable(value)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}
