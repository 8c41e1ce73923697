//! Configuration for the sync engine and the bank API client.

use std::{env, time::Duration};

use crate::{Error, sync::CursorStrategy};

/// The default minimum time between two automatic syncs.
pub const DEFAULT_SYNC_COOLDOWN: Duration = Duration::from_secs(60 * 60);

/// The default timeout for a single request to the bank API.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The environment variable holding the bank API base URL.
pub const BANK_API_URL_VAR: &str = "BANK_API_URL";
/// The environment variable holding the bank API login.
pub const BANK_API_LOGIN_VAR: &str = "BANK_API_LOGIN";
/// The environment variable holding the bank API secret key.
pub const BANK_API_SECRET_KEY_VAR: &str = "BANK_API_SECRET_KEY";

const DEFAULT_BANK_API_URL: &str = "https://thirdparty.qonto.com";

/// How to connect to the bank API.
#[derive(Clone, PartialEq)]
pub struct BankConfig {
    /// The base URL of the API, e.g. "https://thirdparty.qonto.com".
    pub base_url: String,
    /// The organization login used to authenticate.
    pub login: String,
    /// The secret key paired with `login`.
    pub secret_key: String,
    /// How long to wait for a single request before giving up.
    pub request_timeout: Duration,
}

impl BankConfig {
    /// Read the bank configuration from the environment.
    ///
    /// [BANK_API_LOGIN_VAR] and [BANK_API_SECRET_KEY_VAR] must be set.
    /// [BANK_API_URL_VAR] is optional.
    ///
    /// # Errors
    /// Returns [Error::MissingEnvironmentVariable] if a required variable is
    /// not set.
    pub fn from_env() -> Result<Self, Error> {
        let required = |name: &str| {
            env::var(name).map_err(|_| Error::MissingEnvironmentVariable(name.to_owned()))
        };

        Ok(Self {
            base_url: env::var(BANK_API_URL_VAR)
                .unwrap_or_else(|_| DEFAULT_BANK_API_URL.to_owned()),
            login: required(BANK_API_LOGIN_VAR)?,
            secret_key: required(BANK_API_SECRET_KEY_VAR)?,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }
}

// Keep the secret key out of logs.
impl std::fmt::Debug for BankConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BankConfig")
            .field("base_url", &self.base_url)
            .field("login", &self.login)
            .field("secret_key", &"********")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Settings that control when and how the engine syncs.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// The minimum time between two automatic syncs.
    pub cooldown: Duration,
    /// How the cursor handles the transaction on the watermark boundary.
    pub cursor_strategy: CursorStrategy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cooldown: DEFAULT_SYNC_COOLDOWN,
            cursor_strategy: CursorStrategy::default(),
        }
    }
}
