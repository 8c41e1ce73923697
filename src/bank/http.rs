//! A [BankApiClient] that talks to the bank's JSON REST API over HTTPS.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{
    bank::{BankAccount, BankApiClient, RemoteError, TransactionQuery},
    config::BankConfig,
    transaction::{Transaction, TransactionSide, TransactionStatus},
};

/// The number of transactions requested per page.
const PAGE_SIZE: u32 = 100;

/// Fetches accounts and transactions from the bank's REST API.
///
/// Every request is authenticated with the `login:secret_key` pair from
/// [BankConfig] and is bounded by the configured request timeout, so a hung
/// connection surfaces as [RemoteError::Transport] instead of blocking forever.
#[derive(Debug, Clone)]
pub struct HttpBankClient {
    client: Client,
    base_url: String,
    authorization: String,
}

impl HttpBankClient {
    /// Create a client for the API described by `config`.
    ///
    /// # Errors
    /// Returns [RemoteError::Transport] if the underlying HTTP client cannot
    /// be built (e.g., the TLS backend failed to initialise).
    pub fn new(config: &BankConfig) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|error| RemoteError::Transport(error.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            authorization: format!("{}:{}", config.login, config.secret_key),
        })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{path}", self.base_url))
            .header("Authorization", &self.authorization)
    }
}

#[async_trait]
impl BankApiClient for HttpBankClient {
    async fn list_organization_accounts(&self) -> Result<Vec<BankAccount>, RemoteError> {
        let response: OrganizationResponse = send(self.get("/v2/organization")).await?;

        Ok(response
            .organization
            .bank_accounts
            .into_iter()
            .map(|account| BankAccount { id: account.id })
            .collect())
    }

    async fn list_transactions(
        &self,
        query: &TransactionQuery,
    ) -> Result<Vec<Transaction>, RemoteError> {
        let settled_from = query
            .settled_from
            .map(|instant| instant.format(&Rfc3339))
            .transpose()
            .map_err(|error| {
                RemoteError::Decode(format!("could not encode settled_from as RFC 3339: {error}"))
            })?;

        let mut transactions = Vec::new();
        let mut page = 1;

        loop {
            let mut request = self.get("/v2/transactions").query(&[
                ("bank_account_id", query.bank_account_id.as_str()),
                ("status[]", query.status.as_str()),
                ("sort_by", "settled_at:asc"),
            ]);

            if let Some(settled_from) = &settled_from {
                request = request.query(&[("settled_at_from", settled_from.as_str())]);
            }

            let response: TransactionsResponse = send(
                request.query(&[("page", page.to_string()), ("per_page", PAGE_SIZE.to_string())]),
            )
            .await?;

            for value in response.transactions {
                transactions.push(parse_transaction(value, &query.bank_account_id)?);
            }

            match response.meta.next_page {
                Some(next_page) if next_page > page => page = next_page,
                _ => break,
            }
        }

        tracing::debug!(
            "Fetched {} transactions for bank account {}",
            transactions.len(),
            query.bank_account_id
        );

        Ok(transactions)
    }
}

/// Send `request` and parse the JSON body of a successful response.
async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, RemoteError> {
    let response = request
        .send()
        .await
        .map_err(|error| RemoteError::Transport(error.to_string()))?;

    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();

        return Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Unauthorized {
                status: status.as_u16(),
                body,
            },
            _ => RemoteError::Status {
                status: status.as_u16(),
                body,
            },
        });
    }

    let body = response
        .bytes()
        .await
        .map_err(|error| RemoteError::Transport(error.to_string()))?;

    serde_json::from_slice(&body).map_err(|error| RemoteError::Decode(error.to_string()))
}

/// Convert one remote transaction object into a [Transaction], keeping the
/// original object as the payload.
fn parse_transaction(
    value: serde_json::Value,
    bank_account_id: &str,
) -> Result<Transaction, RemoteError> {
    let remote: RemoteTransaction = serde_json::from_value(value.clone())
        .map_err(|error| RemoteError::Decode(format!("invalid transaction: {error}")))?;

    Ok(Transaction {
        remote_id: remote.transaction_id,
        bank_account_id: remote
            .bank_account_id
            .unwrap_or_else(|| bank_account_id.to_owned()),
        amount: remote.amount,
        currency: remote.currency,
        side: remote.side,
        label: remote.label.unwrap_or_default(),
        status: remote.status,
        emitted_at: remote.emitted_at,
        settled_at: remote.settled_at,
        payload: value,
    })
}

#[derive(Deserialize)]
struct OrganizationResponse {
    organization: Organization,
}

#[derive(Deserialize)]
struct Organization {
    #[serde(default)]
    bank_accounts: Vec<RemoteBankAccount>,
}

#[derive(Deserialize)]
struct RemoteBankAccount {
    id: String,
}

#[derive(Deserialize)]
struct TransactionsResponse {
    transactions: Vec<serde_json::Value>,
    meta: PageMeta,
}

#[derive(Deserialize)]
struct PageMeta {
    next_page: Option<u32>,
}

#[derive(Deserialize)]
struct RemoteTransaction {
    transaction_id: String,
    bank_account_id: Option<String>,
    amount: f64,
    currency: String,
    side: TransactionSide,
    label: Option<String>,
    status: TransactionStatus,
    #[serde(with = "time::serde::rfc3339")]
    emitted_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    settled_at: Option<OffsetDateTime>,
}
