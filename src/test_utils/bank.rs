//! A scripted [BankApiClient] for driving the sync engine in tests.

use std::{
    collections::VecDeque,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::{
    bank::{BankAccount, BankApiClient, RemoteError, TransactionQuery},
    transaction::Transaction,
};

/// Pauses [FakeBank::list_transactions] until the test releases it.
#[derive(Debug, Default)]
struct Gate {
    entered: Notify,
    release: Notify,
}

/// Answers with canned accounts and transaction pages, and records every
/// query it receives.
///
/// Once the scripted responses run out, `list_transactions` returns an empty
/// list.
#[derive(Debug)]
pub(crate) struct FakeBank {
    accounts: Result<Vec<BankAccount>, RemoteError>,
    responses: Mutex<VecDeque<Result<Vec<Transaction>, RemoteError>>>,
    queries: Mutex<Vec<TransactionQuery>>,
    account_calls: AtomicUsize,
    gate: Option<Gate>,
}

impl FakeBank {
    pub(crate) fn with_accounts(account_ids: &[&str]) -> Self {
        let accounts = account_ids
            .iter()
            .map(|id| BankAccount { id: id.to_string() })
            .collect();

        Self {
            accounts: Ok(accounts),
            responses: Mutex::new(VecDeque::new()),
            queries: Mutex::new(Vec::new()),
            account_calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub(crate) fn failing_accounts(error: RemoteError) -> Self {
        Self {
            accounts: Err(error),
            ..Self::with_accounts(&[])
        }
    }

    /// Queue the response for the next `list_transactions` call.
    pub(crate) fn then_respond(self, response: Result<Vec<Transaction>, RemoteError>) -> Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    /// Make every `list_transactions` call wait for [FakeBank::release].
    pub(crate) fn gated(mut self) -> Self {
        self.gate = Some(Gate::default());
        self
    }

    /// Queue another response on a bank that is already shared.
    pub(crate) fn push_response(&self, response: Result<Vec<Transaction>, RemoteError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Wait until a `list_transactions` call is parked on the gate.
    pub(crate) async fn wait_until_fetching(&self) {
        if let Some(gate) = &self.gate {
            gate.entered.notified().await;
        }
    }

    /// Let one parked `list_transactions` call finish.
    pub(crate) fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.release.notify_one();
        }
    }

    pub(crate) fn queries(&self) -> Vec<TransactionQuery> {
        self.queries.lock().unwrap().clone()
    }

    /// The number of remote calls of either kind.
    pub(crate) fn call_count(&self) -> usize {
        self.account_calls.load(Ordering::SeqCst) + self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl BankApiClient for FakeBank {
    async fn list_organization_accounts(&self) -> Result<Vec<BankAccount>, RemoteError> {
        self.account_calls.fetch_add(1, Ordering::SeqCst);
        self.accounts.clone()
    }

    async fn list_transactions(
        &self,
        query: &TransactionQuery,
    ) -> Result<Vec<Transaction>, RemoteError> {
        self.queries.lock().unwrap().push(query.clone());

        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}
