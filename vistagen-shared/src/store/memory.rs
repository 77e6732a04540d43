/// In-memory account store
///
/// Holds every record in a `HashMap` behind a tokio `RwLock`. A `put`
/// swaps the whole record under the write lock, so readers never observe a
/// partially updated account.

use super::{AccountStore, StoreResult};
use crate::models::account::Account;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local account store
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    accounts: RwLock<HashMap<String, Account>>,
}

impl InMemoryAccountStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `accounts`
    pub fn with_accounts(accounts: impl IntoIterator<Item = Account>) -> Self {
        let map = accounts
            .into_iter()
            .map(|account| (account.identity.clone(), account))
            .collect();

        InMemoryAccountStore {
            accounts: RwLock::new(map),
        }
    }

    /// Number of stored accounts
    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    /// Whether the store is empty
    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn get(&self, identity: &str) -> StoreResult<Option<Account>> {
        Ok(self.accounts.read().await.get(identity).cloned())
    }

    async fn put(&self, account: &Account) -> StoreResult<()> {
        self.accounts
            .write()
            .await
            .insert(account.identity.clone(), account.clone());
        Ok(())
    }

    async fn list_all(&self) -> StoreResult<Vec<Account>> {
        Ok(self.accounts.read().await.values().cloned().collect())
    }
}
