/// Account lifecycle on top of an [`AccountStore`]
///
/// `AccountService` is the only place that reads account records for users
/// and admins. Every read goes through the quota engine's day reset, so a
/// stale counter from yesterday is never shown or acted on, whichever path
/// touches it first.
///
/// # Operations
///
/// - `register`: create a Free account for a new identity
/// - `start_session`: mark the account active (login)
/// - `load`: current quota evaluation, persisting a day reset if needed
/// - `commit_usage`: charge one generation against today's allowance
/// - `upgrade`: change tier, usage untouched
/// - `list_all` / `admin_update`: administrative enumeration and edits
///
/// # Locking
///
/// Every operation that writes a record takes the identity's
/// [`AccountGuard`] for its read-modify-write. Callers that need a wider
/// critical section (admission through commit) take the guard with
/// [`AccountService::lock`] and use the `_held` variants, which never lock
/// again. Clones of a service share one lock table.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use vistagen_shared::accounts::AccountService;
/// use vistagen_shared::clock::SystemClock;
/// use vistagen_shared::store::InMemoryAccountStore;
///
/// # async fn example() -> Result<(), vistagen_shared::accounts::AccountError> {
/// let service = AccountService::new(
///     Arc::new(InMemoryAccountStore::new()),
///     Arc::new(SystemClock),
/// );
///
/// service.register("ana@example.com", Some("Ana")).await?;
/// let status = service.load("ana@example.com").await?;
/// assert_eq!(status.remaining, 1);
/// # Ok(())
/// # }
/// ```

use crate::clock::Clock;
use crate::locks::{AccountGuard, AccountLocks};
use crate::models::account::{normalize_identity, Account, AccountUpdate, Tier};
use crate::quota::{self, QuotaEvaluation};
use crate::store::{AccountStore, StoreError};
use std::sync::Arc;

/// Account operation errors
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    /// No account for this identity
    #[error("Account not found: {0}")]
    NotFound(String),

    /// Identity already registered
    #[error("Account already exists: {0}")]
    AlreadyExists(String),

    /// Identity is empty after normalization
    #[error("Invalid identity: {0:?}")]
    InvalidIdentity(String),

    /// Persistence failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Account result type alias
pub type AccountResult<T> = Result<T, AccountError>;

/// Account operations bound to a store and a clock
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn AccountStore>,
    clock: Arc<dyn Clock>,
    locks: Arc<AccountLocks>,
}

impl AccountService {
    /// Creates a service over `store`, reading time from `clock`
    pub fn new(store: Arc<dyn AccountStore>, clock: Arc<dyn Clock>) -> Self {
        AccountService {
            store,
            clock,
            locks: Arc::new(AccountLocks::new()),
        }
    }

    /// Underlying store
    pub fn store(&self) -> Arc<dyn AccountStore> {
        self.store.clone()
    }

    /// Clock used for day boundaries
    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Waits for exclusive access to `identity`
    pub async fn lock(&self, identity: &str) -> AccountGuard {
        self.locks.acquire(&normalize_identity(identity)).await
    }

    /// Registers a new Free-tier account
    ///
    /// # Errors
    ///
    /// - `InvalidIdentity` if the identity is blank
    /// - `AlreadyExists` if the identity is taken
    pub async fn register(&self, identity: &str, name: Option<&str>) -> AccountResult<Account> {
        let key = normalize_identity(identity);
        if key.is_empty() {
            return Err(AccountError::InvalidIdentity(identity.to_string()));
        }

        let _guard = self.locks.acquire(&key).await;
        if self.store.get(&key).await?.is_some() {
            return Err(AccountError::AlreadyExists(key));
        }

        let account = Account::new(&key, name, self.clock.now());
        self.store.put(&account).await?;

        tracing::info!(identity = %account.identity, account_id = %account.id, "Account registered");
        Ok(account)
    }

    /// Starts a session for an existing account
    ///
    /// Applies the day reset and bumps `last_active_at`, then persists.
    pub async fn start_session(&self, identity: &str) -> AccountResult<Account> {
        let guard = self.lock(identity).await;
        let stored = self.fetch(guard.identity()).await?;

        let mut account = quota::evaluate(&stored, self.clock.today()).account;
        account.touch(self.clock.now());
        self.store.put(&account).await?;

        tracing::info!(identity = %account.identity, tier = %account.tier, "Session started");
        Ok(account)
    }

    /// Current quota evaluation for `identity`
    ///
    /// A stale counter is reset and the reset is written back. The lock is
    /// taken only when there is a reset to write.
    pub async fn load(&self, identity: &str) -> AccountResult<QuotaEvaluation> {
        let stored = self.fetch(identity).await?;
        let eval = quota::evaluate(&stored, self.clock.today());
        if !eval.was_reset(&stored) {
            return Ok(eval);
        }

        let guard = self.lock(identity).await;
        self.load_held(&guard).await
    }

    /// [`load`](Self::load) for a caller already holding the identity's lock
    pub async fn load_held(&self, guard: &AccountGuard) -> AccountResult<QuotaEvaluation> {
        let stored = self.fetch(guard.identity()).await?;
        self.normalize(&stored).await
    }

    /// Charges one generation against `identity`
    pub async fn commit_usage(&self, identity: &str) -> AccountResult<QuotaEvaluation> {
        let guard = self.lock(identity).await;
        self.commit_held(&guard).await
    }

    /// [`commit_usage`](Self::commit_usage) for a caller already holding the
    /// identity's lock
    ///
    /// Re-reads the record so the charge applies to whatever was persisted
    /// last, including a day reset made since admission.
    pub async fn commit_held(&self, guard: &AccountGuard) -> AccountResult<QuotaEvaluation> {
        let stored = self.fetch(guard.identity()).await?;
        let today = self.clock.today();

        let charged = quota::commit(&stored, today);
        self.store.put(&charged).await?;

        tracing::debug!(
            identity = %charged.identity,
            daily_usage = charged.daily_usage,
            "Generation usage committed"
        );
        Ok(quota::evaluate(&charged, today))
    }

    /// Moves an account to `tier` without touching usage
    pub async fn upgrade(&self, identity: &str, tier: Tier) -> AccountResult<QuotaEvaluation> {
        let guard = self.lock(identity).await;
        let stored = self.fetch(guard.identity()).await?;
        let current = quota::evaluate(&stored, self.clock.today()).account;

        let upgraded = quota::upgrade(&current, tier);
        self.store.put(&upgraded).await?;

        tracing::info!(
            identity = %upgraded.identity,
            from = %stored.tier,
            to = %tier,
            "Account tier changed"
        );
        Ok(quota::evaluate(&upgraded, self.clock.today()))
    }

    /// Every account with today's effective usage, sorted by identity
    ///
    /// `query` keeps only accounts whose identity or name contains it,
    /// ignoring case. Resets are applied for display only and not written
    /// back.
    pub async fn list_all(&self, query: Option<&str>) -> AccountResult<Vec<Account>> {
        let today = self.clock.today();
        let needle = query
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty());

        let mut accounts: Vec<Account> = self
            .store
            .list_all()
            .await?
            .iter()
            .filter(|account| match &needle {
                Some(needle) => {
                    account.identity.to_lowercase().contains(needle.as_str())
                        || account.name.to_lowercase().contains(needle.as_str())
                }
                None => true,
            })
            .map(|account| quota::evaluate(account, today).account)
            .collect();

        accounts.sort_by(|a, b| a.identity.cmp(&b.identity));
        Ok(accounts)
    }

    /// Applies an administrative edit
    ///
    /// The day reset is applied before the edit so an explicit
    /// `daily_usage` always refers to today.
    pub async fn admin_update(
        &self,
        identity: &str,
        update: AccountUpdate,
    ) -> AccountResult<QuotaEvaluation> {
        let guard = self.lock(identity).await;
        let stored = self.fetch(guard.identity()).await?;
        let mut account = quota::evaluate(&stored, self.clock.today()).account;

        if let Some(tier) = update.tier {
            account = quota::upgrade(&account, tier);
        }
        if let Some(daily_usage) = update.daily_usage {
            account.daily_usage = daily_usage;
        }
        if let Some(name) = update.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            account.name = name.to_string();
        }

        self.store.put(&account).await?;

        tracing::info!(identity = %account.identity, ?update, "Account updated by admin");
        Ok(quota::evaluate(&account, self.clock.today()))
    }

    async fn fetch(&self, identity: &str) -> AccountResult<Account> {
        let key = normalize_identity(identity);
        self.store
            .get(&key)
            .await?
            .ok_or(AccountError::NotFound(key))
    }

    async fn normalize(&self, stored: &Account) -> AccountResult<QuotaEvaluation> {
        let eval = quota::evaluate(stored, self.clock.today());
        if eval.was_reset(stored) {
            self.store.put(&eval.account).await?;
        }
        Ok(eval)
    }
}
