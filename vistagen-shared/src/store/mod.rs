/// Account persistence boundary
///
/// The store is a key-value map from identity to [`Account`]. Its contract is
/// intentionally small:
///
/// - `get` returns the last written record for an identity, if any
/// - `put` replaces the whole record atomically (no torn writes)
/// - `list_all` enumerates every record in no particular order
///
/// Writes are last-writer-wins. There is no optimistic concurrency control;
/// callers that need check-then-write atomicity serialize per identity
/// themselves (see [`crate::locks::AccountLocks`]).
///
/// # Implementations
///
/// - [`InMemoryAccountStore`]: process-local map, used in tests and demo mode
/// - [`PgAccountStore`]: PostgreSQL via sqlx, single-statement upserts
///
/// # Example
///
/// ```
/// use vistagen_shared::store::{AccountStore, InMemoryAccountStore};
/// use vistagen_shared::models::account::Account;
/// use chrono::Utc;
///
/// # async fn example() -> Result<(), vistagen_shared::store::StoreError> {
/// let store = InMemoryAccountStore::new();
/// store.put(&Account::new("ana@example.com", None, Utc::now())).await?;
///
/// let found = store.get("ana@example.com").await?;
/// assert!(found.is_some());
/// # Ok(())
/// # }
/// ```

pub mod memory;
pub mod postgres;

pub use memory::InMemoryAccountStore;
pub use postgres::PgAccountStore;

use crate::models::account::Account;
use async_trait::async_trait;

/// Store error types
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store could not be reached or rejected the operation
    #[error("Account store unavailable: {0}")]
    Unavailable(String),

    /// A stored record could not be decoded into an account
    #[error("Corrupt account record for {identity}: {reason}")]
    Corrupt { identity: String, reason: String },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Store result type alias
pub type StoreResult<T> = Result<T, StoreError>;

/// Key-value account store keyed by identity
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Looks up an account by its normalized identity
    async fn get(&self, identity: &str) -> StoreResult<Option<Account>>;

    /// Writes the full account record, replacing any previous one
    async fn put(&self, account: &Account) -> StoreResult<()>;

    /// Returns every account, unordered
    async fn list_all(&self) -> StoreResult<Vec<Account>>;
}
