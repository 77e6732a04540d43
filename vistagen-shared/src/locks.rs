/// Per-identity async locks
///
/// Every read-modify-write of an account record happens under the lock for
/// its identity. The generation pipeline holds the same lock from admission
/// to commit, so a login, an upgrade or an admin edit waits for an in-flight
/// generation of that identity instead of overwriting its charge.
///
/// Entries are pruned lazily on the next acquisition once nobody holds or
/// waits on them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

/// Exclusive access to one identity, released on drop
#[derive(Debug)]
pub struct AccountGuard {
    identity: String,
    _lock: OwnedMutexGuard<()>,
}

impl AccountGuard {
    /// Normalized identity this guard covers
    pub fn identity(&self) -> &str {
        &self.identity
    }
}

/// Lock table keyed by normalized identity
#[derive(Debug, Default)]
pub struct AccountLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl AccountLocks {
    /// Creates an empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `identity`
    ///
    /// `identity` must already be normalized.
    pub async fn acquire(&self, identity: &str) -> AccountGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            // Drop entries nobody holds or waits on
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(identity.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };

        AccountGuard {
            identity: identity.to_string(),
            _lock: lock.lock_owned().await,
        }
    }

    /// Number of identities currently tracked
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Whether no identity is tracked
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
