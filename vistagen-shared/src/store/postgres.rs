/// PostgreSQL account store
///
/// Every write is a single `INSERT ... ON CONFLICT (identity) DO UPDATE`
/// statement, which gives atomic whole-record replacement per identity
/// without an explicit transaction.
///
/// # Example
///
/// ```no_run
/// use vistagen_shared::db::pool::{create_pool, DatabaseConfig};
/// use vistagen_shared::store::{AccountStore, PgAccountStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig {
///     url: std::env::var("DATABASE_URL")?,
///     ..Default::default()
/// })
/// .await?;
///
/// let store = PgAccountStore::new(pool);
/// let accounts = store.list_all().await?;
/// println!("{} accounts", accounts.len());
/// # Ok(())
/// # }
/// ```

use super::{AccountStore, StoreError, StoreResult};
use crate::models::account::{Account, Tier};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Raw `accounts` row
#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    identity: String,
    name: String,
    tier: String,
    daily_usage: i32,
    usage_date: NaiveDate,
    created_at: DateTime<Utc>,
    last_active_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = StoreError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let tier = Tier::parse(&row.tier).ok_or_else(|| StoreError::Corrupt {
            identity: row.identity.clone(),
            reason: format!("unknown tier '{}'", row.tier),
        })?;

        let daily_usage = u32::try_from(row.daily_usage).map_err(|_| StoreError::Corrupt {
            identity: row.identity.clone(),
            reason: format!("negative daily usage {}", row.daily_usage),
        })?;

        Ok(Account {
            id: row.id,
            identity: row.identity,
            name: row.name,
            tier,
            daily_usage,
            usage_date: row.usage_date,
            created_at: row.created_at,
            last_active_at: row.last_active_at,
        })
    }
}

/// sqlx-backed account store
#[derive(Debug, Clone)]
pub struct PgAccountStore {
    db: PgPool,
}

impl PgAccountStore {
    /// Creates a store over an existing pool
    pub fn new(db: PgPool) -> Self {
        PgAccountStore { db }
    }

    /// Underlying pool (for health checks)
    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn get(&self, identity: &str) -> StoreResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, identity, name, tier, daily_usage, usage_date,
                   created_at, last_active_at
            FROM accounts
            WHERE identity = $1
            "#,
        )
        .bind(identity)
        .fetch_optional(&self.db)
        .await?;

        row.map(Account::try_from).transpose()
    }

    async fn put(&self, account: &Account) -> StoreResult<()> {
        let daily_usage = i32::try_from(account.daily_usage).unwrap_or(i32::MAX);

        sqlx::query(
            r#"
            INSERT INTO accounts (id, identity, name, tier, daily_usage, usage_date,
                                  created_at, last_active_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (identity) DO UPDATE SET
                name = EXCLUDED.name,
                tier = EXCLUDED.tier,
                daily_usage = EXCLUDED.daily_usage,
                usage_date = EXCLUDED.usage_date,
                last_active_at = EXCLUDED.last_active_at
            "#,
        )
        .bind(account.id)
        .bind(&account.identity)
        .bind(&account.name)
        .bind(account.tier.as_str())
        .bind(daily_usage)
        .bind(account.usage_date)
        .bind(account.created_at)
        .bind(account.last_active_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn list_all(&self) -> StoreResult<Vec<Account>> {
        let rows = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, identity, name, tier, daily_usage, usage_date,
                   created_at, last_active_at
            FROM accounts
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Account::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(tier: &str, daily_usage: i32) -> AccountRow {
        let now = Utc::now();
        AccountRow {
            id: Uuid::new_v4(),
            identity: "ana@example.com".to_string(),
            name: "ana".to_string(),
            tier: tier.to_string(),
            daily_usage,
            usage_date: now.date_naive(),
            created_at: now,
            last_active_at: now,
        }
    }

    #[test]
    fn test_row_conversion() {
        let account = Account::try_from(row("standard", 2)).unwrap();
        assert_eq!(account.tier, Tier::Standard);
        assert_eq!(account.daily_usage, 2);
    }

    #[test]
    fn test_row_with_unknown_tier_is_corrupt() {
        let err = Account::try_from(row("gold", 0)).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
        assert!(err.to_string().contains("unknown tier"));
    }

    #[test]
    fn test_row_with_negative_usage_is_corrupt() {
        let err = Account::try_from(row("free", -1)).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    // Live database round trips: tests/pg_store_tests.rs
}
