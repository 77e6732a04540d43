/// Account model
///
/// An account is the unit of quota accounting. It is keyed externally by its
/// `identity` (an email-like handle) and carries the subscription tier plus a
/// daily usage counter that only has meaning relative to `usage_date`.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE accounts (
///     id UUID PRIMARY KEY,
///     identity TEXT NOT NULL UNIQUE,
///     name TEXT NOT NULL,
///     tier TEXT NOT NULL DEFAULT 'free',
///     daily_usage INTEGER NOT NULL DEFAULT 0,
///     usage_date DATE NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL,
///     last_active_at TIMESTAMPTZ NOT NULL,
///     CONSTRAINT accounts_tier_check CHECK (tier IN ('free', 'standard', 'premium'))
/// );
/// ```
///
/// # Example
///
/// ```
/// use vistagen_shared::models::account::{Account, Tier};
/// use chrono::Utc;
///
/// let account = Account::new("ana@example.com", None, Utc::now());
/// assert_eq!(account.tier, Tier::Free);
/// assert_eq!(account.name, "ana");
/// assert_eq!(account.daily_usage, 0);
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Subscription tier
///
/// Variants are declared in order of increasing quota, so the derived
/// `Ord` matches the upgrade path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Free tier (1 generation/day)
    Free,

    /// Standard tier (5 generations/day, 500 LEK)
    Standard,

    /// Premium tier (15 generations/day, 1000 LEK)
    Premium,
}

impl Tier {
    /// All tiers, cheapest first
    pub const ALL: [Tier; 3] = [Tier::Free, Tier::Standard, Tier::Premium];

    /// Converts tier to string for storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Standard => "standard",
            Tier::Premium => "premium",
        }
    }

    /// Parses tier from its storage form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "free" => Some(Tier::Free),
            "standard" => Some(Tier::Standard),
            "premium" => Some(Tier::Premium),
            _ => None,
        }
    }

    /// Daily generation quota for this tier
    pub fn daily_limit(&self) -> u32 {
        match self {
            Tier::Free => 1,
            Tier::Standard => 5,
            Tier::Premium => 15,
        }
    }

    /// Price of the tier in LEK, as charged by the payment gateway
    pub fn price(&self) -> u32 {
        match self {
            Tier::Free => 0,
            Tier::Standard => 500,
            Tier::Premium => 1000,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Opaque account ID (UUID v4)
    pub id: Uuid,

    /// Unique external lookup key (normalized email-like handle)
    pub identity: String,

    /// Display name
    pub name: String,

    /// Current subscription tier
    pub tier: Tier,

    /// Generations consumed on `usage_date`
    pub daily_usage: u32,

    /// Calendar day (UTC) the usage counter applies to
    pub usage_date: NaiveDate,

    /// When the account was registered
    pub created_at: DateTime<Utc>,

    /// Last successful session start
    pub last_active_at: DateTime<Utc>,
}

impl Account {
    /// Creates a fresh Free-tier account with no usage
    ///
    /// The identity is normalized; the name falls back to the identity's
    /// local part when absent or blank.
    pub fn new(identity: &str, name: Option<&str>, now: DateTime<Utc>) -> Self {
        let identity = normalize_identity(identity);
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| default_name(&identity));

        Account {
            id: Uuid::new_v4(),
            identity,
            name,
            tier: Tier::Free,
            daily_usage: 0,
            usage_date: now.date_naive(),
            created_at: now,
            last_active_at: now,
        }
    }

    /// Records a session start, never moving `last_active_at` backwards
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_active_at {
            self.last_active_at = now;
        }
    }
}

/// Normalizes an identity for use as a store key
///
/// Identities are compared case-insensitively and without surrounding
/// whitespace.
pub fn normalize_identity(identity: &str) -> String {
    identity.trim().to_lowercase()
}

fn default_name(identity: &str) -> String {
    identity
        .split('@')
        .next()
        .filter(|local| !local.is_empty())
        .unwrap_or(identity)
        .to_string()
}

/// Administrative changes to an account
///
/// Only `Some` fields are applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountUpdate {
    /// New tier
    pub tier: Option<Tier>,

    /// Overwrite today's usage counter
    pub daily_usage: Option<u32>,

    /// New display name
    pub name: Option<String>,
}
