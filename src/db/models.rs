/// Database row models.
///
/// Timestamps are unix seconds throughout the core so expiry arithmetic is
/// exact and comparable on the SQL side; chrono renders them at the
/// CLI/web edge.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Signup token row: a capability to create up to `max_use` accounts whose
/// addresses start with `prefix` and live for `expiry_secs`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Token {
    pub name: String,
    /// Secret redemption value, immutable once issued.
    pub token: String,
    pub prefix: String,
    /// Lifetime granted to accounts created under this token, in seconds.
    pub expiry_secs: i64,
    /// Ceiling on accounts ever created; deletions do not free quota.
    pub max_use: i64,
    pub use_count: i64,
    pub created_at: i64,
}

impl Token {
    /// Remaining quota, clamped at zero (`max_use` may have been lowered
    /// below `use_count` by an administrative edit).
    pub fn uses_left(&self) -> i64 {
        (self.max_use - self.use_count).max(0)
    }

    /// Redemption URL under the configured web endpoint.
    pub fn web_url(&self, web_endpoint: &str) -> String {
        format!("{}?t={}", web_endpoint, self.token)
    }
}

/// Account row: one provisioned mailbox with a finite time-to-live.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Account {
    pub addr: String,
    /// Argon2id PHC string; the cleartext is returned exactly once from
    /// the creating call and never stored.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Owning token, lookup only; the account does not keep it alive.
    pub token_name: String,
    pub created_at: i64,
    /// Copied from the token's `expiry_secs` at creation; later token
    /// edits never change it.
    pub ttl_secs: i64,
}

impl Account {
    /// Instant at which the account becomes eligible for pruning.
    pub fn expires_at(&self) -> i64 {
        self.created_at.saturating_add(self.ttl_secs)
    }

    /// Whether the TTL has elapsed at `as_of`.
    pub fn is_expired(&self, as_of: i64) -> bool {
        self.expires_at() <= as_of
    }

    /// Expiry instant for display.
    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.expires_at(), 0)
    }
}
