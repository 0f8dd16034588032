/// Account manager implementation.
use crate::account::CreatedAccount;
use crate::db::{self, models::Account, models::Token};
use crate::error::{Error, Result};
use crate::util;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use sqlx::SqlitePool;

/// Length of the random local-part tail of generated addresses.
const GEN_ADDR_LEN: usize = 5;
/// Length of generated passwords.
const GEN_PASSWORD_LEN: usize = 16;

/// Account manager service
pub struct AccountManager {
    db: SqlitePool,
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Redeem a token and provision an account.
    ///
    /// The quota claim is the first statement of the transaction: a guarded
    /// UPDATE that only increments `use_count` while it is below `max_use`.
    /// Starting with the write means concurrent redemptions serialize on the
    /// token row instead of racing on a stale read, and a rollback (any later
    /// failure) returns the claimed use. `use_count` therefore never
    /// overshoots `max_use` and failed attempts never consume quota.
    pub async fn create_account(
        &self,
        token_name: &str,
        addr: Option<&str>,
        password: Option<&str>,
    ) -> Result<CreatedAccount> {
        let mut tx = self.db.begin().await?;

        let claimed = sqlx::query(
            "UPDATE tokens SET use_count = use_count + 1
             WHERE name = ?1 AND use_count < max_use",
        )
        .bind(token_name)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let token = sqlx::query_as::<_, Token>(
            "SELECT name, token, prefix, expiry_secs, max_use, use_count, created_at
             FROM tokens WHERE name = ?1",
        )
        .bind(token_name)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::TokenNotFound(token_name.to_string()))?;

        if claimed == 0 {
            return Err(Error::QuotaExceeded {
                name: token.name,
                max_use: token.max_use,
            });
        }

        let config = db::config(&mut *tx).await?;

        let addr = match addr {
            Some(a) => a.to_string(),
            None => format!(
                "{}{}@{}",
                token.prefix,
                util::random_id(GEN_ADDR_LEN),
                config.mail_domain
            ),
        };
        validate_addr(&addr, &token.prefix, &config.mail_domain)?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM accounts WHERE addr = ?1")
            .bind(&addr)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_some() {
            return Err(Error::AddressExists(addr));
        }

        let password = match password {
            Some(p) => p.to_string(),
            None => util::random_id(GEN_PASSWORD_LEN),
        };
        let password_hash = hash_password(&password)?;
        let created_at = util::unix_now();

        sqlx::query(
            "INSERT INTO accounts (addr, password_hash, token_name, created_at, ttl_secs)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&addr)
        .bind(&password_hash)
        .bind(&token.name)
        .bind(created_at)
        .bind(token.expiry_secs)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(CreatedAccount {
            account: Account {
                addr,
                password_hash,
                token_name: token.name,
                created_at,
                ttl_secs: token.expiry_secs,
            },
            password,
        })
    }

    /// Remove an account. The issuing token's `use_count` is never given
    /// back: a deleted account still counts as a redeemed use.
    pub async fn delete_account(&self, addr: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM accounts WHERE addr = ?1")
            .bind(addr)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::AccountNotFound(addr.to_string()));
        }

        Ok(())
    }

    /// Get one account by address
    pub async fn get_account(&self, addr: &str) -> Result<Account> {
        sqlx::query_as::<_, Account>(
            "SELECT addr, password_hash, token_name, created_at, ttl_secs
             FROM accounts WHERE addr = ?1",
        )
        .bind(addr)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| Error::AccountNotFound(addr.to_string()))
    }

    /// List accounts, optionally restricted to one issuing token.
    pub async fn list_accounts(&self, token_name: Option<&str>) -> Result<Vec<Account>> {
        let accounts = match token_name {
            Some(name) => {
                sqlx::query_as::<_, Account>(
                    "SELECT addr, password_hash, token_name, created_at, ttl_secs
                     FROM accounts WHERE token_name = ?1 ORDER BY addr",
                )
                .bind(name)
                .fetch_all(&self.db)
                .await?
            }
            None => {
                sqlx::query_as::<_, Account>(
                    "SELECT addr, password_hash, token_name, created_at, ttl_secs
                     FROM accounts ORDER BY addr",
                )
                .fetch_all(&self.db)
                .await?
            }
        };
        Ok(accounts)
    }

    /// Accounts whose lifetime has elapsed as of `as_of` (inclusive).
    pub async fn get_expired(&self, as_of: i64) -> Result<Vec<Account>> {
        let accounts = sqlx::query_as::<_, Account>(
            "SELECT addr, password_hash, token_name, created_at, ttl_secs
             FROM accounts WHERE created_at + ttl_secs <= ?1 ORDER BY addr",
        )
        .bind(as_of)
        .fetch_all(&self.db)
        .await?;
        Ok(accounts)
    }
}

/// Check an address against the issuing token's prefix and the configured
/// mail domain.
fn validate_addr(addr: &str, prefix: &str, mail_domain: &str) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidAddress {
        addr: addr.to_string(),
        reason: reason.to_string(),
    };

    let (localpart, domain) = addr.split_once('@').ok_or_else(|| invalid("missing '@'"))?;
    if localpart.is_empty() {
        return Err(invalid("empty local part"));
    }
    if domain.contains('@') {
        return Err(invalid("more than one '@'"));
    }
    if domain != mail_domain {
        return Err(invalid("wrong domain"));
    }
    if !addr.starts_with(prefix) {
        return Err(invalid("does not match token prefix"));
    }
    Ok(())
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::Internal(format!("password hashing failed: {e}")))?;
    Ok(hash.to_string())
}
