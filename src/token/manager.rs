/// Token manager implementation.
use crate::db::models::Token;
use crate::error::{Error, Result};
use crate::token::TokenUpdate;
use crate::util;
use sqlx::SqlitePool;

/// Length of the random tail of generated token secrets.
const TOKEN_VALUE_LEN: usize = 15;

/// Token manager service
pub struct TokenManager {
    db: SqlitePool,
}

impl TokenManager {
    /// Create a new token manager
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Generate a default token secret. The human expiry code is folded in
    /// so the secret itself hints at the account lifetime it grants
    /// ("1d_x7gw2...").
    pub fn generate_value(expiry_secs: i64) -> String {
        format!(
            "{}_{}",
            util::format_duration(expiry_secs),
            util::random_id(TOKEN_VALUE_LEN)
        )
    }

    /// Issue a new token with `use_count = 0`.
    ///
    /// The INSERT itself is the uniqueness check: constraint failures are
    /// mapped onto `DuplicateName` / `DuplicateTokenValue`, so two
    /// concurrent calls cannot both claim a name.
    pub async fn add_token(
        &self,
        name: &str,
        token_value: Option<String>,
        expiry_secs: i64,
        prefix: &str,
        max_use: i64,
    ) -> Result<Token> {
        let value = token_value.unwrap_or_else(|| Self::generate_value(expiry_secs));
        let now = util::unix_now();

        sqlx::query(
            "INSERT INTO tokens (name, token, prefix, expiry_secs, max_use, use_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
        )
        .bind(name)
        .bind(&value)
        .bind(prefix)
        .bind(expiry_secs)
        .bind(max_use)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(|e| translate_unique_violation(e, name))?;

        Ok(Token {
            name: name.to_string(),
            token: value,
            prefix: prefix.to_string(),
            expiry_secs,
            max_use,
            use_count: 0,
            created_at: now,
        })
    }

    /// Apply a partial update; omitted fields keep their value.
    ///
    /// Changing `expiry_secs` affects future accounts only; existing
    /// accounts keep the `ttl_secs` copied at their creation. Lowering
    /// `max_use` below `use_count` is permitted and simply blocks further
    /// creation.
    pub async fn modify_token(&self, name: &str, update: TokenUpdate) -> Result<Token> {
        let result = sqlx::query(
            "UPDATE tokens
             SET expiry_secs = COALESCE(?1, expiry_secs),
                 prefix      = COALESCE(?2, prefix),
                 max_use     = COALESCE(?3, max_use)
             WHERE name = ?4",
        )
        .bind(update.expiry_secs)
        .bind(update.prefix.as_deref())
        .bind(update.max_use)
        .bind(name)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::TokenNotFound(name.to_string()));
        }

        self.get_token(name).await
    }

    /// Delete a token that no account references.
    ///
    /// The reference check rides inside the DELETE so it cannot interleave
    /// with a concurrent redemption; a row left behind is then told apart
    /// into `TokenInUse` vs `NotFound`.
    pub async fn delete_token(&self, name: &str) -> Result<()> {
        let result = sqlx::query(
            "DELETE FROM tokens
             WHERE name = ?1
               AND NOT EXISTS (SELECT 1 FROM accounts WHERE token_name = ?1)",
        )
        .bind(name)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM tokens WHERE name = ?1")
                .bind(name)
                .fetch_optional(&self.db)
                .await?;
            return Err(match exists {
                Some(_) => Error::TokenInUse(name.to_string()),
                None => Error::TokenNotFound(name.to_string()),
            });
        }

        Ok(())
    }

    /// Get one token by name
    pub async fn get_token(&self, name: &str) -> Result<Token> {
        sqlx::query_as::<_, Token>(
            "SELECT name, token, prefix, expiry_secs, max_use, use_count, created_at
             FROM tokens WHERE name = ?1",
        )
        .bind(name)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| Error::TokenNotFound(name.to_string()))
    }

    /// Look up a token by its secret value (the web redemption path).
    /// The error carries no context so the secret never reaches a log line.
    pub async fn get_token_by_value(&self, value: &str) -> Result<Token> {
        sqlx::query_as::<_, Token>(
            "SELECT name, token, prefix, expiry_secs, max_use, use_count, created_at
             FROM tokens WHERE token = ?1",
        )
        .bind(value)
        .fetch_optional(&self.db)
        .await?
        .ok_or(Error::InvalidToken)
    }

    /// List all tokens, ordered by name.
    pub async fn list_tokens(&self) -> Result<Vec<Token>> {
        let tokens = sqlx::query_as::<_, Token>(
            "SELECT name, token, prefix, expiry_secs, max_use, use_count, created_at
             FROM tokens ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(tokens)
    }

    /// Resolve the token governing `addr`.
    ///
    /// The longest matching prefix wins; equal lengths fall back to the
    /// lexically smallest token name, so resolution is deterministic and
    /// stable across runs. Matching happens in Rust rather than SQL LIKE:
    /// stored prefixes may contain `%` or `_`.
    pub async fn get_token_for_addr(&self, addr: &str) -> Result<Token> {
        self.list_tokens()
            .await?
            .into_iter()
            .filter(|t| addr.starts_with(&t.prefix))
            .max_by(|a, b| {
                a.prefix
                    .len()
                    .cmp(&b.prefix.len())
                    .then_with(|| b.name.cmp(&a.name))
            })
            .ok_or_else(|| Error::NoMatchingToken(addr.to_string()))
    }
}

/// Map a unique-constraint failure from the token INSERT onto the precise
/// duplicate error; everything else stays a database error.
fn translate_unique_violation(e: sqlx::Error, name: &str) -> Error {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            return if db_err.message().contains("tokens.token") {
                Error::DuplicateTokenValue
            } else {
                Error::DuplicateName(name.to_string())
            };
        }
    }
    Error::Database(e)
}
