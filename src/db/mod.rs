/// Database layer for driftmail.
///
/// One SQLite file holds everything the system owns: the `tokens` and
/// `accounts` tables plus the single-row `config`. Reads run directly on
/// the pool (WAL allows concurrent readers); every mutating operation in
/// the managers executes inside a single write transaction so quota checks
/// and counter increments are race-free under concurrent callers.
pub mod models;

use crate::config::MailConfig;
use crate::error::{Error, Result};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool};
use std::path::Path;
use std::time::Duration;

/// Embedded migrations, applied by [`connect`].
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Open the driftmail database (creating it if missing) and run migrations.
pub async fn connect(path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let pool = SqlitePool::connect_with(
        SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5)),
    )
    .await?;

    MIGRATOR
        .run(&pool)
        .await
        .map_err(|e| Error::Internal(format!("migration failed: {}", e)))?;

    Ok(pool)
}

/// Write the configuration row.
///
/// A second call fails with `AlreadyInitialized` unless `force` replaces
/// the row wholesale.
pub async fn init_config(pool: &SqlitePool, config: &MailConfig, force: bool) -> Result<()> {
    let mut tx = pool.begin().await?;

    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM config WHERE id = 1")
        .fetch_optional(&mut *tx)
        .await?;
    if existing.is_some() && !force {
        return Err(Error::AlreadyInitialized);
    }

    sqlx::query(
        "INSERT OR REPLACE INTO config
             (id, mail_domain, web_endpoint, vmail_user, path_virtual_mailboxes, path_dovecot_users)
         VALUES (1, ?1, ?2, ?3, ?4, ?5)",
    )
    .bind(&config.mail_domain)
    .bind(&config.web_endpoint)
    .bind(&config.vmail_user)
    .bind(&config.path_virtual_mailboxes)
    .bind(&config.path_dovecot_users)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Fetch the configuration row; `NotInitialized` when `init` has not run.
///
/// Generic over the executor so managers can read it inside their own
/// write transaction.
pub async fn config<'e, E>(executor: E) -> Result<MailConfig>
where
    E: sqlx::SqliteExecutor<'e>,
{
    sqlx::query_as::<_, MailConfig>(
        "SELECT mail_domain, web_endpoint, vmail_user, path_virtual_mailboxes, path_dovecot_users
         FROM config WHERE id = 1",
    )
    .fetch_optional(executor)
    .await?
    .ok_or(Error::NotInitialized)
}

/// Whether the configuration row exists.
pub async fn is_initialized(pool: &SqlitePool) -> Result<bool> {
    let row: Option<i64> = sqlx::query_scalar("SELECT id FROM config WHERE id = 1")
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}
