/// Application context shared across handlers and the CLI.
use crate::{account::AccountManager, db, error::Result, token::TokenManager};
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;

/// Shared application state. Cloning is cheap: the pool is internally
/// reference-counted and the managers sit behind `Arc`.
#[derive(Clone)]
pub struct AppContext {
    /// Database connection pool
    pub db: SqlitePool,
    /// Token manager
    pub tokens: Arc<TokenManager>,
    /// Account manager
    pub accounts: Arc<AccountManager>,
}

impl AppContext {
    /// Open the database at `db_path` (running migrations) and wire up the
    /// managers.
    pub async fn new(db_path: &Path) -> Result<Self> {
        let db = db::connect(db_path).await?;
        Ok(Self::from_pool(db))
    }

    /// Wire managers onto an existing pool.
    pub fn from_pool(db: SqlitePool) -> Self {
        Self {
            tokens: Arc::new(TokenManager::new(db.clone())),
            accounts: Arc::new(AccountManager::new(db.clone())),
            db,
        }
    }
}
