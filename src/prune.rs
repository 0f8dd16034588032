/// Expiry-based account pruning.
use crate::db::models::Account;
use crate::error::Result;
use serde::Serialize;
use sqlx::SqlitePool;

/// Outcome of one prune run.
#[derive(Debug, Default, Serialize)]
pub struct PruneReport {
    /// Accounts removed (or, on a dry run, that would be removed).
    pub pruned: Vec<Account>,
    /// Addresses that could not be deleted, with the error text.
    pub failed: Vec<(String, String)>,
    pub dry_run: bool,
}

/// Delete every account expired as of `as_of`.
///
/// Each account is deleted in its own statement so one failure never blocks
/// the rest of the sweep. A delete that matches zero rows means someone else
/// already removed the account; that still counts as pruned. Token
/// `use_count` values stay untouched throughout.
pub async fn prune(db: &SqlitePool, as_of: i64, dry_run: bool) -> Result<PruneReport> {
    let expired = sqlx::query_as::<_, Account>(
        "SELECT addr, password_hash, token_name, created_at, ttl_secs
         FROM accounts WHERE created_at + ttl_secs <= ?1 ORDER BY addr",
    )
    .bind(as_of)
    .fetch_all(db)
    .await?;

    if dry_run {
        return Ok(PruneReport {
            pruned: expired,
            failed: Vec::new(),
            dry_run: true,
        });
    }

    let mut report = PruneReport::default();

    for account in expired {
        match sqlx::query("DELETE FROM accounts WHERE addr = ?1")
            .bind(&account.addr)
            .execute(db)
            .await
        {
            Ok(result) => {
                if result.rows_affected() == 0 {
                    tracing::debug!("Account {} already removed", account.addr);
                } else {
                    tracing::info!("Pruned expired account: {}", account.addr);
                }
                report.pruned.push(account);
            }
            Err(e) => {
                tracing::warn!("Failed to prune {}: {}", account.addr, e);
                report.failed.push((account.addr.clone(), e.to_string()));
            }
        }
    }

    if !report.pruned.is_empty() {
        tracing::info!("Pruned {} expired accounts", report.pruned.len());
    }

    Ok(report)
}
