/// HTTP API endpoints.
///
/// A single redemption endpoint plus a health probe. Everything else
/// (token administration, pruning) stays on the CLI: the web surface only
/// ever sees token secrets, never token management.
use crate::{context::AppContext, error::Result, sysfiles};
use axum::{
    extract::{Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/new_email", post(new_email))
        .route("/health", get(health))
}

#[derive(Debug, Deserialize)]
pub struct NewEmailQuery {
    /// Token secret value.
    t: String,
}

#[derive(Debug, Serialize)]
pub struct NewEmailResponse {
    pub email: String,
    pub password: String,
    /// Human-readable account lifetime ("1d", "4w").
    pub expiry: String,
    pub ttl_secs: i64,
}

/// Redeem a token secret for a fresh account.
///
/// The secret arrives as a query parameter; an unknown secret maps to 403
/// without echoing the value anywhere. Address and password are always
/// generated here, never caller-chosen.
async fn new_email(
    State(ctx): State<AppContext>,
    Query(query): Query<NewEmailQuery>,
) -> Result<Json<NewEmailResponse>> {
    let token = ctx.tokens.get_token_by_value(&query.t).await?;
    let created = ctx.accounts.create_account(&token.name, None, None).await?;

    tracing::info!(
        "Redeemed token {} for new account {}",
        token.name,
        created.account.addr
    );

    // The account exists either way; a failed regeneration is repaired by
    // the next mutation or prune cycle.
    if let Err(e) = sysfiles::regenerate(&ctx.db).await {
        tracing::warn!("Failed to regenerate virtual-user files: {}", e);
    }

    Ok(Json(NewEmailResponse {
        email: created.account.addr.clone(),
        password: created.password,
        expiry: crate::util::format_duration(created.account.ttl_secs),
        ttl_secs: created.account.ttl_secs,
    }))
}

/// Basic health check
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
