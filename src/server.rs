/// HTTP server setup and routing
use crate::{
    context::AppContext,
    db,
    error::{Error, Result},
    jobs,
};
use axum::{
    http::{header, Method, StatusCode},
    response::Json,
    Router,
};
use serde_json::json;
use tokio::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Build the main application router
/// Returns Router<()> because state is already provided
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .merge(crate::api::routes())
        .with_state(ctx)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .fallback(not_found)
}

/// 404 handler
async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "NotFound",
            "message": "Endpoint not found"
        })),
    )
}

/// Start the HTTP server and the prune job.
pub async fn serve(ctx: AppContext, host: &str, port: u16, prune_every: Duration) -> Result<()> {
    // Refuse to serve an uninitialized database.
    let config = db::config(&ctx.db).await?;

    let addr = format!("{}:{}", host, port);
    info!("driftmail listening on {}", addr);
    info!("   Mail domain: {}", config.mail_domain);
    info!("   Redemption endpoint: {}", config.web_endpoint);

    jobs::spawn_prune_job(ctx.clone(), prune_every);

    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
