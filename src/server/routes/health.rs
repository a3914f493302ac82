//! Liveness endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::server::context::AppContext;

/// GET /health
///
/// Reports the process as up and whether the share database answers.
pub async fn health_check(State(ctx): State<AppContext>) -> impl IntoResponse {
    match ctx.store.list().await {
        Ok(shares) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "shares": shares.len() })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}
