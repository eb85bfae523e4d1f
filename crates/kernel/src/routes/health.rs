//! Health check endpoint.
//!
//! Returns 200 OK when the content store is reachable (always, for the
//! in-memory store), 503 Service Unavailable otherwise.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::context::KernelContext;

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    /// `None` when content is kept in memory.
    postgres: Option<bool>,
    type_generation: u64,
    permalinks: usize,
}

/// Health check handler.
async fn health_check(State(ctx): State<KernelContext>) -> (StatusCode, Json<HealthResponse>) {
    let postgres = ctx.postgres_healthy().await;
    let healthy = postgres.unwrap_or(true);

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(HealthResponse {
            status: if healthy { "healthy" } else { "unhealthy" },
            postgres,
            type_generation: ctx.registry().generation(),
            permalinks: ctx.router().len(),
        }),
    )
}

/// Create the health check router.
pub fn router() -> Router<KernelContext> {
    Router::new().route("/health", get(health_check))
}
