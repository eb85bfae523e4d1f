//! HTTP route handlers.

pub mod api;
pub mod front;
pub mod health;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::context::KernelContext;

/// Assemble every router with request tracing.
pub fn app(ctx: KernelContext) -> Router {
    Router::new()
        .merge(health::router())
        .merge(api::router())
        .merge(front::router())
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
