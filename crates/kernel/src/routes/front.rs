//! Permalink front controller.
//!
//! Every path not claimed by another router is resolved through the
//! permalink table. The response hands the rendering collaborator the
//! entity, its route and the loaded model.

use axum::extract::State;
use axum::http::Uri;
use axum::{Json, Router};
use serde::Serialize;
use uuid::Uuid;

use crate::content::{ContentModel, EntityKind};
use crate::context::KernelContext;
use crate::error::{AppError, AppResult};

#[derive(Serialize)]
struct FrontResponse {
    entity_id: Uuid,
    kind: EntityKind,
    route: String,
    path: String,
    model: ContentModel,
}

/// Resolve the request path and load its content.
async fn resolve_request(
    State(ctx): State<KernelContext>,
    uri: Uri,
) -> AppResult<Json<FrontResponse>> {
    let resolved = ctx.router().resolve(uri.path())?;
    tracing::debug!(path = %resolved.path, entity_id = %resolved.entity_id, "resolved permalink");

    let model = ctx.content().load(resolved.entity_id).await.map_err(|e| {
        // The table points at an entity the store no longer has.
        tracing::warn!(entity_id = %resolved.entity_id, error = %e, "stale permalink");
        AppError::NotFound(format!("no published content at '{}'", resolved.path))
    })?;

    Ok(Json(FrontResponse {
        entity_id: resolved.entity_id,
        kind: resolved.kind,
        route: resolved.route,
        path: resolved.path,
        model,
    }))
}

/// Create the front router. Merge it last: it installs the fallback.
pub fn router() -> Router<KernelContext> {
    Router::new().fallback(resolve_request)
}
