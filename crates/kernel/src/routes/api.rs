//! JSON API routes.
//!
//! Type introspection, type rebuilds, path resolution and the content
//! editing lifecycle. Content edits arrive as urlencoded form posts and are
//! bound by the polymorphic binder.

use axum::extract::{Form, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::content::{
    BlockTypeDefinition, BoundContent, BuildReport, ContentError, ContentModel, FieldSet,
    TypeDefinition,
};
use crate::context::KernelContext;
use crate::error::{AppError, AppResult};
use crate::permalink::{PermalinkError, Resolved};

/// Create the API router.
pub fn router() -> Router<KernelContext> {
    Router::new()
        .route("/api/types", get(list_types))
        .route("/api/types/rebuild", post(rebuild_types))
        .route("/api/types/{name}", get(get_type))
        .route("/api/types/{name}/content", post(create_content))
        .route("/api/block-types/{name}", get(get_block_type))
        .route("/api/resolve", get(resolve_path))
        .route(
            "/api/content/{id}",
            get(get_content).post(bind_content).delete(delete_content),
        )
        .route("/api/content/{id}/form", get(get_content_form))
}

// -------------------------------------------------------------------------
// Response types
// -------------------------------------------------------------------------

#[derive(Serialize)]
struct TypesResponse {
    generation: u64,
    page_types: Vec<TypeDefinition>,
    block_types: Vec<BlockTypeDefinition>,
}

#[derive(Serialize)]
struct FormResponse {
    id: Uuid,
    fields: FieldSet,
}

#[derive(Deserialize)]
struct ResolveQuery {
    path: String,
}

/// Map a content error, attaching a free path to permalink conflicts.
fn content_error(ctx: &KernelContext, err: ContentError) -> AppError {
    if let ContentError::Permalink(PermalinkError::Conflict { path, .. }) = &err {
        let suggestion = ctx.router().suggest_available(path);
        return AppError::Conflict {
            message: err.to_string(),
            suggestion: Some(suggestion),
        };
    }
    err.into()
}

// -------------------------------------------------------------------------
// Types
// -------------------------------------------------------------------------

async fn list_types(State(ctx): State<KernelContext>) -> Json<TypesResponse> {
    let generation = ctx.registry().snapshot();
    Json(TypesResponse {
        generation: generation.id(),
        page_types: generation.types().iter().map(|t| t.as_ref().clone()).collect(),
        block_types: generation
            .block_types()
            .iter()
            .map(|b| b.as_ref().clone())
            .collect(),
    })
}

async fn get_type(
    State(ctx): State<KernelContext>,
    Path(name): Path<String>,
) -> AppResult<Json<TypeDefinition>> {
    let definition = ctx.registry().resolve(&name)?;
    Ok(Json(definition.as_ref().clone()))
}

async fn get_block_type(
    State(ctx): State<KernelContext>,
    Path(name): Path<String>,
) -> AppResult<Json<BlockTypeDefinition>> {
    let definition = ctx.registry().resolve_block(&name)?;
    Ok(Json(definition.as_ref().clone()))
}

async fn rebuild_types(State(ctx): State<KernelContext>) -> AppResult<Json<BuildReport>> {
    if ctx.type_sources().is_empty() {
        return Err(AppError::BadRequest("no type sources configured".to_string()));
    }
    let report = ctx.rebuild_types()?;
    Ok(Json(report))
}

// -------------------------------------------------------------------------
// Resolution
// -------------------------------------------------------------------------

async fn resolve_path(
    State(ctx): State<KernelContext>,
    Query(query): Query<ResolveQuery>,
) -> AppResult<Json<Resolved>> {
    Ok(Json(ctx.router().resolve(&query.path)?))
}

// -------------------------------------------------------------------------
// Content
// -------------------------------------------------------------------------

async fn create_content(
    State(ctx): State<KernelContext>,
    Path(type_name): Path<String>,
    Form(fields): Form<FieldSet>,
) -> AppResult<(StatusCode, Json<BoundContent>)> {
    let bound = ctx
        .content()
        .create_from_form(&type_name, &fields)
        .await
        .map_err(|e| content_error(&ctx, e))?;
    Ok((StatusCode::CREATED, Json(bound)))
}

async fn get_content(
    State(ctx): State<KernelContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ContentModel>> {
    Ok(Json(ctx.content().load(id).await?))
}

async fn get_content_form(
    State(ctx): State<KernelContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<FormResponse>> {
    let fields = ctx.content().form_fields(id).await?;
    Ok(Json(FormResponse { id, fields }))
}

/// Bind a form post. Binding errors come back in the body with a 200: the
/// rest of the edit was saved.
async fn bind_content(
    State(ctx): State<KernelContext>,
    Path(id): Path<Uuid>,
    Form(fields): Form<FieldSet>,
) -> AppResult<Json<BoundContent>> {
    let bound = ctx
        .content()
        .bind(id, &fields)
        .await
        .map_err(|e| content_error(&ctx, e))?;
    Ok(Json(bound))
}

async fn delete_content(
    State(ctx): State<KernelContext>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    ctx.content().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
