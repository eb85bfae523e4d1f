#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! Every [`TestApp`] runs the real kernel over its own in-memory store, so
//! tests are independent and need no database.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use tessera_kernel::content::{BuildReport, ContentModel, TypeBuilder};
use tessera_kernel::context::{ContextOptions, KernelContext};
use tessera_kernel::routes;
use tessera_kernel::store::MemoryStore;
use tessera_test_utils::{FormPost, site_document};

/// Test application wrapping a kernel context and its router.
pub struct TestApp {
    pub ctx: KernelContext,
    pub store: MemoryStore,
    router: Router,
}

impl TestApp {
    /// A context with the site fixture types loaded.
    pub fn new() -> Self {
        let app = Self::empty();
        app.build_types(site_document()).expect("fixture types build");
        app
    }

    /// A context with an empty type registry.
    pub fn empty() -> Self {
        Self::with_options(ContextOptions::default())
    }

    pub fn with_options(options: ContextOptions) -> Self {
        let store = MemoryStore::new();
        let ctx = KernelContext::new(Arc::new(store.clone()), options);
        let router = routes::app(ctx.clone());
        Self { ctx, store, router }
    }

    pub fn build_types(
        &self,
        document: Value,
    ) -> Result<BuildReport, tessera_kernel::content::BuildError> {
        TypeBuilder::new(self.ctx.registry().clone())
            .add_value("site.json", document)
            .build()
    }

    /// Make a request against the router.
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let response = self
            .request(Request::get(uri).body(Body::empty()).unwrap())
            .await;
        split(response).await
    }

    pub async fn post_form(&self, uri: &str, form: &FormPost) -> (StatusCode, Value) {
        let response = self
            .request(
                Request::post(uri)
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(form.to_urlencoded()))
                    .unwrap(),
            )
            .await;
        split(response).await
    }

    pub async fn delete(&self, uri: &str) -> StatusCode {
        self.request(Request::delete(uri).body(Body::empty()).unwrap())
            .await
            .status()
    }

    /// Save a published page of `type_name` directly through the service.
    pub async fn publish(
        &self,
        type_name: &str,
        slug: &str,
        parent: Option<uuid::Uuid>,
    ) -> ContentModel {
        let mut model = self.ctx.content().create(type_name).unwrap();
        model.title = slug.to_string();
        model.slug = slug.to_string();
        model.parent_id = parent;
        model.published = Some(chrono::Utc::now());
        self.ctx.content().save(model).await.unwrap().model
    }
}

/// Status and JSON body; `Value::Null` for empty bodies.
pub async fn split(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}
