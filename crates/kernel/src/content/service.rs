//! Content service.
//!
//! Orchestrates the factory, binder, permalink router and store for the
//! create / edit / save / delete lifecycle of a content entity.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use super::binder::{BindingError, FieldSet, PolymorphicBinder};
use super::factory::ContentModelFactory;
use super::model::{ContentModel, parse_bool};
use super::type_registry::TypeError;
use crate::permalink::{ContentEntity, PermalinkError, PermalinkRouter, is_valid_slug, slugify};
use crate::store::{ContentStore, EntityWrite};

/// Form keys for model metadata. Lowercase so they never collide with region names.
pub mod meta_keys {
    pub const TITLE: &str = "title";
    pub const SLUG: &str = "slug";
    pub const PARENT_ID: &str = "parent_id";
    pub const PUBLISHED: &str = "published";
    pub const META_KEYWORDS: &str = "meta_keywords";
    pub const META_DESCRIPTION: &str = "meta_description";
    pub const EXCERPT: &str = "excerpt";
}

/// Content lifecycle errors.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Permalink(#[from] PermalinkError),

    #[error("content {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// A persisted model and where it lives.
#[derive(Debug, Clone, Serialize)]
pub struct SavedContent {
    pub model: ContentModel,
    /// Canonical path; resolvable only while the model is published.
    pub path: String,
}

/// Result of binding a form post and saving the outcome.
#[derive(Debug, Clone, Serialize)]
pub struct BoundContent {
    pub model: ContentModel,
    pub path: String,
    pub errors: Vec<BindingError>,
}

/// Service for content lifecycle operations.
#[derive(Clone)]
pub struct ContentService {
    inner: Arc<ContentServiceInner>,
}

struct ContentServiceInner {
    factory: ContentModelFactory,
    binder: PolymorphicBinder,
    router: Arc<PermalinkRouter>,
    store: Arc<dyn ContentStore>,
}

impl ContentService {
    pub fn new(
        factory: ContentModelFactory,
        binder: PolymorphicBinder,
        router: Arc<PermalinkRouter>,
        store: Arc<dyn ContentStore>,
    ) -> Self {
        Self {
            inner: Arc::new(ContentServiceInner {
                factory,
                binder,
                router,
                store,
            }),
        }
    }

    /// A new, unsaved model of `type_name`.
    pub fn create(&self, type_name: &str) -> Result<ContentModel, ContentError> {
        Ok(self.inner.factory.create(type_name)?)
    }

    pub async fn load(&self, id: Uuid) -> Result<ContentModel, ContentError> {
        self.inner
            .store
            .load(id)
            .await?
            .ok_or(ContentError::NotFound(id))
    }

    /// Persist a model and its permalink changes in one unit of work.
    ///
    /// Assigns an id to new models, derives the slug from the title when
    /// none is set, slugifies an invalid one, and touches `last_modified`.
    pub async fn save(&self, mut model: ContentModel) -> Result<SavedContent, ContentError> {
        self.inner.factory.registry().resolve(&model.type_name)?;

        let id = *model.id.get_or_insert_with(Uuid::now_v7);
        if !is_valid_slug(&model.slug) {
            let source = if model.slug.trim().is_empty() {
                &model.title
            } else {
                &model.slug
            };
            model.slug = slugify(source);
            if model.slug.is_empty() {
                model.slug = id.simple().to_string();
            }
        }
        model.last_modified = Utc::now();

        let entity = ContentEntity::from_model(&model).ok_or(ContentError::NotFound(id))?;
        let path = self
            .inner
            .router
            .register(entity, EntityWrite::Save(Box::new(model.clone())))
            .await?;

        info!(
            content_id = %id,
            type_name = %model.type_name,
            path = %path,
            published = model.published.is_some(),
            "content saved"
        );
        Ok(SavedContent { model, path })
    }

    /// Delete an entity and its permalink.
    pub async fn delete(&self, id: Uuid) -> Result<(), ContentError> {
        self.inner
            .router
            .unregister(id, EntityWrite::Delete(id))
            .await?;
        info!(content_id = %id, "content deleted");
        Ok(())
    }

    /// Bind a form post into a stored model and save the result.
    ///
    /// Binding errors don't prevent the save; they are returned so an editor
    /// can show what didn't take.
    pub async fn bind(
        &self,
        id: Uuid,
        fields: &[(String, String)],
    ) -> Result<BoundContent, ContentError> {
        let model = self.load(id).await?;
        self.bind_and_save(model, fields).await
    }

    /// Create a model of `type_name` from a form post and save it.
    pub async fn create_from_form(
        &self,
        type_name: &str,
        fields: &[(String, String)],
    ) -> Result<BoundContent, ContentError> {
        let model = self.create(type_name)?;
        self.bind_and_save(model, fields).await
    }

    async fn bind_and_save(
        &self,
        mut model: ContentModel,
        fields: &[(String, String)],
    ) -> Result<BoundContent, ContentError> {
        let mut errors = bind_metadata(&mut model, fields);
        let outcome = self.inner.binder.bind(model, fields)?;
        errors.extend(outcome.errors);

        let saved = self.save(outcome.model).await?;
        Ok(BoundContent {
            model: saved.model,
            path: saved.path,
            errors,
        })
    }

    /// Field set that pre-fills an edit form for `id`.
    pub async fn form_fields(&self, id: Uuid) -> Result<FieldSet, ContentError> {
        let model = self.load(id).await?;
        let mut fields = metadata_fields(&model);
        fields.extend(self.inner.binder.flatten(&model));
        Ok(fields)
    }

    pub fn router(&self) -> &Arc<PermalinkRouter> {
        &self.inner.router
    }
}

fn meta_error(key: &str, message: String) -> BindingError {
    BindingError::Field {
        region: String::new(),
        index: None,
        key: key.to_string(),
        message,
    }
}

/// Apply posted metadata keys to `model`.
pub fn bind_metadata(model: &mut ContentModel, fields: &[(String, String)]) -> Vec<BindingError> {
    let mut errors = Vec::new();

    for (key, value) in fields {
        match key.as_str() {
            meta_keys::TITLE => model.title = value.trim().to_string(),
            meta_keys::SLUG => model.slug = value.trim().to_string(),
            meta_keys::META_KEYWORDS => model.meta_keywords = value.clone(),
            meta_keys::META_DESCRIPTION => model.meta_description = value.clone(),
            meta_keys::EXCERPT => model.excerpt = value.clone(),
            meta_keys::PARENT_ID => match value.trim() {
                "" => model.parent_id = None,
                raw => match raw.parse::<Uuid>() {
                    Ok(id) => model.parent_id = Some(id),
                    Err(_) => errors.push(meta_error(key, format!("'{raw}' is not a content id"))),
                },
            },
            meta_keys::PUBLISHED => match value.trim() {
                "" => model.published = None,
                raw => match DateTime::parse_from_rfc3339(raw) {
                    Ok(at) => model.published = Some(at.with_timezone(&Utc)),
                    Err(_) => match parse_bool(raw) {
                        Some(true) => model.published = Some(model.published.unwrap_or_else(Utc::now)),
                        Some(false) => model.published = None,
                        None => errors.push(meta_error(
                            key,
                            format!("'{raw}' is neither a timestamp nor a boolean"),
                        )),
                    },
                },
            },
            _ => {}
        }
    }

    errors
}

/// Metadata keys for an edit form.
pub fn metadata_fields(model: &ContentModel) -> FieldSet {
    vec![
        (meta_keys::TITLE.to_string(), model.title.clone()),
        (meta_keys::SLUG.to_string(), model.slug.clone()),
        (
            meta_keys::PARENT_ID.to_string(),
            model.parent_id.map(|id| id.to_string()).unwrap_or_default(),
        ),
        (
            meta_keys::PUBLISHED.to_string(),
            model.published.map(|at| at.to_rfc3339()).unwrap_or_default(),
        ),
        (meta_keys::META_KEYWORDS.to_string(), model.meta_keywords.clone()),
        (
            meta_keys::META_DESCRIPTION.to_string(),
            model.meta_description.clone(),
        ),
        (meta_keys::EXCERPT.to_string(), model.excerpt.clone()),
    ]
}
