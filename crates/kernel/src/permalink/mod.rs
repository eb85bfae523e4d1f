//! Permalink routing.
//!
//! Maps public URL paths to content entities. An entity's path is the chain
//! of its ancestors' slugs followed by its own; only published entities get
//! a row in the permalink table.

mod router;
pub mod slug;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub use router::{PermalinkRouter, Resolved};
pub use slug::{is_valid_slug, normalize_path, slugify};

use crate::content::{ContentModel, EntityKind};

/// Router-facing projection of a content model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentEntity {
    pub id: Uuid,
    pub kind: EntityKind,
    pub slug: String,
    pub parent_id: Option<Uuid>,
    pub published: Option<DateTime<Utc>>,
    pub route: String,
}

impl ContentEntity {
    /// Project a saved model. Returns `None` for a model without an id.
    pub fn from_model(model: &ContentModel) -> Option<Self> {
        Some(Self {
            id: model.id?,
            kind: model.kind,
            slug: model.slug.clone(),
            parent_id: model.parent_id,
            published: model.published,
            route: model.route.clone(),
        })
    }

    pub fn is_published_at(&self, now: DateTime<Utc>) -> bool {
        self.published.is_some_and(|p| p <= now)
    }
}

/// Permalink routing errors.
#[derive(Debug, Error)]
pub enum PermalinkError {
    #[error("no published content at '{0}'")]
    NotFound(String),

    #[error("path '{path}' is already used by {existing}")]
    Conflict { path: String, existing: Uuid },

    #[error("content {0} is not registered")]
    UnknownEntity(Uuid),

    #[error("parent {0} does not exist")]
    UnknownParent(Uuid),

    #[error("placing {entity} under {parent} would create a cycle")]
    Cycle { entity: Uuid, parent: Uuid },

    #[error("content {0} still has children")]
    HasChildren(Uuid),

    #[error("content {0} has a write in flight; retry")]
    Busy(Uuid),

    #[error("'{0}' is not a valid slug")]
    InvalidSlug(String),

    #[error("content store failed: {0:#}")]
    Store(#[from] anyhow::Error),
}
