//! Content persistence.
//!
//! The permalink router hands every entity write to the store together with
//! the permalink changes it causes, as one [`UnitOfWork`]. Implementations
//! must apply a unit of work atomically: either the entity write and every
//! permalink change are persisted, or none are.

mod memory;
mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgContentStore;

use crate::content::{ContentModel, EntityKind};
use crate::permalink::ContentEntity;

/// One row of the permalink table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermalinkEntry {
    /// Normalized path, e.g. `/about/team`.
    pub path: String,
    pub entity_kind: EntityKind,
    pub entity_id: Uuid,
    /// Logical route handed to the rendering collaborator.
    pub route: String,
}

/// Permalink rows to write and paths to drop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermalinkChangeSet {
    pub upsert: Vec<PermalinkEntry>,
    pub remove: Vec<String>,
}

impl PermalinkChangeSet {
    pub fn is_empty(&self) -> bool {
        self.upsert.is_empty() && self.remove.is_empty()
    }
}

/// Entity half of a unit of work.
#[derive(Debug, Clone, Default)]
pub enum EntityWrite {
    Save(Box<ContentModel>),
    Delete(Uuid),
    /// Permalink-only change.
    #[default]
    None,
}

/// An entity write plus the permalink changes it implies.
#[derive(Debug, Clone, Default)]
pub struct UnitOfWork {
    pub write: EntityWrite,
    pub permalinks: PermalinkChangeSet,
}

impl UnitOfWork {
    pub fn save(model: ContentModel) -> Self {
        Self {
            write: EntityWrite::Save(Box::new(model)),
            permalinks: PermalinkChangeSet::default(),
        }
    }

    pub fn delete(id: Uuid) -> Self {
        Self {
            write: EntityWrite::Delete(id),
            permalinks: PermalinkChangeSet::default(),
        }
    }

    pub fn with_permalinks(mut self, permalinks: PermalinkChangeSet) -> Self {
        self.permalinks = permalinks;
        self
    }
}

/// Storage backend for content models and their permalinks.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Load a model by id. Returns `None` if it doesn't exist.
    async fn load(&self, id: Uuid) -> Result<Option<ContentModel>>;

    /// Router-facing projection of every stored entity.
    async fn entities(&self) -> Result<Vec<ContentEntity>>;

    /// Persisted permalink rows.
    async fn permalinks(&self) -> Result<Vec<PermalinkEntry>>;

    /// Apply a unit of work atomically.
    async fn commit(&self, work: UnitOfWork) -> Result<()>;

    /// Save a model without touching permalinks.
    ///
    /// Content saves should normally go through the permalink router so the
    /// table stays consistent; this is for imports and tests.
    async fn save(&self, model: &ContentModel) -> Result<()> {
        self.commit(UnitOfWork::save(model.clone())).await
    }

    /// Delete a model without touching permalinks.
    ///
    /// Returns `true` if a model was deleted, `false` if it didn't exist.
    async fn delete(&self, id: Uuid) -> Result<bool> {
        if self.load(id).await?.is_none() {
            return Ok(false);
        }
        self.commit(UnitOfWork::delete(id)).await?;
        Ok(true)
    }
}
