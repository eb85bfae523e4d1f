//! In-memory content store.
//!
//! Used when no database is configured and throughout the test suite.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use super::{ContentStore, EntityWrite, PermalinkEntry, UnitOfWork};
use crate::content::ContentModel;
use crate::permalink::ContentEntity;

/// Content store backed by process memory.
///
/// Cloning is cheap; clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    models: HashMap<Uuid, ContentModel>,
    permalinks: BTreeMap<String, PermalinkEntry>,
    commits: u64,
    fail_next: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `commit` fail without applying anything.
    pub fn fail_next_commit(&self) {
        self.inner.lock().fail_next = true;
    }

    /// Number of successfully applied units of work.
    pub fn commit_count(&self) -> u64 {
        self.inner.lock().commits
    }

    pub fn len(&self) -> usize {
        self.inner.lock().models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().models.is_empty()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn load(&self, id: Uuid) -> Result<Option<ContentModel>> {
        Ok(self.inner.lock().models.get(&id).cloned())
    }

    async fn entities(&self) -> Result<Vec<ContentEntity>> {
        Ok(self
            .inner
            .lock()
            .models
            .values()
            .filter_map(ContentEntity::from_model)
            .collect())
    }

    async fn permalinks(&self) -> Result<Vec<PermalinkEntry>> {
        Ok(self.inner.lock().permalinks.values().cloned().collect())
    }

    async fn commit(&self, work: UnitOfWork) -> Result<()> {
        let mut state = self.inner.lock();

        if state.fail_next {
            state.fail_next = false;
            bail!("memory store: injected commit failure");
        }

        // Validate everything before mutating so a rejected unit leaves no trace.
        let mut paths = state.permalinks.clone();
        for path in &work.permalinks.remove {
            paths.remove(path);
        }
        for entry in &work.permalinks.upsert {
            if let Some(existing) = paths.get(&entry.path)
                && existing.entity_id != entry.entity_id
            {
                bail!(
                    "memory store: path '{}' already belongs to {}",
                    entry.path,
                    existing.entity_id
                );
            }
            paths.insert(entry.path.clone(), entry.clone());
        }

        match work.write {
            EntityWrite::Save(model) => {
                let Some(id) = model.id else {
                    bail!("memory store: cannot save a model without an id");
                };
                state.models.insert(id, *model);
            }
            EntityWrite::Delete(id) => {
                state.models.remove(&id);
            }
            EntityWrite::None => {}
        }
        state.permalinks = paths;
        state.commits += 1;

        Ok(())
    }
}
