//! Permalink router.
//!
//! Keeps the permalink table in memory for O(1) resolution and writes every
//! change through the content store as part of the entity's own unit of
//! work. The table lock is never held across a store commit: paths a pending
//! write is about to claim are reserved instead, so concurrent writers see
//! them as taken. The entities a pending write re-paths are marked busy, and
//! overlapping writes are refused until it lands.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::slug::{is_valid_slug, join_path, normalize_path};
use super::{ContentEntity, PermalinkError};
use crate::content::EntityKind;
use crate::store::{ContentStore, EntityWrite, PermalinkChangeSet, PermalinkEntry, UnitOfWork};

/// A successful path resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolved {
    pub entity_id: Uuid,
    pub kind: EntityKind,
    /// Logical route for the rendering collaborator.
    pub route: String,
    /// The normalized path that matched.
    pub path: String,
}

#[derive(Default)]
struct RouterState {
    nodes: HashMap<Uuid, ContentEntity>,
    children: HashMap<Uuid, BTreeSet<Uuid>>,
    by_path: HashMap<String, PermalinkEntry>,
    by_entity: HashMap<Uuid, String>,
    /// Paths claimed by writes whose commit is in flight.
    pending: HashMap<String, Uuid>,
    /// Entities whose delete is in flight.
    retiring: HashSet<Uuid>,
    /// Entities whose path a pending registration rewrites.
    busy: HashSet<Uuid>,
    /// Pending registrations per parent they are placed under.
    incoming: HashMap<Uuid, usize>,
}

/// A validated registration holding its reservations.
struct Plan {
    path: String,
    changes: PermalinkChangeSet,
    affected: Vec<Uuid>,
    parent: Option<Uuid>,
}

impl RouterState {
    /// Join the slug chain from the root down to `id`.
    fn path_of(&self, id: Uuid) -> Option<String> {
        let mut slugs = Vec::new();
        let mut current = Some(id);
        while let Some(cid) = current {
            if slugs.len() > self.nodes.len() {
                return None;
            }
            let node = self.nodes.get(&cid)?;
            slugs.push(node.slug.as_str());
            current = node.parent_id;
        }
        slugs.reverse();
        Some(format!("/{}", slugs.join("/")))
    }

    fn has_children(&self, id: Uuid) -> bool {
        self.children.get(&id).is_some_and(|c| !c.is_empty())
            || self.incoming.get(&id).is_some_and(|n| *n > 0)
    }

    fn is_busy(&self, id: Uuid) -> bool {
        self.busy.contains(&id) || self.retiring.contains(&id)
    }

    /// First busy entity on the parent chain starting at `from`.
    fn busy_ancestor(&self, from: Uuid) -> Option<Uuid> {
        let mut current = Some(from);
        let mut steps = 0;
        while let Some(cid) = current {
            if self.is_busy(cid) {
                return Some(cid);
            }
            steps += 1;
            if steps > self.nodes.len() {
                return None;
            }
            current = self.nodes.get(&cid).and_then(|n| n.parent_id);
        }
        None
    }

    /// Whether `ancestor` appears on the parent chain starting at `from`.
    fn chain_contains(&self, from: Uuid, ancestor: Uuid) -> bool {
        let mut current = Some(from);
        let mut steps = 0;
        while let Some(cid) = current {
            if cid == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.nodes.len() {
                return true;
            }
            current = self.nodes.get(&cid).and_then(|n| n.parent_id);
        }
        false
    }

    fn insert_node(&mut self, entity: ContentEntity) {
        if let Some(old_parent) = self.nodes.get(&entity.id).and_then(|old| old.parent_id)
            && Some(old_parent) != entity.parent_id
            && let Some(siblings) = self.children.get_mut(&old_parent)
        {
            siblings.remove(&entity.id);
        }
        if let Some(parent) = entity.parent_id {
            self.children.entry(parent).or_default().insert(entity.id);
        }
        self.nodes.insert(entity.id, entity);
    }

    fn remove_node(&mut self, id: Uuid) {
        if let Some(parent) = self.nodes.remove(&id).and_then(|old| old.parent_id)
            && let Some(siblings) = self.children.get_mut(&parent)
        {
            siblings.remove(&id);
        }
        self.children.remove(&id);
    }

    fn apply(&mut self, changes: &PermalinkChangeSet) {
        for path in &changes.remove {
            if let Some(entry) = self.by_path.remove(path)
                && self.by_entity.get(&entry.entity_id) == Some(path)
            {
                self.by_entity.remove(&entry.entity_id);
            }
        }
        for entry in &changes.upsert {
            self.by_entity.insert(entry.entity_id, entry.path.clone());
            self.by_path.insert(entry.path.clone(), entry.clone());
        }
    }

    fn release(&mut self, plan: &Plan) {
        for entry in &plan.changes.upsert {
            if self.pending.get(&entry.path) == Some(&entry.entity_id) {
                self.pending.remove(&entry.path);
            }
        }
        for id in &plan.affected {
            self.busy.remove(id);
        }
        if let Some(parent) = plan.parent
            && let Some(count) = self.incoming.get_mut(&parent)
        {
            *count -= 1;
            if *count == 0 {
                self.incoming.remove(&parent);
            }
        }
    }

    fn is_taken(&self, path: &str) -> bool {
        self.by_path.contains_key(path) || self.pending.contains_key(path)
    }
}

fn entry_for(entity: &ContentEntity, path: String) -> PermalinkEntry {
    PermalinkEntry {
        path,
        entity_kind: entity.kind,
        entity_id: entity.id,
        route: entity.route.clone(),
    }
}

/// Resolves public paths to content entities.
pub struct PermalinkRouter {
    store: Arc<dyn ContentStore>,
    state: RwLock<RouterState>,
}

impl PermalinkRouter {
    /// Create an empty router. Call [`warm`](Self::warm) to load existing content.
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self {
            store,
            state: RwLock::new(RouterState::default()),
        }
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    /// Resolve a request path to the published entity it names.
    pub fn resolve(&self, path: &str) -> Result<Resolved, PermalinkError> {
        let path = normalize_path(path);
        let state = self.state.read();

        let entry = state
            .by_path
            .get(&path)
            .ok_or_else(|| PermalinkError::NotFound(path.clone()))?;
        let live = state
            .nodes
            .get(&entry.entity_id)
            .is_some_and(|n| n.is_published_at(Utc::now()));
        if !live {
            return Err(PermalinkError::NotFound(path));
        }

        Ok(Resolved {
            entity_id: entry.entity_id,
            kind: entry.entity_kind,
            route: entry.route.clone(),
            path: entry.path.clone(),
        })
    }

    /// The path an entity lives at, published or not.
    pub fn canonical_path(&self, id: Uuid) -> Result<String, PermalinkError> {
        self.state
            .read()
            .path_of(id)
            .ok_or(PermalinkError::UnknownEntity(id))
    }

    pub fn entity(&self, id: Uuid) -> Option<ContentEntity> {
        self.state.read().nodes.get(&id).cloned()
    }

    /// Number of rows in the permalink table.
    pub fn len(&self) -> usize {
        self.state.read().by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Permalink table rows ordered by path.
    pub fn entries(&self) -> Vec<PermalinkEntry> {
        let state = self.state.read();
        let mut entries: Vec<PermalinkEntry> = state.by_path.values().cloned().collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }

    /// Register or update an entity and commit `write` with the resulting
    /// permalink changes.
    ///
    /// Moving or renaming an entity rewrites the paths of all its descendants
    /// in the same unit of work. Returns the entity's canonical path.
    ///
    /// Fails with [`PermalinkError::Busy`] while another write in flight
    /// re-paths the entity, one of its ancestors or descendants, or places a
    /// new child somewhere in its subtree.
    pub async fn register(
        &self,
        entity: ContentEntity,
        write: EntityWrite,
    ) -> Result<String, PermalinkError> {
        if !is_valid_slug(&entity.slug) {
            return Err(PermalinkError::InvalidSlug(entity.slug));
        }

        let plan = self.plan_register(&entity)?;

        if plan.changes.is_empty() && matches!(write, EntityWrite::None) {
            let mut state = self.state.write();
            state.release(&plan);
            state.insert_node(entity);
            return Ok(plan.path);
        }

        let work = UnitOfWork {
            write,
            permalinks: plan.changes.clone(),
        };
        let result = self.store.commit(work).await;

        let mut state = self.state.write();
        state.release(&plan);
        if let Err(err) = result {
            warn!(
                entity_id = %entity.id,
                path = %plan.path,
                error = %err,
                "content commit failed"
            );
            return Err(PermalinkError::Store(err));
        }
        let id = entity.id;
        state.insert_node(entity);
        state.apply(&plan.changes);

        debug!(
            entity_id = %id,
            path = %plan.path,
            upserted = plan.changes.upsert.len(),
            removed = plan.changes.remove.len(),
            "registered content"
        );
        Ok(plan.path)
    }

    /// Validate a registration and reserve the paths and entities it will
    /// touch. The caller must hand the plan back to `release`.
    fn plan_register(&self, entity: &ContentEntity) -> Result<Plan, PermalinkError> {
        let mut state = self.state.write();

        let parent_path = match entity.parent_id {
            Some(parent) => {
                if !state.nodes.contains_key(&parent) || state.retiring.contains(&parent) {
                    return Err(PermalinkError::UnknownParent(parent));
                }
                if state.chain_contains(parent, entity.id) {
                    return Err(PermalinkError::Cycle {
                        entity: entity.id,
                        parent,
                    });
                }
                if let Some(busy) = state.busy_ancestor(parent) {
                    return Err(PermalinkError::Busy(busy));
                }
                Some(
                    state
                        .path_of(parent)
                        .ok_or(PermalinkError::UnknownParent(parent))?,
                )
            }
            None => None,
        };
        let own_path = join_path(parent_path.as_deref(), &entity.slug);

        // Desired rows for the entity and every descendant.
        let mut desired = vec![(
            entity.id,
            entity
                .published
                .is_some()
                .then(|| entry_for(entity, own_path.clone())),
        )];
        let mut queue = VecDeque::from([(entity.id, own_path.clone())]);
        while let Some((id, path)) = queue.pop_front() {
            for child in state.children.get(&id).into_iter().flatten() {
                let Some(node) = state.nodes.get(child) else {
                    continue;
                };
                let child_path = join_path(Some(&path), &node.slug);
                desired.push((
                    node.id,
                    node.published
                        .is_some()
                        .then(|| entry_for(node, child_path.clone())),
                ));
                queue.push_back((node.id, child_path));
            }
        }

        let affected: HashSet<Uuid> = desired.iter().map(|(id, _)| *id).collect();
        // A pending write on any of these, or a pending child under one of
        // them, would land on paths this plan is computing from.
        if let Some(busy) = affected
            .iter()
            .copied()
            .find(|id| state.is_busy(*id) || state.incoming.contains_key(id))
        {
            return Err(PermalinkError::Busy(busy));
        }
        let mut changes = PermalinkChangeSet::default();
        for (id, entry) in desired {
            let old = state.by_entity.get(&id);
            match entry {
                Some(entry) => {
                    if old == Some(&entry.path) && state.by_path.get(&entry.path) == Some(&entry) {
                        continue;
                    }
                    if let Some(old) = old
                        && *old != entry.path
                    {
                        changes.remove.push(old.clone());
                    }
                    changes.upsert.push(entry);
                }
                None => {
                    if let Some(old) = old {
                        changes.remove.push(old.clone());
                    }
                }
            }
        }

        for entry in &changes.upsert {
            if let Some(existing) = state.by_path.get(&entry.path)
                && existing.entity_id != entry.entity_id
            {
                let vacated = affected.contains(&existing.entity_id)
                    && changes.remove.contains(&entry.path);
                if !vacated {
                    return Err(PermalinkError::Conflict {
                        path: entry.path.clone(),
                        existing: existing.entity_id,
                    });
                }
            }
            if let Some(owner) = state.pending.get(&entry.path)
                && *owner != entry.entity_id
            {
                return Err(PermalinkError::Conflict {
                    path: entry.path.clone(),
                    existing: *owner,
                });
            }
        }

        for entry in &changes.upsert {
            state.pending.insert(entry.path.clone(), entry.entity_id);
        }
        state.busy.extend(affected.iter().copied());
        if let Some(parent) = entity.parent_id {
            *state.incoming.entry(parent).or_default() += 1;
        }

        Ok(Plan {
            path: own_path,
            changes,
            affected: affected.into_iter().collect(),
            parent: entity.parent_id,
        })
    }

    /// Remove an entity's permalink and commit `write` in the same unit of work.
    ///
    /// Refused while the entity still has children, including children whose
    /// registration is in flight, and while a pending write re-paths it.
    pub async fn unregister(&self, id: Uuid, write: EntityWrite) -> Result<(), PermalinkError> {
        let changes = {
            let mut state = self.state.write();
            if !state.nodes.contains_key(&id) || state.retiring.contains(&id) {
                return Err(PermalinkError::UnknownEntity(id));
            }
            if state.has_children(id) {
                return Err(PermalinkError::HasChildren(id));
            }
            if state.busy.contains(&id) {
                return Err(PermalinkError::Busy(id));
            }
            state.retiring.insert(id);
            PermalinkChangeSet {
                upsert: Vec::new(),
                remove: state.by_entity.get(&id).cloned().into_iter().collect(),
            }
        };

        let result = self
            .store
            .commit(UnitOfWork {
                write,
                permalinks: changes.clone(),
            })
            .await;

        let mut state = self.state.write();
        state.retiring.remove(&id);
        if let Err(err) = result {
            warn!(entity_id = %id, error = %err, "content delete failed");
            return Err(PermalinkError::Store(err));
        }
        state.apply(&changes);
        state.remove_node(id);

        debug!(entity_id = %id, "unregistered content");
        Ok(())
    }

    /// Rebuild the table from every entity in the store.
    ///
    /// Returns the number of permalink rows. Entities whose parent is missing
    /// or whose path collides with an older entity are logged and skipped.
    pub async fn warm(&self) -> Result<usize, PermalinkError> {
        let entities = self.store.entities().await?;
        let total = entities.len();

        let mut fresh = RouterState::default();
        for entity in entities {
            fresh.insert_node(entity);
        }

        // UUIDv7 ids sort by creation, so the oldest entity keeps a contested path.
        let mut ids: Vec<Uuid> = fresh.nodes.keys().copied().collect();
        ids.sort();
        for id in ids {
            let Some(node) = fresh.nodes.get(&id) else {
                continue;
            };
            if node.published.is_none() {
                continue;
            }
            let Some(path) = fresh.path_of(id) else {
                warn!(entity_id = %id, "content has a missing ancestor; no permalink");
                continue;
            };
            if let Some(existing) = fresh.by_path.get(&path) {
                warn!(
                    entity_id = %id,
                    existing = %existing.entity_id,
                    path = %path,
                    "duplicate permalink; keeping the older entity"
                );
                continue;
            }
            let entry = entry_for(node, path.clone());
            fresh.by_entity.insert(id, path.clone());
            fresh.by_path.insert(path, entry);
        }

        let count = fresh.by_path.len();
        {
            let mut state = self.state.write();
            fresh.pending = std::mem::take(&mut state.pending);
            fresh.retiring = std::mem::take(&mut state.retiring);
            fresh.busy = std::mem::take(&mut state.busy);
            fresh.incoming = std::mem::take(&mut state.incoming);
            *state = fresh;
        }

        info!(entities = total, permalinks = count, "permalink table warmed");
        Ok(count)
    }

    /// Propose a free path close to `path`.
    ///
    /// Tries the path itself, then `path-1` through `path-99`, then a random
    /// suffix.
    pub fn suggest_available(&self, path: &str) -> String {
        let base = normalize_path(path);
        let state = self.state.read();
        if !state.is_taken(&base) {
            return base;
        }
        (1..=99)
            .map(|n| format!("{base}-{n}"))
            .find(|candidate| !state.is_taken(candidate))
            .unwrap_or_else(|| {
                let id = Uuid::now_v7().simple().to_string();
                format!("{base}-{}", &id[id.len() - 8..])
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn page(slug: &str, parent: Option<Uuid>) -> ContentEntity {
        ContentEntity {
            id: Uuid::now_v7(),
            kind: EntityKind::Page,
            slug: slug.to_string(),
            parent_id: parent,
            published: Some(Utc::now()),
            route: "page".to_string(),
        }
    }

    fn router() -> (PermalinkRouter, MemoryStore) {
        let store = MemoryStore::new();
        (PermalinkRouter::new(Arc::new(store.clone())), store)
    }

    #[tokio::test]
    async fn register_and_resolve_nested() {
        let (router, _) = router();
        let about = page("about", None);
        let team = page("team", Some(about.id));

        router.register(about.clone(), EntityWrite::None).await.unwrap();
        let path = router.register(team.clone(), EntityWrite::None).await.unwrap();

        assert_eq!(path, "/about/team");
        let resolved = router.resolve("/About/Team/").unwrap();
        assert_eq!(resolved.entity_id, team.id);
        assert_eq!(resolved.route, "page");
        assert_eq!(router.canonical_path(team.id).unwrap(), "/about/team");
    }

    #[tokio::test]
    async fn rejects_invalid_slug_and_unknown_parent() {
        let (router, _) = router();
        assert!(matches!(
            router.register(page("", None), EntityWrite::None).await,
            Err(PermalinkError::InvalidSlug(_))
        ));
        let missing = Uuid::now_v7();
        assert!(matches!(
            router.register(page("x", Some(missing)), EntityWrite::None).await,
            Err(PermalinkError::UnknownParent(id)) if id == missing
        ));
    }

    #[tokio::test]
    async fn unchanged_registration_commits_nothing() {
        let (router, store) = router();
        let about = page("about", None);
        router.register(about.clone(), EntityWrite::None).await.unwrap();
        assert_eq!(store.commit_count(), 1);

        router.register(about, EntityWrite::None).await.unwrap();
        assert_eq!(store.commit_count(), 1);
    }

    #[tokio::test]
    async fn scheduled_content_does_not_resolve_yet() {
        let (router, _) = router();
        let mut later = page("later", None);
        later.published = Some(Utc::now() + chrono::Duration::days(1));
        router.register(later, EntityWrite::None).await.unwrap();

        assert!(matches!(
            router.resolve("/later"),
            Err(PermalinkError::NotFound(_))
        ));
        assert_eq!(router.suggest_available("/later"), "/later-1");
    }

    #[tokio::test]
    async fn suggest_available_skips_taken_paths() {
        let (router, _) = router();
        router.register(page("news", None), EntityWrite::None).await.unwrap();
        router.register(page("news-1", None), EntityWrite::None).await.unwrap();
        assert_eq!(router.len(), 2);

        assert_eq!(router.suggest_available("/fresh"), "/fresh");
        assert_eq!(router.suggest_available("/News/"), "/news-2");
    }
}
