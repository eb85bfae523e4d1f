#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Permalink routing through the content service and the in-memory store.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;
use uuid::Uuid;

use tessera_kernel::content::{ContentError, ContentModel, EntityKind};
use tessera_kernel::permalink::{ContentEntity, PermalinkError, PermalinkRouter};
use tessera_kernel::store::{
    ContentStore, EntityWrite, MemoryStore, PermalinkEntry, UnitOfWork,
};

use common::TestApp;

/// Publish `/a`, `/a/b` and `/a/b/c`.
async fn chain(app: &TestApp) -> (ContentModel, ContentModel, ContentModel) {
    let a = app.publish("Standard", "a", None).await;
    let b = app.publish("Standard", "b", a.id).await;
    let c = app.publish("Standard", "c", b.id).await;
    (a, b, c)
}

fn entity(model: &ContentModel) -> ContentEntity {
    ContentEntity::from_model(model).unwrap()
}

#[tokio::test]
async fn test_canonical_path_joins_ancestor_slugs() {
    let app = TestApp::new();
    let (a, _, c) = chain(&app).await;
    let router = app.ctx.router();

    let resolved = router.resolve("/a/b/c").unwrap();
    assert_eq!(resolved.entity_id, c.id.unwrap());
    assert_eq!(resolved.route, "page");
    assert_eq!(router.canonical_path(c.id.unwrap()).unwrap(), "/a/b/c");
    assert_eq!(router.resolve("/A//b/c/?utm=1").unwrap().entity_id, c.id.unwrap());
    assert_eq!(router.resolve("/a").unwrap().entity_id, a.id.unwrap());
    assert_eq!(router.entries().len(), 3);
}

#[tokio::test]
async fn test_renaming_ancestor_moves_descendants_in_one_commit() {
    let app = TestApp::new();
    let (_, mut b, c) = chain(&app).await;
    let commits = app.store.commit_count();

    b.slug = "beta".into();
    let saved = app.ctx.content().save(b).await.unwrap();

    assert_eq!(saved.path, "/a/beta");
    assert_eq!(app.store.commit_count(), commits + 1);

    let router = app.ctx.router();
    assert_eq!(router.resolve("/a/beta/c").unwrap().entity_id, c.id.unwrap());
    assert!(matches!(router.resolve("/a/b/c"), Err(PermalinkError::NotFound(_))));
    assert!(matches!(router.resolve("/a/b"), Err(PermalinkError::NotFound(_))));

    let paths: Vec<String> = router.entries().into_iter().map(|e| e.path).collect();
    assert_eq!(paths, vec!["/a", "/a/beta", "/a/beta/c"]);
}

#[tokio::test]
async fn test_moving_entity_under_new_parent() {
    let app = TestApp::new();
    let (a, _, mut c) = chain(&app).await;

    c.parent_id = a.id;
    let saved = app.ctx.content().save(c).await.unwrap();
    assert_eq!(saved.path, "/a/c");
    assert!(app.ctx.router().resolve("/a/b/c").is_err());
}

#[tokio::test]
async fn test_valid_slugs_are_kept_as_written() {
    let app = TestApp::new();
    let kept = app.publish("Standard", "team_2024", None).await;
    assert_eq!(kept.slug, "team_2024");
    assert!(app.ctx.router().resolve("/team_2024").is_ok());

    let cleaned = app.publish("Standard", "Team 2024!", None).await;
    assert_eq!(cleaned.slug, "team-2024");

    let mut untitled = app.ctx.content().create("Standard").unwrap();
    untitled.title = "Our Team".into();
    let saved = app.ctx.content().save(untitled).await.unwrap();
    assert_eq!(saved.path, "/our-team");
}

#[tokio::test]
async fn test_conflict_leaves_mapping_untouched() {
    let app = TestApp::new();
    let about = app.publish("Standard", "about", None).await;
    let entries = app.ctx.router().entries();
    let stored = app.store.len();

    let mut duplicate = app.ctx.content().create("Standard").unwrap();
    duplicate.slug = "about".into();
    duplicate.published = Some(chrono::Utc::now());
    let err = app.ctx.content().save(duplicate).await.unwrap_err();

    assert!(matches!(
        err,
        ContentError::Permalink(PermalinkError::Conflict { ref path, existing })
            if path == "/about" && Some(existing) == about.id
    ));
    assert_eq!(app.ctx.router().entries(), entries);
    assert_eq!(app.store.len(), stored);
    assert_eq!(app.ctx.router().suggest_available("/about"), "/about-1");
}

#[tokio::test]
async fn test_reregistering_same_path_is_a_no_op() {
    let app = TestApp::new();
    let (_, b, _) = chain(&app).await;
    let commits = app.store.commit_count();
    let entries = app.ctx.router().entries();

    let path = app
        .ctx
        .router()
        .register(entity(&b), EntityWrite::None)
        .await
        .unwrap();

    assert_eq!(path, "/a/b");
    assert_eq!(app.store.commit_count(), commits);
    assert_eq!(app.ctx.router().entries(), entries);
}

#[tokio::test]
async fn test_failed_commit_rolls_back_everything() {
    let app = TestApp::new();
    let (_, b, c) = chain(&app).await;
    let entries = app.ctx.router().entries();

    app.store.fail_next_commit();
    let mut renamed = b.clone();
    renamed.slug = "beta".into();
    let err = app.ctx.content().save(renamed.clone()).await.unwrap_err();
    assert!(matches!(err, ContentError::Permalink(PermalinkError::Store(_))));

    assert_eq!(app.ctx.router().entries(), entries);
    assert_eq!(app.ctx.router().resolve("/a/b/c").unwrap().entity_id, c.id.unwrap());
    let stored = app.ctx.content().load(b.id.unwrap()).await.unwrap();
    assert_eq!(stored.slug, "b");

    // The reservation was released, so the retry goes through.
    let saved = app.ctx.content().save(renamed).await.unwrap();
    assert_eq!(saved.path, "/a/beta");
}

#[tokio::test]
async fn test_delete_refused_while_children_exist() {
    let app = TestApp::new();
    let (a, b, c) = chain(&app).await;

    let err = app.ctx.content().delete(b.id.unwrap()).await.unwrap_err();
    assert!(matches!(
        err,
        ContentError::Permalink(PermalinkError::HasChildren(id)) if Some(id) == b.id
    ));
    assert!(app.ctx.router().resolve("/a/b").is_ok());

    app.ctx.content().delete(c.id.unwrap()).await.unwrap();
    app.ctx.content().delete(b.id.unwrap()).await.unwrap();
    assert!(app.ctx.router().resolve("/a/b").is_err());
    assert!(matches!(
        app.ctx.content().load(b.id.unwrap()).await,
        Err(ContentError::NotFound(_))
    ));
    assert_eq!(app.ctx.router().entries().len(), 1);
    assert!(app.ctx.router().resolve("/a").is_ok_and(|r| Some(r.entity_id) == a.id));
}

#[tokio::test]
async fn test_cycles_are_rejected() {
    let app = TestApp::new();
    let (mut a, _, c) = chain(&app).await;

    a.parent_id = c.id;
    let err = app.ctx.content().save(a.clone()).await.unwrap_err();
    assert!(matches!(err, ContentError::Permalink(PermalinkError::Cycle { .. })));

    a.parent_id = a.id;
    let err = app.ctx.content().save(a).await.unwrap_err();
    assert!(matches!(err, ContentError::Permalink(PermalinkError::Cycle { .. })));
    assert_eq!(app.ctx.router().canonical_path(c.id.unwrap()).unwrap(), "/a/b/c");
}

#[tokio::test]
async fn test_unpublished_parent_keeps_children_resolvable() {
    let app = TestApp::new();
    let (_, mut b, c) = chain(&app).await;

    b.published = None;
    app.ctx.content().save(b).await.unwrap();

    assert!(app.ctx.router().resolve("/a/b").is_err());
    assert_eq!(
        app.ctx.router().resolve("/a/b/c").unwrap().entity_id,
        c.id.unwrap()
    );
}

#[tokio::test]
async fn test_warm_rebuilds_table_from_store() {
    let app = TestApp::new();
    let (_, _, c) = chain(&app).await;

    let fresh = PermalinkRouter::new(Arc::new(app.store.clone()));
    assert!(fresh.resolve("/a/b/c").is_err());

    let count = fresh.warm().await.unwrap();
    assert_eq!(count, 3);
    assert_eq!(fresh.resolve("/a/b/c").unwrap().entity_id, c.id.unwrap());
    assert_eq!(fresh.entries(), app.ctx.router().entries());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_on_one_path() {
    let app = TestApp::new();

    let mut first = app.ctx.content().create("Standard").unwrap();
    first.slug = "news".into();
    first.published = Some(chrono::Utc::now());
    let mut second = first.clone();
    second.title = "Second".into();

    let (left, right) = tokio::join!(
        app.ctx.content().save(first),
        app.ctx.content().save(second),
    );

    let outcomes = [left.is_ok(), right.is_ok()];
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
    assert_eq!(app.ctx.router().entries().len(), 1);
    assert_eq!(app.store.len(), 1);
}

/// Memory store whose next commit, once armed, waits until released.
#[derive(Default)]
struct GatedStore {
    inner: MemoryStore,
    armed: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl GatedStore {
    fn hold_next_commit(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    async fn held(&self) {
        self.entered.notified().await;
    }
}

#[async_trait]
impl ContentStore for GatedStore {
    async fn load(&self, id: Uuid) -> anyhow::Result<Option<ContentModel>> {
        self.inner.load(id).await
    }

    async fn entities(&self) -> anyhow::Result<Vec<ContentEntity>> {
        self.inner.entities().await
    }

    async fn permalinks(&self) -> anyhow::Result<Vec<PermalinkEntry>> {
        self.inner.permalinks().await
    }

    async fn commit(&self, work: UnitOfWork) -> anyhow::Result<()> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.commit(work).await
    }
}

fn node(slug: &str, parent: Option<Uuid>) -> ContentEntity {
    ContentEntity {
        id: Uuid::now_v7(),
        kind: EntityKind::Page,
        slug: slug.to_string(),
        parent_id: parent,
        published: Some(Utc::now()),
        route: "page".to_string(),
    }
}

fn renamed(entity: &ContentEntity, slug: &str) -> ContentEntity {
    ContentEntity {
        slug: slug.to_string(),
        ..entity.clone()
    }
}

/// A gated router holding `/a`, `/a/b` and `/a/b/c`.
async fn gated_chain() -> (
    Arc<GatedStore>,
    Arc<PermalinkRouter>,
    [ContentEntity; 3],
) {
    let store = Arc::new(GatedStore::default());
    let router = Arc::new(PermalinkRouter::new(store.clone()));
    let a = node("a", None);
    let b = node("b", Some(a.id));
    let c = node("c", Some(b.id));
    for entity in [&a, &b, &c] {
        router.register(entity.clone(), EntityWrite::None).await.unwrap();
    }
    (store, router, [a, b, c])
}

/// Every canonical path resolves, and the store holds the same rows.
async fn assert_consistent(store: &GatedStore, router: &PermalinkRouter, ids: &[Uuid]) {
    for id in ids {
        let path = router.canonical_path(*id).unwrap();
        assert_eq!(router.resolve(&path).unwrap().entity_id, *id, "{path}");
    }
    let stored = store.permalinks().await.unwrap();
    assert_eq!(stored, router.entries());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_writes_overlapping_a_pending_rename_are_refused() {
    let (store, router, [a, b, c]) = gated_chain().await;

    store.hold_next_commit();
    let rename = tokio::spawn({
        let router = router.clone();
        let beta = renamed(&b, "beta");
        async move { router.register(beta, EntityWrite::None).await }
    });
    store.held().await;

    // The pending rename re-paths b and c.
    assert!(matches!(
        router.register(renamed(&c, "gamma"), EntityWrite::None).await,
        Err(PermalinkError::Busy(id)) if id == c.id
    ));
    assert!(matches!(
        router.register(node("d", Some(c.id)), EntityWrite::None).await,
        Err(PermalinkError::Busy(_))
    ));
    assert!(matches!(
        router.register(renamed(&a, "alpha"), EntityWrite::None).await,
        Err(PermalinkError::Busy(_))
    ));
    assert!(matches!(
        router.unregister(c.id, EntityWrite::None).await,
        Err(PermalinkError::Busy(id)) if id == c.id
    ));

    // Outside the subtree, writes go through.
    let sibling = node("e", Some(a.id));
    assert_eq!(
        router.register(sibling.clone(), EntityWrite::None).await.unwrap(),
        "/a/e"
    );

    store.release.notify_one();
    assert_eq!(rename.await.unwrap().unwrap(), "/a/beta");

    let path = router
        .register(renamed(&c, "gamma"), EntityWrite::None)
        .await
        .unwrap();
    assert_eq!(path, "/a/beta/gamma");
    assert_consistent(&store, &router, &[a.id, b.id, c.id, sibling.id]).await;
    let paths: Vec<String> = router.entries().into_iter().map(|e| e.path).collect();
    assert_eq!(paths, vec!["/a", "/a/beta", "/a/beta/gamma", "/a/e"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pending_child_blocks_parent_rename_and_delete() {
    let (store, router, [a, b, c]) = gated_chain().await;

    store.hold_next_commit();
    let child = node("d", Some(c.id));
    let create = tokio::spawn({
        let router = router.clone();
        let child = child.clone();
        async move { router.register(child, EntityWrite::None).await }
    });
    store.held().await;

    assert!(matches!(
        router.unregister(c.id, EntityWrite::None).await,
        Err(PermalinkError::HasChildren(id)) if id == c.id
    ));
    assert!(matches!(
        router.register(renamed(&b, "beta"), EntityWrite::None).await,
        Err(PermalinkError::Busy(id)) if id == c.id
    ));
    // A second child under the same parent is independent.
    let twin = node("twin", Some(c.id));
    router.register(twin.clone(), EntityWrite::None).await.unwrap();

    store.release.notify_one();
    assert_eq!(create.await.unwrap().unwrap(), "/a/b/c/d");

    router
        .register(renamed(&b, "beta"), EntityWrite::None)
        .await
        .unwrap();
    assert_eq!(router.canonical_path(child.id).unwrap(), "/a/beta/c/d");
    assert_consistent(&store, &router, &[a.id, b.id, c.id, child.id, twin.id]).await;
}
