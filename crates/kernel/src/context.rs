//! Kernel context shared across all handlers.
//!
//! Holds the type registry, the content collaborators built on it, and the
//! store handle. Nothing here is global: every context is independent, so
//! tests can build as many as they need.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;

use crate::config::Config;
use crate::content::{
    BuildError, BuildReport, ContentModelFactory, ContentService, PolymorphicBinder, TypeBuilder,
    TypeRegistry,
};
use crate::db;
use crate::permalink::PermalinkRouter;
use crate::store::{ContentStore, MemoryStore, PgContentStore};

/// Construction options for a [`KernelContext`].
#[derive(Debug, Clone, Default)]
pub struct ContextOptions {
    /// Documents re-read by [`KernelContext::rebuild_types`].
    pub type_sources: Vec<PathBuf>,
    /// Binder form prefix.
    pub form_prefix: Option<String>,
}

/// Shared kernel state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct KernelContext {
    inner: Arc<KernelContextInner>,
}

struct KernelContextInner {
    registry: TypeRegistry,
    factory: ContentModelFactory,
    binder: PolymorphicBinder,
    router: Arc<PermalinkRouter>,
    store: Arc<dyn ContentStore>,
    content: ContentService,
    type_sources: Vec<PathBuf>,
    /// Present when content lives in PostgreSQL.
    db: Option<PgPool>,
}

impl KernelContext {
    /// Create a context over `store` with an empty registry.
    pub fn new(store: Arc<dyn ContentStore>, options: ContextOptions) -> Self {
        Self::assemble(store, options, None)
    }

    /// In-memory context with default options.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), ContextOptions::default())
    }

    fn assemble(store: Arc<dyn ContentStore>, options: ContextOptions, db: Option<PgPool>) -> Self {
        let registry = TypeRegistry::new();
        let factory = ContentModelFactory::new(registry.clone());
        let mut binder = PolymorphicBinder::new(factory.clone());
        if let Some(prefix) = options.form_prefix {
            binder = binder.with_prefix(prefix);
        }
        let router = Arc::new(PermalinkRouter::new(store.clone()));
        let content = ContentService::new(
            factory.clone(),
            binder.clone(),
            router.clone(),
            store.clone(),
        );

        Self {
            inner: Arc::new(KernelContextInner {
                registry,
                factory,
                binder,
                router,
                store,
                content,
                type_sources: options.type_sources,
                db,
            }),
        }
    }

    /// Build a context from configuration: connect the store, load types,
    /// and warm the permalink table.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let options = ContextOptions {
            type_sources: config.type_sources.clone(),
            form_prefix: config.form_prefix.clone(),
        };

        let context = match &config.database_url {
            Some(url) => {
                let pool = db::create_pool(url, config.database_max_connections)
                    .await
                    .context("failed to create database pool")?;
                db::run_migrations(&pool)
                    .await
                    .context("failed to run migrations")?;
                let store: Arc<dyn ContentStore> = Arc::new(PgContentStore::new(pool.clone()));
                Self::assemble(store, options, Some(pool))
            }
            None => {
                info!("DATABASE_URL not set; content is kept in memory");
                Self::new(Arc::new(MemoryStore::new()), options)
            }
        };

        let report = context
            .rebuild_types()
            .context("failed to build content types")?;
        info!(
            generation = report.generation,
            page_types = report.page_types,
            block_types = report.block_types,
            "content types loaded"
        );

        let permalinks = context
            .inner
            .router
            .warm()
            .await
            .context("failed to warm permalink table")?;
        info!(permalinks, "permalink router ready");

        Ok(context)
    }

    /// Re-read the configured type sources and swap in a new generation.
    ///
    /// On failure the current generation keeps serving.
    pub fn rebuild_types(&self) -> Result<BuildReport, BuildError> {
        let builder = self
            .inner
            .type_sources
            .iter()
            .fold(TypeBuilder::new(self.inner.registry.clone()), |b, path| {
                b.add_file(path.clone())
            });
        builder.build()
    }

    /// Whether the database is reachable. `None` when running in memory.
    pub async fn postgres_healthy(&self) -> Option<bool> {
        match &self.inner.db {
            Some(pool) => Some(db::check_health(pool).await),
            None => None,
        }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.inner.registry
    }

    pub fn factory(&self) -> &ContentModelFactory {
        &self.inner.factory
    }

    pub fn binder(&self) -> &PolymorphicBinder {
        &self.inner.binder
    }

    pub fn router(&self) -> &Arc<PermalinkRouter> {
        &self.inner.router
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.inner.store
    }

    pub fn content(&self) -> &ContentService {
        &self.inner.content
    }

    pub fn type_sources(&self) -> &[PathBuf] {
        &self.inner.type_sources
    }
}
