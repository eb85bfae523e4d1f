//! PostgreSQL content store.
//!
//! Models are stored as JSONB alongside the columns the permalink router
//! needs, so warming the router never deserializes region data.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::{ContentStore, EntityWrite, PermalinkEntry, UnitOfWork};
use crate::content::{ContentModel, EntityKind};
use crate::permalink::ContentEntity;

/// Content store backed by the `content` and `permalink` tables.
#[derive(Clone)]
pub struct PgContentStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct EntityRow {
    id: Uuid,
    kind: String,
    route: String,
    slug: String,
    parent_id: Option<Uuid>,
    published: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct PermalinkRow {
    path: String,
    entity_kind: String,
    entity_id: Uuid,
    route: String,
}

fn parse_kind(raw: &str) -> Result<EntityKind> {
    raw.parse()
        .map_err(|_| anyhow::anyhow!("unknown entity kind '{raw}' in content table"))
}

impl PgContentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ContentStore for PgContentStore {
    async fn load(&self, id: Uuid) -> Result<Option<ContentModel>> {
        let data: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT data FROM content WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .context("failed to fetch content by id")?;

        data.map(|value| serde_json::from_value(value).context("failed to decode content model"))
            .transpose()
    }

    async fn entities(&self) -> Result<Vec<ContentEntity>> {
        let rows = sqlx::query_as::<_, EntityRow>(
            "SELECT id, kind, route, slug, parent_id, published FROM content",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to list content entities")?;

        rows.into_iter()
            .map(|row| {
                Ok(ContentEntity {
                    id: row.id,
                    kind: parse_kind(&row.kind)?,
                    slug: row.slug,
                    parent_id: row.parent_id,
                    published: row.published,
                    route: row.route,
                })
            })
            .collect()
    }

    async fn permalinks(&self) -> Result<Vec<PermalinkEntry>> {
        let rows = sqlx::query_as::<_, PermalinkRow>(
            "SELECT path, entity_kind, entity_id, route FROM permalink ORDER BY path",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to list permalinks")?;

        rows.into_iter()
            .map(|row| {
                Ok(PermalinkEntry {
                    entity_kind: parse_kind(&row.entity_kind)?,
                    path: row.path,
                    entity_id: row.entity_id,
                    route: row.route,
                })
            })
            .collect()
    }

    async fn commit(&self, work: UnitOfWork) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to start transaction")?;

        // Drop stale paths first so a moved entity can take over a freed path.
        for path in &work.permalinks.remove {
            sqlx::query("DELETE FROM permalink WHERE path = $1")
                .bind(path)
                .execute(&mut *tx)
                .await
                .context("failed to remove permalink")?;
        }

        match &work.write {
            EntityWrite::Save(model) => {
                let id = model
                    .id
                    .context("cannot save a content model without an id")?;
                let data = serde_json::to_value(model.as_ref())
                    .context("failed to serialize content model")?;

                sqlx::query(
                    r#"
                    INSERT INTO content
                        (id, type_name, kind, route, slug, parent_id, published, data, created, last_modified)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                    ON CONFLICT (id) DO UPDATE SET
                        type_name = EXCLUDED.type_name,
                        kind = EXCLUDED.kind,
                        route = EXCLUDED.route,
                        slug = EXCLUDED.slug,
                        parent_id = EXCLUDED.parent_id,
                        published = EXCLUDED.published,
                        data = EXCLUDED.data,
                        last_modified = EXCLUDED.last_modified
                    "#,
                )
                .bind(id)
                .bind(&model.type_name)
                .bind(model.kind.as_str())
                .bind(&model.route)
                .bind(&model.slug)
                .bind(model.parent_id)
                .bind(model.published)
                .bind(&data)
                .bind(model.created)
                .bind(model.last_modified)
                .execute(&mut *tx)
                .await
                .context("failed to save content")?;
            }
            EntityWrite::Delete(id) => {
                sqlx::query("DELETE FROM content WHERE id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .context("failed to delete content")?;
            }
            EntityWrite::None => {}
        }

        for entry in &work.permalinks.upsert {
            let result = sqlx::query(
                r#"
                INSERT INTO permalink (path, entity_kind, entity_id, route)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (path) DO UPDATE SET
                    entity_kind = EXCLUDED.entity_kind,
                    entity_id = EXCLUDED.entity_id,
                    route = EXCLUDED.route
                WHERE permalink.entity_id = EXCLUDED.entity_id
                "#,
            )
            .bind(&entry.path)
            .bind(entry.entity_kind.as_str())
            .bind(entry.entity_id)
            .bind(&entry.route)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to upsert permalink '{}'", entry.path))?;

            if result.rows_affected() == 0 {
                bail!("permalink '{}' already belongs to another entity", entry.path);
            }
        }

        tx.commit().await.context("failed to commit transaction")?;

        debug!(
            upserted = work.permalinks.upsert.len(),
            removed = work.permalinks.remove.len(),
            "committed content unit of work"
        );

        Ok(())
    }
}
