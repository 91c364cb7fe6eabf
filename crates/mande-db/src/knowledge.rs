//! Knowledge item repository implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use pgvector::Vector;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

use mande_core::{
    mime_category, repair_content, CreateKnowledgeRequest, Error, KnowledgeItem,
    KnowledgeRepository, KnowledgeStats, Result,
};

use crate::check_dimension;

const ITEM_COLUMNS: &str = "id, owner_id, title, content, source, filename, mime_type, \
                            embedding, embedding_model, created_at, updated_at";

/// PostgreSQL implementation of KnowledgeRepository.
pub struct PgKnowledgeRepository {
    pool: Pool<Postgres>,
    dimension: usize,
}

impl PgKnowledgeRepository {
    /// Create a repository storing vectors of `dimension` components.
    pub fn new(pool: Pool<Postgres>, dimension: usize) -> Self {
        Self { pool, dimension }
    }
}

fn map_item(row: &PgRow) -> Result<KnowledgeItem> {
    let source: String = row.get("source");
    Ok(KnowledgeItem {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        title: row.get("title"),
        content: row.get("content"),
        source: source.parse().map_err(Error::Internal)?,
        filename: row.get("filename"),
        mime_type: row.get("mime_type"),
        embedding: row.get::<Option<Vector>, _>("embedding"),
        embedding_model: row.get("embedding_model"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl KnowledgeRepository for PgKnowledgeRepository {
    #[instrument(skip(self, req), fields(subsystem = "db", component = "knowledge", op = "create", owner_id = %req.owner_id))]
    async fn create(&self, req: CreateKnowledgeRequest) -> Result<KnowledgeItem> {
        let content = repair_content(&req.content);
        if content.is_empty() {
            return Err(Error::InvalidInput(
                "knowledge content is empty".to_string(),
            ));
        }
        let title = req.resolved_title();
        let now = Utc::now();

        let row = sqlx::query(&format!(
            "INSERT INTO knowledge_item
                 (id, owner_id, title, content, source, filename, mime_type, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(Uuid::now_v7())
        .bind(req.owner_id)
        .bind(&title)
        .bind(&content)
        .bind(req.source.to_string())
        .bind(&req.filename)
        .bind(&req.mime_type)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        let item = map_item(&row)?;
        debug!(item_id = %item.id, bytes = item.content.len(), "Knowledge item stored");
        Ok(item)
    }

    async fn fetch(&self, id: Uuid, owner_id: Uuid) -> Result<KnowledgeItem> {
        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM knowledge_item WHERE id = $1 AND owner_id = $2"
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound(format!("knowledge item {}", id)))?;
        map_item(&row)
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<KnowledgeItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM knowledge_item
             WHERE owner_id = $1
             ORDER BY updated_at DESC, id"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(map_item).collect()
    }

    async fn update_embedding(&self, id: Uuid, vector: &Vector, model: &str) -> Result<()> {
        check_dimension(vector, self.dimension)?;
        let result = sqlx::query(
            "UPDATE knowledge_item SET embedding = $2, embedding_model = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(vector)
        .bind(model)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("knowledge item {}", id)));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(subsystem = "db", component = "knowledge", op = "delete"))]
    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM knowledge_item WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("knowledge item {}", id)));
        }
        Ok(())
    }

    async fn stats(&self, owner_id: Uuid) -> Result<KnowledgeStats> {
        let rows = sqlx::query(
            "SELECT mime_type,
                    COUNT(*) AS entries,
                    COALESCE(SUM(octet_length(content)), 0)::BIGINT AS content_bytes
             FROM knowledge_item
             WHERE owner_id = $1
             GROUP BY mime_type",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut stats = KnowledgeStats {
            counts_by_type: BTreeMap::new(),
            ..Default::default()
        };
        for row in rows {
            let mime: Option<String> = row.get("mime_type");
            let entries: i64 = row.get("entries");
            stats.total_entries += entries;
            stats.total_content_bytes += row.get::<i64, _>("content_bytes");
            *stats
                .counts_by_type
                .entry(mime_category(mime.as_deref()).to_string())
                .or_insert(0) += entries;
        }
        Ok(stats)
    }

    async fn list_missing_embeddings(&self, limit: i64) -> Result<Vec<KnowledgeItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM knowledge_item
             WHERE embedding IS NULL
             ORDER BY created_at
             LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(map_item).collect()
    }
}
