//! Chat document repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pgvector::Vector;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::{info, instrument};
use uuid::Uuid;

use mande_core::{
    CreateDocumentRequest, Document, DocumentRepository, DocumentStatus, Error, ExtractionMethod,
    Result,
};

use crate::check_dimension;

const DOCUMENT_COLUMNS: &str = "id, owner_id, filename, mime_type, size_bytes, status, content, \
                                extraction_method, error, embedding, embedding_model, \
                                created_at, expires_at";

/// PostgreSQL implementation of DocumentRepository.
pub struct PgDocumentRepository {
    pool: Pool<Postgres>,
    dimension: usize,
}

impl PgDocumentRepository {
    pub fn new(pool: Pool<Postgres>, dimension: usize) -> Self {
        Self { pool, dimension }
    }
}

fn map_document(row: &PgRow) -> Result<Document> {
    let status: String = row.get("status");
    Ok(Document {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        filename: row.get("filename"),
        mime_type: row.get("mime_type"),
        size_bytes: row.get("size_bytes"),
        status: status.parse().map_err(Error::Internal)?,
        content: row.get("content"),
        extraction_method: row.get("extraction_method"),
        error: row.get("error"),
        embedding: row.get::<Option<Vector>, _>("embedding"),
        embedding_model: row.get("embedding_model"),
        created_at: row.get("created_at"),
        expires_at: row.get("expires_at"),
    })
}

#[async_trait]
impl DocumentRepository for PgDocumentRepository {
    async fn create_pending(&self, req: CreateDocumentRequest) -> Result<Document> {
        let row = sqlx::query(&format!(
            "INSERT INTO document
                 (id, owner_id, filename, mime_type, size_bytes, status, created_at, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {DOCUMENT_COLUMNS}"
        ))
        .bind(Uuid::now_v7())
        .bind(req.owner_id)
        .bind(&req.filename)
        .bind(&req.mime_type)
        .bind(req.size_bytes)
        .bind(DocumentStatus::Processing.to_string())
        .bind(Utc::now())
        .bind(req.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        map_document(&row)
    }

    async fn fetch(&self, id: Uuid, owner_id: Uuid) -> Result<Document> {
        let row = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM document
             WHERE id = $1 AND owner_id = $2 AND expires_at > now()"
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound(format!("document {}", id)))?;
        map_document(&row)
    }

    async fn complete_extraction(
        &self,
        id: Uuid,
        content: &str,
        method: ExtractionMethod,
    ) -> Result<()> {
        if content.trim().is_empty() {
            return Err(Error::InvalidInput("document content is empty".to_string()));
        }
        let result = sqlx::query(
            "UPDATE document
             SET status = $2, content = $3, extraction_method = $4, error = NULL
             WHERE id = $1",
        )
        .bind(id)
        .bind(DocumentStatus::Ready.to_string())
        .bind(content)
        .bind(method.as_str())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("document {}", id)));
        }
        Ok(())
    }

    async fn fail_extraction(&self, id: Uuid, error: &str) -> Result<()> {
        let result = sqlx::query("UPDATE document SET status = $2, error = $3 WHERE id = $1")
            .bind(id)
            .bind(DocumentStatus::Failed.to_string())
            .bind(error)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("document {}", id)));
        }
        Ok(())
    }

    async fn update_embedding(&self, id: Uuid, vector: &Vector, model: &str) -> Result<()> {
        check_dimension(vector, self.dimension)?;
        let result = sqlx::query(
            "UPDATE document SET embedding = $2, embedding_model = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(vector)
        .bind(model)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("document {}", id)));
        }
        Ok(())
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Document>> {
        let rows = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM document
             WHERE owner_id = $1 AND expires_at > now()
             ORDER BY created_at DESC, id"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(map_document).collect()
    }

    #[instrument(skip(self), fields(subsystem = "db", component = "documents", op = "delete_expired"))]
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM document WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        let removed = result.rows_affected();
        if removed > 0 {
            info!(removed, "Deleted expired documents");
        }
        Ok(removed)
    }
}
