//! Scraped knowledge repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use mande_core::{Error, NewScrapedEntry, Result, ScrapedEntry, ScrapedKnowledgeRepository};

/// PostgreSQL implementation of ScrapedKnowledgeRepository.
pub struct PgScrapedRepository {
    pool: Pool<Postgres>,
}

impl PgScrapedRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScrapedKnowledgeRepository for PgScrapedRepository {
    /// Insert a page, replacing any earlier scrape of the same URL.
    async fn insert(&self, entry: NewScrapedEntry) -> Result<ScrapedEntry> {
        let row = sqlx::query(
            "INSERT INTO scraped_knowledge (id, url, title, content, scraped_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (url) DO UPDATE
                 SET title = EXCLUDED.title,
                     content = EXCLUDED.content,
                     scraped_at = EXCLUDED.scraped_at
             RETURNING id, url, title, content, scraped_at",
        )
        .bind(Uuid::now_v7())
        .bind(&entry.url)
        .bind(&entry.title)
        .bind(&entry.content)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(ScrapedEntry {
            id: row.get("id"),
            url: row.get("url"),
            title: row.get("title"),
            content: row.get("content"),
            scraped_at: row.get("scraped_at"),
        })
    }

    async fn list_all(&self) -> Result<Vec<ScrapedEntry>> {
        let rows = sqlx::query(
            "SELECT id, url, title, content, scraped_at
             FROM scraped_knowledge
             ORDER BY scraped_at DESC, id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| ScrapedEntry {
                id: row.get("id"),
                url: row.get("url"),
                title: row.get("title"),
                content: row.get("content"),
                scraped_at: row.get("scraped_at"),
            })
            .collect())
    }
}
