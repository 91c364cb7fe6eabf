//! # mande-db
//!
//! Storage layer for the mande pipeline.
//!
//! This crate provides:
//! - Connection pool management
//! - PostgreSQL + pgvector repositories for knowledge items, chat documents
//!   and scraped knowledge
//! - An in-memory store with the same semantics, used when no database is
//!   configured and by tests
//!
//! ## Example
//!
//! ```rust,ignore
//! use mande_db::{Database, PoolConfig};
//!
//! let db = Database::connect("postgres://localhost/mande", PoolConfig::default()).await?;
//! db.migrate().await?;
//! let items = db.knowledge.list_by_owner(owner_id).await?;
//! ```

pub mod documents;
pub mod knowledge;
pub mod memory;
pub mod pool;
pub mod scraped;

// Re-export core types
pub use mande_core::*;

pub use documents::PgDocumentRepository;
pub use knowledge::PgKnowledgeRepository;
pub use memory::InMemoryStore;
pub use pool::{create_pool, log_pool_metrics, PoolConfig};
pub use scraped::PgScrapedRepository;

use std::sync::Arc;

use mande_core::defaults::EMBED_DIMENSION;

/// Reject vectors whose length differs from the store dimension.
pub fn check_dimension(vector: &Vector, expected: usize) -> Result<()> {
    let actual = vector.as_slice().len();
    if actual != expected {
        return Err(Error::InvalidInput(format!(
            "embedding has {} dimensions, store expects {}",
            actual, expected
        )));
    }
    Ok(())
}

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    pub knowledge: Arc<PgKnowledgeRepository>,
    pub documents: Arc<PgDocumentRepository>,
    pub scraped: Arc<PgScrapedRepository>,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self::with_dimension(pool, EMBED_DIMENSION)
    }

    /// Create a Database whose repositories accept `dimension`-sized vectors.
    ///
    /// The migration declares `vector(768)` columns; other sizes need a
    /// matching schema change.
    pub fn with_dimension(pool: sqlx::Pool<sqlx::Postgres>, dimension: usize) -> Self {
        Self {
            knowledge: Arc::new(PgKnowledgeRepository::new(pool.clone(), dimension)),
            documents: Arc::new(PgDocumentRepository::new(pool.clone(), dimension)),
            scraped: Arc::new(PgScrapedRepository::new(pool.clone())),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
