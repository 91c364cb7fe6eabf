//! Core traits for mande repositories, extraction, and inference backends.
//!
//! These traits define the interfaces that concrete implementations must satisfy,
//! allowing for pluggable backends and easier testing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::cancel::CancellationSignal;
use crate::error::Result;
use crate::models::*;

// =============================================================================
// REPOSITORY TRAITS
// =============================================================================

/// Repository for per-owner knowledge items.
///
/// Every read and delete is scoped by `owner_id`. An item owned by someone
/// else is reported as [`crate::Error::NotFound`].
#[async_trait]
pub trait KnowledgeRepository: Send + Sync {
    /// Insert a new item. The content must already be repaired and non-empty.
    async fn create(&self, req: CreateKnowledgeRequest) -> Result<KnowledgeItem>;

    /// Fetch an item owned by `owner_id`.
    async fn fetch(&self, id: Uuid, owner_id: Uuid) -> Result<KnowledgeItem>;

    /// All items owned by `owner_id`, most recently updated first.
    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<KnowledgeItem>>;

    /// Attach (or replace) the vector produced by `model`.
    async fn update_embedding(&self, id: Uuid, vector: &Vector, model: &str) -> Result<()>;

    /// Delete an item owned by `owner_id`.
    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<()>;

    /// Totals and per-category counts for `owner_id`.
    async fn stats(&self, owner_id: Uuid) -> Result<KnowledgeStats>;

    /// Items (any owner) that still have no vector, oldest first.
    async fn list_missing_embeddings(&self, limit: i64) -> Result<Vec<KnowledgeItem>>;
}

/// Repository for expiring chat documents.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Register a document in the `processing` state.
    async fn create_pending(&self, req: CreateDocumentRequest) -> Result<Document>;

    /// Fetch an unexpired document owned by `owner_id`. Expired rows read as
    /// `NotFound` before the sweep removes them.
    async fn fetch(&self, id: Uuid, owner_id: Uuid) -> Result<Document>;

    /// Move a document to `ready` with its extracted text.
    async fn complete_extraction(
        &self,
        id: Uuid,
        content: &str,
        method: ExtractionMethod,
    ) -> Result<()>;

    /// Move a document to `failed` with a diagnostic.
    async fn fail_extraction(&self, id: Uuid, error: &str) -> Result<()>;

    /// Attach the vector produced by `model`.
    async fn update_embedding(&self, id: Uuid, vector: &Vector, model: &str) -> Result<()>;

    /// All unexpired documents owned by `owner_id`, newest first.
    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Document>>;

    /// Delete every document whose `expires_at` is at or before `now`.
    /// Returns the number removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// Repository for organisation-wide scraped knowledge.
#[async_trait]
pub trait ScrapedKnowledgeRepository: Send + Sync {
    async fn insert(&self, entry: NewScrapedEntry) -> Result<ScrapedEntry>;

    async fn list_all(&self) -> Result<Vec<ScrapedEntry>>;
}

// =============================================================================
// EXTRACTION TRAITS
// =============================================================================

/// A single text extraction strategy.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// The method this extractor implements.
    fn method(&self) -> ExtractionMethod;

    /// Extract text from raw file data.
    ///
    /// Returns an error when the strategy cannot produce usable text; the
    /// engine records it and moves on to the next method.
    async fn extract(&self, data: &[u8], filename: &str, mime_type: &str) -> Result<String>;

    /// Check if the adapter's external dependencies are available.
    async fn health_check(&self) -> Result<bool>;

    /// Human-readable name of this adapter.
    fn name(&self) -> &str;
}

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Backend for generating embeddings.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for the given texts, one vector per input.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>>;

    /// Expected dimension of embedding vectors.
    fn dimension(&self) -> usize;

    /// Model name being used.
    fn model_name(&self) -> &str;
}

/// Backend for text generation (LLM).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate a completion, abandoning the call when `cancel` fires.
    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationSignal,
    ) -> Result<String>;

    /// Model name being used.
    fn model_name(&self) -> &str;
}

/// Combined inference backend supporting both embedding and generation.
#[async_trait]
pub trait InferenceBackend: EmbeddingBackend + GenerationBackend {
    /// Check if the backend is available and responding.
    async fn health_check(&self) -> Result<bool>;
}

/// Produces a vector for any text, degrading to a local approximation
/// when the remote backend is unavailable.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Never fails: remote errors degrade to the fallback vector.
    async fn embed(&self, text: &str) -> EmbeddingOutcome;

    /// Dimension of every vector this embedder returns.
    fn dimension(&self) -> usize;
}
