//! Fire-and-forget embedding attachment for knowledge items and documents.
//!
//! Each task is bounded by a hard timeout. On expiry or failure the task is
//! abandoned and the row stays usable through lexical scoring; nothing is
//! reported back to the uploader.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use mande_core::defaults::EMBED_TASK_TIMEOUT_SECS;
use mande_core::{
    DocumentRepository, EmbeddingSource, KnowledgeRepository, Result, TextEmbedder,
};

/// Which table a background embedding targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingTarget {
    KnowledgeItem(Uuid),
    Document(Uuid),
}

/// Spawns and runs background embedding work.
#[derive(Clone)]
pub struct EmbeddingTasks {
    knowledge: Arc<dyn KnowledgeRepository>,
    documents: Arc<dyn DocumentRepository>,
    embedder: Arc<dyn TextEmbedder>,
    timeout: Duration,
}

impl EmbeddingTasks {
    pub fn new(
        knowledge: Arc<dyn KnowledgeRepository>,
        documents: Arc<dyn DocumentRepository>,
        embedder: Arc<dyn TextEmbedder>,
    ) -> Self {
        Self {
            knowledge,
            documents,
            embedder,
            timeout: Duration::from_secs(EMBED_TASK_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn embedder(&self) -> &Arc<dyn TextEmbedder> {
        &self.embedder
    }

    /// Start embedding `text` for `target` in the background.
    ///
    /// The returned handle resolves to whether a vector was stored; callers
    /// normally drop it.
    pub fn spawn(&self, target: EmbeddingTarget, text: String) -> JoinHandle<bool> {
        let this = self.clone();
        let span = tracing::info_span!(
            "embed_task",
            subsystem = "jobs",
            component = "embedding",
            embed_target = ?target
        );
        tokio::spawn(async move { this.run(target, &text).await }.instrument(span))
    }

    /// Embed and store within the task timeout. Returns whether a vector was stored.
    pub async fn run(&self, target: EmbeddingTarget, text: &str) -> bool {
        let start = Instant::now();
        match tokio::time::timeout(self.timeout, self.embed_and_store(target, text)).await {
            Ok(Ok(source)) => {
                debug!(
                    embedding_source = %source,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Embedding attached"
                );
                true
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Background embedding failed; lexical search only");
                false
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "Background embedding timed out; lexical search only"
                );
                false
            }
        }
    }

    async fn embed_and_store(&self, target: EmbeddingTarget, text: &str) -> Result<EmbeddingSource> {
        let outcome = self.embedder.embed(text).await;
        match target {
            EmbeddingTarget::KnowledgeItem(id) => {
                self.knowledge
                    .update_embedding(id, &outcome.vector, &outcome.model)
                    .await?
            }
            EmbeddingTarget::Document(id) => {
                self.documents
                    .update_embedding(id, &outcome.vector, &outcome.model)
                    .await?
            }
        }
        Ok(outcome.source)
    }

    /// Embed up to `limit` knowledge items that still have no vector.
    /// Returns how many were stored.
    pub async fn backfill(&self, limit: i64) -> Result<usize> {
        let pending = self.knowledge.list_missing_embeddings(limit).await?;
        if pending.is_empty() {
            return Ok(0);
        }

        let mut stored = 0;
        for item in &pending {
            if self
                .run(EmbeddingTarget::KnowledgeItem(item.id), &item.content)
                .await
            {
                stored += 1;
            }
        }
        info!(
            subsystem = "jobs",
            component = "embedding",
            op = "backfill",
            candidates = pending.len(),
            stored,
            "Embedding backfill pass complete"
        );
        Ok(stored)
    }
}
