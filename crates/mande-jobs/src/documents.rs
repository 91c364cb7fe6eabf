//! Chat document intake: synchronous validation, background extraction.
//!
//! The upload response returns as soon as the document row exists in the
//! `processing` state. Extraction and embedding continue on a spawned task
//! that moves the row to `ready` or `failed`.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn, Instrument};
use uuid::Uuid;

use mande_core::defaults::DOCUMENT_TTL_HOURS;
use mande_core::{
    repair_content, resolve_format, sanitize_filename, CreateDocumentRequest, Document,
    DocumentRepository, Result,
};

use crate::embedding::{EmbeddingTarget, EmbeddingTasks};
use crate::extraction::ExtractionEngine;

/// Configuration for document intake.
#[derive(Debug, Clone)]
pub struct DocumentConfig {
    /// How long a document lives before the sweeper removes it.
    pub ttl: chrono::Duration,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            ttl: chrono::Duration::hours(DOCUMENT_TTL_HOURS),
        }
    }
}

impl DocumentConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `MANDE_DOCUMENT_TTL_HOURS` | `48` | Document lifetime |
    pub fn from_env() -> Self {
        let hours = std::env::var("MANDE_DOCUMENT_TTL_HOURS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DOCUMENT_TTL_HOURS);
        Self {
            ttl: chrono::Duration::hours(hours),
        }
    }

    pub fn with_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Accepts chat documents and drives their extraction in the background.
#[derive(Clone)]
pub struct DocumentProcessor {
    engine: Arc<ExtractionEngine>,
    documents: Arc<dyn DocumentRepository>,
    embeddings: EmbeddingTasks,
    config: DocumentConfig,
}

impl DocumentProcessor {
    pub fn new(
        engine: Arc<ExtractionEngine>,
        documents: Arc<dyn DocumentRepository>,
        embeddings: EmbeddingTasks,
        config: DocumentConfig,
    ) -> Self {
        Self {
            engine,
            documents,
            embeddings,
            config,
        }
    }

    /// Validate the upload, persist a `processing` row and start extraction.
    ///
    /// Rejections (empty, too large, unsupported type) are returned directly
    /// and nothing is stored. The join handle resolves once the row has left
    /// the `processing` state; callers normally drop it.
    #[instrument(skip(self, data), fields(subsystem = "jobs", component = "documents", op = "accept", owner_id = %owner_id, size_bytes = data.len()))]
    pub async fn accept(
        &self,
        owner_id: Uuid,
        filename: &str,
        declared_mime: Option<&str>,
        data: Vec<u8>,
    ) -> Result<(Document, JoinHandle<()>)> {
        let filename = sanitize_filename(filename);
        self.engine.validate(&filename, &data)?;
        let format = resolve_format(&filename, declared_mime, &data)?;

        let document = self
            .documents
            .create_pending(CreateDocumentRequest {
                owner_id,
                filename: filename.clone(),
                mime_type: format.mime_type().to_string(),
                size_bytes: data.len() as i64,
                expires_at: Utc::now() + self.config.ttl,
            })
            .await?;

        info!(
            document_id = %document.id,
            filename = %filename,
            mime_type = format.mime_type(),
            "Document accepted, extraction queued"
        );

        let this = self.clone();
        let id = document.id;
        let mime = format.mime_type();
        let span = tracing::info_span!(
            "document_extraction",
            subsystem = "jobs",
            component = "documents",
            document_id = %id
        );
        let handle = tokio::spawn(
            async move {
                this.process(id, &data, mime, &filename).await;
            }
            .instrument(span),
        );

        Ok((document, handle))
    }

    /// Run extraction for an already-created row and record the result.
    pub async fn process(&self, id: Uuid, data: &[u8], mime_type: &str, filename: &str) {
        let outcome = match self.engine.extract(data, Some(mime_type), filename).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.mark_failed(id, &e.to_string()).await;
                return;
            }
        };

        let content = repair_content(&outcome.text);
        let method = match outcome.method_used {
            Some(method) if outcome.success && !content.is_empty() => method,
            _ => {
                let reason = outcome
                    .error
                    .unwrap_or_else(|| "no text could be extracted".to_string());
                self.mark_failed(id, &reason).await;
                return;
            }
        };

        if let Err(e) = self
            .documents
            .complete_extraction(id, &content, method)
            .await
        {
            error!(error = %e, "Failed to store extracted document text");
            return;
        }
        info!(method = %method, chars = content.chars().count(), "Document ready");

        self.embeddings
            .run(EmbeddingTarget::Document(id), &content)
            .await;
    }

    async fn mark_failed(&self, id: Uuid, reason: &str) {
        warn!(error = %reason, "Document extraction failed");
        if let Err(e) = self.documents.fail_extraction(id, reason).await {
            error!(error = %e, "Failed to record document extraction failure");
        }
    }
}
