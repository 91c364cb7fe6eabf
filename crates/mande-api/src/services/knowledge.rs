//! Knowledge base operations: upload, list, search, stats, delete.

use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use mande_core::{
    repair_content, resolve_format, sanitize_filename, CreateKnowledgeRequest, Error,
    KnowledgeItem, KnowledgeRepository, KnowledgeSource, KnowledgeStats, Result,
};
use mande_jobs::{EmbeddingTarget, EmbeddingTasks, ExtractionEngine};
use mande_search::{KnowledgeSearchEngine, ScoredItem};

/// Owner-scoped knowledge base service.
#[derive(Clone)]
pub struct KnowledgeService {
    extraction: Arc<ExtractionEngine>,
    repo: Arc<dyn KnowledgeRepository>,
    search: KnowledgeSearchEngine,
    embeddings: EmbeddingTasks,
}

impl KnowledgeService {
    pub fn new(
        extraction: Arc<ExtractionEngine>,
        repo: Arc<dyn KnowledgeRepository>,
        search: KnowledgeSearchEngine,
        embeddings: EmbeddingTasks,
    ) -> Self {
        Self {
            extraction,
            repo,
            search,
            embeddings,
        }
    }

    /// Extract text from an uploaded file and store it as a knowledge item.
    ///
    /// Size and type are checked before any extractor runs. The embedding is
    /// attached in the background; the item is searchable lexically at once.
    #[instrument(skip(self, data, title), fields(subsystem = "api", component = "knowledge", op = "upload", owner_id = %owner_id, size_bytes = data.len()))]
    pub async fn upload_knowledge_file(
        &self,
        data: &[u8],
        declared_mime: Option<&str>,
        filename: &str,
        owner_id: Uuid,
        title: Option<String>,
    ) -> Result<KnowledgeItem> {
        let filename = sanitize_filename(filename);
        let outcome = self.extraction.extract(data, declared_mime, &filename).await?;
        if !outcome.success {
            return Err(Error::Extraction(
                outcome
                    .error
                    .unwrap_or_else(|| "no extraction method produced text".to_string()),
            ));
        }
        let format = resolve_format(&filename, declared_mime, data)?;

        let item = self
            .store(CreateKnowledgeRequest {
                owner_id,
                title,
                content: outcome.text,
                source: KnowledgeSource::FileUpload,
                filename: Some(filename),
                mime_type: Some(format.mime_type().to_string()),
            })
            .await?;

        info!(
            item_id = %item.id,
            method = ?outcome.method_used,
            chars = item.content.len(),
            "Knowledge file stored"
        );
        Ok(item)
    }

    /// Store text entered directly by the user.
    #[instrument(skip(self, title, content), fields(subsystem = "api", component = "knowledge", op = "add_text", owner_id = %owner_id))]
    pub async fn add_text(
        &self,
        owner_id: Uuid,
        title: Option<String>,
        content: &str,
    ) -> Result<KnowledgeItem> {
        self.store(CreateKnowledgeRequest {
            owner_id,
            title,
            content: content.to_string(),
            source: KnowledgeSource::Manual,
            filename: None,
            mime_type: Some("text/plain".to_string()),
        })
        .await
    }

    async fn store(&self, mut req: CreateKnowledgeRequest) -> Result<KnowledgeItem> {
        req.content = repair_content(&req.content);
        if req.content.is_empty() {
            return Err(Error::InvalidInput(
                "No text could be extracted from the upload".to_string(),
            ));
        }
        let item = self.repo.create(req).await?;
        // Fire and forget: failures are logged by the task.
        drop(
            self.embeddings
                .spawn(EmbeddingTarget::KnowledgeItem(item.id), item.content.clone()),
        );
        Ok(item)
    }

    pub async fn list(&self, owner_id: Uuid) -> Result<Vec<KnowledgeItem>> {
        self.repo.list_by_owner(owner_id).await
    }

    #[instrument(skip(self), fields(subsystem = "api", component = "knowledge", op = "delete"))]
    pub async fn delete_knowledge_item(&self, id: Uuid, owner_id: Uuid) -> Result<()> {
        self.repo.delete(id, owner_id).await?;
        info!(item_id = %id, "Knowledge item deleted");
        Ok(())
    }

    pub async fn search_knowledge(
        &self,
        query: &str,
        owner_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ScoredItem>> {
        self.search.search(query, owner_id, limit).await
    }

    pub async fn get_knowledge_stats(&self, owner_id: Uuid) -> Result<KnowledgeStats> {
        self.repo.stats(owner_id).await
    }
}
