//! Chat document operations.

use std::sync::Arc;

use uuid::Uuid;

use mande_core::{Document, DocumentRepository, Result};
use mande_jobs::DocumentProcessor;
use mande_search::{KnowledgeSearchEngine, ScoredDocument};

#[derive(Clone)]
pub struct DocumentService {
    processor: DocumentProcessor,
    repo: Arc<dyn DocumentRepository>,
    search: KnowledgeSearchEngine,
}

impl DocumentService {
    pub fn new(
        processor: DocumentProcessor,
        repo: Arc<dyn DocumentRepository>,
        search: KnowledgeSearchEngine,
    ) -> Self {
        Self {
            processor,
            repo,
            search,
        }
    }

    /// Accept a document; extraction continues after this returns.
    pub async fn upload(
        &self,
        owner_id: Uuid,
        filename: &str,
        declared_mime: Option<&str>,
        data: Vec<u8>,
    ) -> Result<Document> {
        let (document, _extraction) = self
            .processor
            .accept(owner_id, filename, declared_mime, data)
            .await?;
        Ok(document)
    }

    pub async fn fetch(&self, id: Uuid, owner_id: Uuid) -> Result<Document> {
        self.repo.fetch(id, owner_id).await
    }

    pub async fn similar(
        &self,
        id: Uuid,
        owner_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ScoredDocument>> {
        self.search.nearest_documents(owner_id, id, limit).await
    }
}
