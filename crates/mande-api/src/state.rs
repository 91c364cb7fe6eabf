//! Shared application state.

use std::sync::Arc;

use mande_core::{
    DocumentRepository, GenerationBackend, KnowledgeRepository, ScrapedKnowledgeRepository,
    TextEmbedder,
};
use mande_db::{Database, InMemoryStore};
use mande_jobs::{DocumentConfig, DocumentProcessor, EmbeddingTasks, ExtractionEngine};
use mande_search::KnowledgeSearchEngine;

use crate::services::{
    ChatService, ContextAssembler, ContextConfig, DocumentService, KnowledgeService,
};

/// The three stores behind the service layer.
#[derive(Clone)]
pub struct Repositories {
    pub knowledge: Arc<dyn KnowledgeRepository>,
    pub documents: Arc<dyn DocumentRepository>,
    pub scraped: Arc<dyn ScrapedKnowledgeRepository>,
}

impl Repositories {
    pub fn postgres(db: &Database) -> Self {
        Self {
            knowledge: db.knowledge.clone(),
            documents: db.documents.clone(),
            scraped: db.scraped.clone(),
        }
    }

    pub fn in_memory(store: &InMemoryStore) -> Self {
        Self {
            knowledge: store.knowledge(),
            documents: store.documents(),
            scraped: store.scraped(),
        }
    }

    /// Tasks that attach embeddings to rows in these stores.
    pub fn embedding_tasks(&self, embedder: Arc<dyn TextEmbedder>) -> EmbeddingTasks {
        EmbeddingTasks::new(self.knowledge.clone(), self.documents.clone(), embedder)
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub knowledge: KnowledgeService,
    pub documents: DocumentService,
    pub chat: ChatService,
    pub extraction: Arc<ExtractionEngine>,
}

impl AppState {
    pub fn new(
        repos: Repositories,
        extraction: Arc<ExtractionEngine>,
        embeddings: EmbeddingTasks,
        generator: Arc<dyn GenerationBackend>,
        context: ContextConfig,
        document_config: DocumentConfig,
    ) -> Self {
        let search = KnowledgeSearchEngine::new(
            repos.knowledge.clone(),
            repos.scraped.clone(),
            repos.documents.clone(),
        )
        .with_embedder(embeddings.embedder().clone());

        let knowledge = KnowledgeService::new(
            extraction.clone(),
            repos.knowledge.clone(),
            search.clone(),
            embeddings.clone(),
        );
        let processor = DocumentProcessor::new(
            extraction.clone(),
            repos.documents.clone(),
            embeddings,
            document_config,
        );
        let documents = DocumentService::new(processor, repos.documents.clone(), search.clone());
        let assembler = ContextAssembler::new(search, repos.documents, context);
        let chat = ChatService::new(assembler, generator);

        Self {
            knowledge,
            documents,
            chat,
            extraction,
        }
    }
}
