//! In-memory store used when no database is configured, and by tests.
//!
//! Mirrors the PostgreSQL repositories: owner scoping, `NotFound` for foreign
//! rows, empty-content rejection and a single vector dimension across the
//! store. The dimension is either configured up front or fixed by the first
//! vector written.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pgvector::Vector;
use tokio::sync::RwLock;
use uuid::Uuid;

use mande_core::{
    mime_category, repair_content, CreateDocumentRequest, CreateKnowledgeRequest, Document,
    DocumentRepository, DocumentStatus, Error, ExtractionMethod, KnowledgeItem,
    KnowledgeRepository, KnowledgeStats, NewScrapedEntry, Result, ScrapedEntry,
    ScrapedKnowledgeRepository,
};

use crate::check_dimension;

#[derive(Default)]
struct Tables {
    knowledge: HashMap<Uuid, KnowledgeItem>,
    documents: HashMap<Uuid, Document>,
    scraped: Vec<ScrapedEntry>,
    dimension: Option<usize>,
}

impl Tables {
    fn accept_vector(&mut self, vector: &Vector) -> Result<()> {
        match self.dimension {
            Some(expected) => check_dimension(vector, expected),
            None => {
                let len = vector.as_slice().len();
                if len == 0 {
                    return Err(Error::InvalidInput("embedding is empty".to_string()));
                }
                self.dimension = Some(len);
                Ok(())
            }
        }
    }
}

/// Shared in-memory tables behind a single `RwLock`.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that only accepts vectors of `dimension` components.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables {
                dimension: Some(dimension),
                ..Default::default()
            })),
        }
    }

    pub fn knowledge(&self) -> Arc<dyn KnowledgeRepository> {
        Arc::new(InMemoryKnowledgeRepository {
            tables: self.tables.clone(),
        })
    }

    pub fn documents(&self) -> Arc<dyn DocumentRepository> {
        Arc::new(InMemoryDocumentRepository {
            tables: self.tables.clone(),
        })
    }

    pub fn scraped(&self) -> Arc<dyn ScrapedKnowledgeRepository> {
        Arc::new(InMemoryScrapedRepository {
            tables: self.tables.clone(),
        })
    }
}

struct InMemoryKnowledgeRepository {
    tables: Arc<RwLock<Tables>>,
}

#[async_trait]
impl KnowledgeRepository for InMemoryKnowledgeRepository {
    async fn create(&self, req: CreateKnowledgeRequest) -> Result<KnowledgeItem> {
        let content = repair_content(&req.content);
        if content.is_empty() {
            return Err(Error::InvalidInput(
                "knowledge content is empty".to_string(),
            ));
        }
        let now = Utc::now();
        let item = KnowledgeItem {
            id: Uuid::now_v7(),
            owner_id: req.owner_id,
            title: req.resolved_title(),
            content,
            source: req.source,
            filename: req.filename,
            mime_type: req.mime_type,
            embedding: None,
            embedding_model: None,
            created_at: now,
            updated_at: now,
        };
        self.tables
            .write()
            .await
            .knowledge
            .insert(item.id, item.clone());
        Ok(item)
    }

    async fn fetch(&self, id: Uuid, owner_id: Uuid) -> Result<KnowledgeItem> {
        self.tables
            .read()
            .await
            .knowledge
            .get(&id)
            .filter(|item| item.owner_id == owner_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("knowledge item {}", id)))
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<KnowledgeItem>> {
        let tables = self.tables.read().await;
        let mut items: Vec<KnowledgeItem> = tables
            .knowledge
            .values()
            .filter(|item| item.owner_id == owner_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn update_embedding(&self, id: Uuid, vector: &Vector, model: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.knowledge.contains_key(&id) {
            return Err(Error::NotFound(format!("knowledge item {}", id)));
        }
        tables.accept_vector(vector)?;
        if let Some(item) = tables.knowledge.get_mut(&id) {
            item.embedding = Some(vector.clone());
            item.embedding_model = Some(model.to_string());
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.knowledge.get(&id) {
            Some(item) if item.owner_id == owner_id => {
                tables.knowledge.remove(&id);
                Ok(())
            }
            _ => Err(Error::NotFound(format!("knowledge item {}", id))),
        }
    }

    async fn stats(&self, owner_id: Uuid) -> Result<KnowledgeStats> {
        let tables = self.tables.read().await;
        let mut stats = KnowledgeStats {
            counts_by_type: BTreeMap::new(),
            ..Default::default()
        };
        for item in tables.knowledge.values().filter(|i| i.owner_id == owner_id) {
            stats.total_entries += 1;
            stats.total_content_bytes += item.content.len() as i64;
            *stats
                .counts_by_type
                .entry(mime_category(item.mime_type.as_deref()).to_string())
                .or_insert(0) += 1;
        }
        Ok(stats)
    }

    async fn list_missing_embeddings(&self, limit: i64) -> Result<Vec<KnowledgeItem>> {
        let tables = self.tables.read().await;
        let mut items: Vec<KnowledgeItem> = tables
            .knowledge
            .values()
            .filter(|item| item.embedding.is_none())
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        items.truncate(limit.max(0) as usize);
        Ok(items)
    }
}

struct InMemoryDocumentRepository {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryDocumentRepository {
    async fn modify(&self, id: Uuid, f: impl FnOnce(&mut Document)) -> Result<()> {
        let mut tables = self.tables.write().await;
        let doc = tables
            .documents
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("document {}", id)))?;
        f(doc);
        Ok(())
    }
}

#[async_trait]
impl DocumentRepository for InMemoryDocumentRepository {
    async fn create_pending(&self, req: CreateDocumentRequest) -> Result<Document> {
        let doc = Document {
            id: Uuid::now_v7(),
            owner_id: req.owner_id,
            filename: req.filename,
            mime_type: req.mime_type,
            size_bytes: req.size_bytes,
            status: DocumentStatus::Processing,
            content: None,
            extraction_method: None,
            error: None,
            embedding: None,
            embedding_model: None,
            created_at: Utc::now(),
            expires_at: req.expires_at,
        };
        self.tables
            .write()
            .await
            .documents
            .insert(doc.id, doc.clone());
        Ok(doc)
    }

    async fn fetch(&self, id: Uuid, owner_id: Uuid) -> Result<Document> {
        self.tables
            .read()
            .await
            .documents
            .get(&id)
            .filter(|doc| doc.owner_id == owner_id && doc.expires_at > Utc::now())
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("document {}", id)))
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
        self.modify(id, |doc| {
            doc.status = DocumentStatus::Ready;
            doc.content = Some(content.to_string());
            doc.extraction_method = Some(method.as_str().to_string());
            doc.error = None;
        })
        .await
    }

    async fn fail_extraction(&self, id: Uuid, error: &str) -> Result<()> {
        self.modify(id, |doc| {
            doc.status = DocumentStatus::Failed;
            doc.error = Some(error.to_string());
        })
        .await
    }

    async fn update_embedding(&self, id: Uuid, vector: &Vector, model: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.documents.contains_key(&id) {
            return Err(Error::NotFound(format!("document {}", id)));
        }
        tables.accept_vector(vector)?;
        if let Some(doc) = tables.documents.get_mut(&id) {
            doc.embedding = Some(vector.clone());
            doc.embedding_model = Some(model.to_string());
        }
        Ok(())
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Document>> {
        let tables = self.tables.read().await;
        let now = Utc::now();
        let mut docs: Vec<Document> = tables
            .documents
            .values()
            .filter(|doc| doc.owner_id == owner_id && doc.expires_at > now)
            .cloned()
            .collect();
        docs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(docs)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.documents.len();
        tables.documents.retain(|_, doc| doc.expires_at > now);
        Ok((before - tables.documents.len()) as u64)
    }
}

struct InMemoryScrapedRepository {
    tables: Arc<RwLock<Tables>>,
}

#[async_trait]
impl ScrapedKnowledgeRepository for InMemoryScrapedRepository {
    async fn insert(&self, entry: NewScrapedEntry) -> Result<ScrapedEntry> {
        let mut tables = self.tables.write().await;
        let stored = ScrapedEntry {
            id: Uuid::now_v7(),
            url: entry.url,
            title: entry.title,
            content: entry.content,
            scraped_at: Utc::now(),
        };
        tables.scraped.retain(|e| e.url != stored.url);
        tables.scraped.push(stored.clone());
        Ok(stored)
    }

    async fn list_all(&self) -> Result<Vec<ScrapedEntry>> {
        let tables = self.tables.read().await;
        let mut entries = tables.scraped.clone();
        entries.sort_by(|a, b| b.scraped_at.cmp(&a.scraped_at).then(a.id.cmp(&b.id)));
        Ok(entries)
    }
}
