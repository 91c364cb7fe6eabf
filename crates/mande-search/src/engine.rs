//! Owner-scoped knowledge ranking.
//!
//! Every candidate gets a lexical score. When the query and the candidate
//! both carry vectors from the same embedding model, cosine similarity is
//! blended in; vectors from different producers are never compared.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, instrument, trace, warn};
use uuid::Uuid;

use mande_core::defaults::{
    LEXICAL_WEIGHT, QUERY_EMBED_TIMEOUT_MS, SEARCH_LIMIT, SEARCH_MIN_SCORE, SEMANTIC_WEIGHT,
};
use mande_core::{
    Document, DocumentRepository, DocumentStatus, EmbeddingOutcome, KnowledgeItem,
    KnowledgeRepository, Result, ScrapedEntry, ScrapedKnowledgeRepository, TextEmbedder,
};

use crate::lexical::{Candidate, PreparedQuery, WordCapMode};
use crate::similarity::vector_similarity;

/// Configuration for knowledge search.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Weight of the lexical score.
    pub lexical_weight: f32,
    /// Weight of cosine similarity when vectors are comparable.
    pub semantic_weight: f32,
    /// Results at or below this score are discarded.
    pub min_score: f32,
    /// Word-match cap interpretation.
    pub cap_mode: WordCapMode,
    /// Time allowed for embedding the query before falling back to
    /// lexical-only ranking.
    pub query_embed_timeout: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            lexical_weight: LEXICAL_WEIGHT,
            semantic_weight: SEMANTIC_WEIGHT,
            min_score: SEARCH_MIN_SCORE,
            cap_mode: WordCapMode::PerWord,
            query_embed_timeout: Duration::from_millis(QUERY_EMBED_TIMEOUT_MS),
        }
    }
}

impl SearchConfig {
    /// Config with lexical scoring only.
    pub fn lexical_only() -> Self {
        Self {
            semantic_weight: 0.0,
            ..Default::default()
        }
    }

    pub fn with_weights(mut self, lexical: f32, semantic: f32) -> Self {
        self.lexical_weight = lexical;
        self.semantic_weight = semantic;
        self
    }

    pub fn with_cap_mode(mut self, mode: WordCapMode) -> Self {
        self.cap_mode = mode;
        self
    }

    pub fn with_query_embed_timeout(mut self, timeout: Duration) -> Self {
        self.query_embed_timeout = timeout;
        self
    }
}

/// A knowledge item with its relevance.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredItem {
    #[serde(flatten)]
    pub item: KnowledgeItem,
    pub score: f32,
    pub lexical_score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_score: Option<f32>,
}

/// A scraped entry with its lexical relevance.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredScraped {
    #[serde(flatten)]
    pub entry: ScrapedEntry,
    pub score: f32,
}

/// A document with its similarity to a reference document.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredDocument {
    #[serde(flatten)]
    pub document: Document,
    pub similarity: f32,
}

/// Ranks knowledge items, scraped entries and documents.
#[derive(Clone)]
pub struct KnowledgeSearchEngine {
    knowledge: Arc<dyn KnowledgeRepository>,
    scraped: Arc<dyn ScrapedKnowledgeRepository>,
    documents: Arc<dyn DocumentRepository>,
    embedder: Option<Arc<dyn TextEmbedder>>,
    config: SearchConfig,
}

impl KnowledgeSearchEngine {
    pub fn new(
        knowledge: Arc<dyn KnowledgeRepository>,
        scraped: Arc<dyn ScrapedKnowledgeRepository>,
        documents: Arc<dyn DocumentRepository>,
    ) -> Self {
        Self {
            knowledge,
            scraped,
            documents,
            embedder: None,
            config: SearchConfig::default(),
        }
    }

    /// Embed queries with `embedder` so stored vectors can contribute.
    pub fn with_embedder(mut self, embedder: Arc<dyn TextEmbedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Rank `owner_id`'s knowledge items against `query`.
    ///
    /// A blank query or a zero limit yields no results.
    #[instrument(skip(self), fields(subsystem = "search", component = "engine", op = "search", result_count = tracing::field::Empty))]
    pub async fn search(
        &self,
        query: &str,
        owner_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ScoredItem>> {
        let start = Instant::now();
        let Some(prepared) = PreparedQuery::new(query, self.config.cap_mode) else {
            return Ok(Vec::new());
        };
        if limit == 0 {
            return Ok(Vec::new());
        }

        let items = self.knowledge.list_by_owner(owner_id).await?;
        let query_vector = self.query_vector(query, &items).await;

        let mut scored: Vec<ScoredItem> = items
            .into_iter()
            .filter_map(|item| {
                let lexical = prepared.score(Candidate {
                    content: &item.content,
                    title: &item.title,
                    filename: item.filename.as_deref(),
                });
                let semantic = query_vector
                    .as_ref()
                    .and_then(|q| semantic_score(q, &item));
                let score = self.config.lexical_weight * lexical
                    + semantic
                        .map(|s| self.config.semantic_weight * s.max(0.0))
                        .unwrap_or(0.0);
                trace!(item_id = %item.id, lexical, ?semantic, score, "Scored item");

                (score > self.config.min_score).then_some(ScoredItem {
                    item,
                    score,
                    lexical_score: lexical,
                    semantic_score: semantic,
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            desc(a.score, b.score)
                .then_with(|| b.item.updated_at.cmp(&a.item.updated_at))
                .then_with(|| a.item.id.cmp(&b.item.id))
        });
        scored.truncate(limit);

        tracing::Span::current().record("result_count", scored.len());
        debug!(
            hybrid = query_vector.is_some(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Knowledge search complete"
        );
        Ok(scored)
    }

    /// [`search`](Self::search) with the default limit.
    pub async fn search_default(&self, query: &str, owner_id: Uuid) -> Result<Vec<ScoredItem>> {
        self.search(query, owner_id, SEARCH_LIMIT).await
    }

    /// Rank scraped entries lexically; title and URL take the title and
    /// filename roles.
    #[instrument(skip(self), fields(subsystem = "search", component = "engine", op = "search_scraped"))]
    pub async fn search_scraped(&self, query: &str, limit: usize) -> Result<Vec<ScoredScraped>> {
        let Some(prepared) = PreparedQuery::new(query, self.config.cap_mode) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<ScoredScraped> = self
            .scraped
            .list_all()
            .await?
            .into_iter()
            .filter_map(|entry| {
                let score = prepared.score(Candidate {
                    content: &entry.content,
                    title: &entry.title,
                    filename: Some(&entry.url),
                });
                (score > self.config.min_score).then_some(ScoredScraped { entry, score })
            })
            .collect();

        scored.sort_by(|a, b| {
            desc(a.score, b.score)
                .then_with(|| b.entry.scraped_at.cmp(&a.entry.scraped_at))
                .then_with(|| a.entry.id.cmp(&b.entry.id))
        });
        scored.truncate(limit);
        Ok(scored)
    }

    /// Rank the owner's other ready documents by similarity to `document_id`.
    ///
    /// Only documents embedded by the same model are compared. Returns
    /// `NotFound` when the reference document is missing or foreign, and an
    /// empty list when it has no vector yet.
    #[instrument(skip(self), fields(subsystem = "search", component = "engine", op = "nearest_documents"))]
    pub async fn nearest_documents(
        &self,
        owner_id: Uuid,
        document_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ScoredDocument>> {
        let reference = self.documents.fetch(document_id, owner_id).await?;
        let (Some(ref_vector), Some(ref_model)) =
            (reference.embedding.as_ref(), reference.embedding_model.as_deref())
        else {
            debug!("Reference document has no embedding yet");
            return Ok(Vec::new());
        };

        let mut scored: Vec<ScoredDocument> = self
            .documents
            .list_by_owner(owner_id)
            .await?
            .into_iter()
            .filter(|doc| doc.id != document_id && doc.status == DocumentStatus::Ready)
            .filter(|doc| doc.embedding_model.as_deref() == Some(ref_model))
            .filter_map(|doc| {
                let similarity = vector_similarity(ref_vector, doc.embedding.as_ref()?).ok()?;
                Some(ScoredDocument {
                    document: doc,
                    similarity,
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            desc(a.similarity, b.similarity)
                .then_with(|| b.document.created_at.cmp(&a.document.created_at))
                .then_with(|| a.document.id.cmp(&b.document.id))
        });
        scored.truncate(limit);
        Ok(scored)
    }

    /// Embed the query only when some candidate carries a vector, within
    /// `query_embed_timeout`.
    async fn query_vector(&self, query: &str, items: &[KnowledgeItem]) -> Option<EmbeddingOutcome> {
        if self.config.semantic_weight == 0.0 {
            return None;
        }
        let embedder = self.embedder.as_ref()?;
        if !items.iter().any(KnowledgeItem::has_embedding) {
            return None;
        }
        let budget = self.config.query_embed_timeout;
        match tokio::time::timeout(budget, embedder.embed(query)).await {
            Ok(outcome) => Some(outcome),
            Err(_) => {
                warn!(
                    timeout_ms = budget.as_millis() as u64,
                    "Query embedding timed out, ranking lexically"
                );
                None
            }
        }
    }
}

/// Cosine similarity when the item vector came from the query's model.
fn semantic_score(query: &EmbeddingOutcome, item: &KnowledgeItem) -> Option<f32> {
    if item.embedding_model.as_deref() != Some(query.model.as_str()) {
        return None;
    }
    match vector_similarity(&query.vector, item.embedding.as_ref()?) {
        Ok(similarity) => Some(similarity),
        Err(e) => {
            debug!(item_id = %item.id, error = %e, "Skipping incomparable vector");
            None
        }
    }
}

fn desc(a: f32, b: f32) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}
