//! Prompt context assembly.
//!
//! Sections are placed in a fixed order:
//!
//! 1. preamble, followed by the most recent prior turns
//! 2. ranked knowledge results, each truncated
//! 3. documents referenced with a `[document:<uuid>]` marker, in full
//! 4. organisation-wide scraped entries, each truncated
//! 5. the user question with markers removed
//! 6. closing instructions
//!
//! Empty sections are omitted.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, instrument};
use uuid::Uuid;

use mande_core::defaults::{
    CONTEXT_HISTORY_TURNS, CONTEXT_KNOWLEDGE_CHARS, CONTEXT_KNOWLEDGE_LIMIT,
    CONTEXT_SCRAPED_CHARS, CONTEXT_SCRAPED_LIMIT,
};
use mande_core::{
    truncate_chars, ChatRole, ChatTurn, DocumentRepository, DocumentStatus, Error, Result,
};
use mande_search::KnowledgeSearchEngine;

static DOCUMENT_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[document:([0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12})\]")
        .expect("valid regex")
});

static EXTRA_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").expect("valid regex"));

const DEFAULT_PREAMBLE: &str = "You are a monitoring and evaluation assistant. \
Answer using the context below when it is relevant and say so when it is not.";

const DEFAULT_CLOSING: &str = "Answer the question above. Cite the knowledge titles or \
document names you relied on. If the context does not contain the answer, say that you do not know.";

/// Limits and fixed text for context assembly.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    pub preamble: String,
    pub closing: String,
    pub knowledge_limit: usize,
    pub knowledge_chars: usize,
    pub scraped_limit: usize,
    pub scraped_chars: usize,
    pub history_turns: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            preamble: DEFAULT_PREAMBLE.to_string(),
            closing: DEFAULT_CLOSING.to_string(),
            knowledge_limit: CONTEXT_KNOWLEDGE_LIMIT,
            knowledge_chars: CONTEXT_KNOWLEDGE_CHARS,
            scraped_limit: CONTEXT_SCRAPED_LIMIT,
            scraped_chars: CONTEXT_SCRAPED_CHARS,
            history_turns: CONTEXT_HISTORY_TURNS,
        }
    }
}

impl ContextConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `MANDE_CONTEXT_PREAMBLE` | built-in | Instruction preamble |
    /// | `MANDE_CONTEXT_CLOSING` | built-in | Closing instruction block |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            preamble: std::env::var("MANDE_CONTEXT_PREAMBLE").unwrap_or(defaults.preamble),
            closing: std::env::var("MANDE_CONTEXT_CLOSING").unwrap_or(defaults.closing),
            ..defaults
        }
    }

    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = preamble.into();
        self
    }

    pub fn with_closing(mut self, closing: impl Into<String>) -> Self {
        self.closing = closing.into();
        self
    }
}

/// Something that contributed to an assembled prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContextSource {
    Knowledge { id: Uuid, title: String, score: f32 },
    Document { id: Uuid, filename: String, status: DocumentStatus },
    Scraped { url: String, title: String, score: f32 },
}

/// A prompt ready for generation plus what went into it.
#[derive(Debug, Clone, Serialize)]
pub struct AssembledContext {
    pub prompt: String,
    pub sources: Vec<ContextSource>,
}

/// Document ids referenced in `message`, in order of first appearance.
pub fn document_references(message: &str) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = Vec::new();
    for caps in DOCUMENT_MARKER.captures_iter(message) {
        if let Ok(id) = Uuid::parse_str(&caps[1]) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

/// `message` with document markers removed.
pub fn strip_document_markers(message: &str) -> String {
    let stripped = DOCUMENT_MARKER.replace_all(message, "");
    EXTRA_SPACES.replace_all(stripped.trim(), " ").into_owned()
}

/// Builds generation prompts from search results and referenced documents.
#[derive(Clone)]
pub struct ContextAssembler {
    search: KnowledgeSearchEngine,
    documents: Arc<dyn DocumentRepository>,
    config: ContextConfig,
}

impl ContextAssembler {
    pub fn new(
        search: KnowledgeSearchEngine,
        documents: Arc<dyn DocumentRepository>,
        config: ContextConfig,
    ) -> Self {
        Self {
            search,
            documents,
            config,
        }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    #[instrument(skip(self, query, history), fields(subsystem = "api", component = "context", op = "build_context", owner_id = %owner_id, history_turns = history.len()))]
    pub async fn build_context(
        &self,
        query: &str,
        owner_id: Uuid,
        history: &[ChatTurn],
    ) -> Result<AssembledContext> {
        let question = strip_document_markers(query);
        let mut sections: Vec<String> = Vec::with_capacity(6);
        let mut sources = Vec::new();

        sections.push(self.preamble(history));

        let knowledge = self
            .search
            .search(&question, owner_id, self.config.knowledge_limit)
            .await?;
        if !knowledge.is_empty() {
            let mut section = String::from("Relevant knowledge:");
            for hit in &knowledge {
                section.push_str(&format!(
                    "\n- {}: {}",
                    hit.item.title,
                    truncate_chars(&hit.item.content, self.config.knowledge_chars)
                ));
                sources.push(ContextSource::Knowledge {
                    id: hit.item.id,
                    title: hit.item.title.clone(),
                    score: hit.score,
                });
            }
            sections.push(section);
        }

        for id in document_references(query) {
            let document = match self.documents.fetch(id, owner_id).await {
                Ok(doc) => doc,
                Err(Error::NotFound(_)) => {
                    debug!(document_id = %id, "Referenced document not available, skipping");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let body = match document.status {
                DocumentStatus::Ready => document.content.clone().unwrap_or_default(),
                DocumentStatus::Processing => {
                    "[This document is still being processed; its content is not available yet.]"
                        .to_string()
                }
                DocumentStatus::Failed => format!(
                    "[This document could not be read: {}]",
                    document.error.as_deref().unwrap_or("unknown error")
                ),
            };
            sections.push(format!("Document \"{}\":\n{}", document.filename, body));
            sources.push(ContextSource::Document {
                id: document.id,
                filename: document.filename,
                status: document.status,
            });
        }

        let scraped = self
            .search
            .search_scraped(&question, self.config.scraped_limit)
            .await?;
        if !scraped.is_empty() {
            let mut section = String::from("Organisation knowledge:");
            for hit in &scraped {
                section.push_str(&format!(
                    "\n- {} ({}): {}",
                    hit.entry.title,
                    hit.entry.url,
                    truncate_chars(&hit.entry.content, self.config.scraped_chars)
                ));
                sources.push(ContextSource::Scraped {
                    url: hit.entry.url.clone(),
                    title: hit.entry.title.clone(),
                    score: hit.score,
                });
            }
            sections.push(section);
        }

        sections.push(format!("User question: {}", question));
        sections.push(self.config.closing.clone());

        let prompt = sections.join("\n\n");
        debug!(
            prompt_len = prompt.len(),
            sources = sources.len(),
            "Context assembled"
        );
        Ok(AssembledContext { prompt, sources })
    }

    fn preamble(&self, history: &[ChatTurn]) -> String {
        let mut preamble = self.config.preamble.clone();
        let recent = &history[history.len().saturating_sub(self.config.history_turns)..];
        if !recent.is_empty() {
            preamble.push_str("\n\nConversation so far:");
            for turn in recent {
                let speaker = match turn.role {
                    ChatRole::User => "User",
                    ChatRole::Assistant => "Assistant",
                };
                preamble.push_str(&format!("\n{}: {}", speaker, turn.content));
            }
        }
        preamble
    }
}
