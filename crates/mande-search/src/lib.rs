//! # mande-search
//!
//! Knowledge ranking for mande.
//!
//! This crate provides:
//! - Lexical scoring (phrase, whole-word, title and filename signals)
//! - Cosine similarity over stored vectors
//! - Hybrid ranking that blends similarity in only when vectors share a
//!   producer
//! - Nearest-document lookup within one owner's chat documents
//!
//! ## Example
//!
//! ```ignore
//! use mande_db::InMemoryStore;
//! use mande_search::KnowledgeSearchEngine;
//!
//! let store = InMemoryStore::new();
//! let engine = KnowledgeSearchEngine::new(store.knowledge(), store.scraped(), store.documents());
//! let hits = engine.search("budget", owner_id, 10).await?;
//! ```

pub mod engine;
pub mod lexical;
pub mod similarity;

// Re-export core types
pub use mande_core::*;

pub use engine::{
    KnowledgeSearchEngine, ScoredDocument, ScoredItem, ScoredScraped, SearchConfig,
};
pub use lexical::{Candidate, PreparedQuery, WordCapMode};
pub use similarity::{cosine_similarity, vector_similarity};
