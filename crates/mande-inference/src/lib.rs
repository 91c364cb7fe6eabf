//! # mande-inference
//!
//! Inference backends for mande.
//!
//! This crate provides:
//! - Ollama implementation of the embedding and generation traits
//! - Bounded exponential retry for transient failures
//! - Deterministic hash-based embedding fallback
//! - [`ResilientEmbedder`], which never fails and degrades to the fallback
//! - A mock backend for tests
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use mande_core::TextEmbedder;
//! use mande_inference::{OllamaBackend, ResilientEmbedder};
//!
//! #[tokio::main]
//! async fn main() -> mande_core::Result<()> {
//!     let backend = Arc::new(OllamaBackend::from_env()?);
//!     let embedder = ResilientEmbedder::new(backend, Duration::from_secs(30));
//!     let outcome = embedder.embed("Hello").await;
//!     println!("{} via {}", outcome.model, outcome.source);
//!     Ok(())
//! }
//! ```

pub mod embedder;
pub mod fallback;
pub mod mock;
pub mod ollama;
pub mod retry;

pub use embedder::ResilientEmbedder;
pub use fallback::{hash_embedding, l2_normalize};
pub use ollama::{OllamaBackend, OllamaConfig};
pub use retry::RetryPolicy;
