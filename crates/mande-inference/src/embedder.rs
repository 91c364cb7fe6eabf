//! Embedding with graceful degradation.
//!
//! [`ResilientEmbedder`] calls the remote backend under a timeout and
//! substitutes the deterministic hash embedding whenever the remote call
//! fails, times out, or returns a vector of the wrong size.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use mande_core::{
    defaults, EmbeddingBackend, EmbeddingOutcome, EmbeddingSource, TextEmbedder, Vector,
};

use crate::fallback::hash_embedding;

/// Remote-first embedder that never fails.
#[derive(Clone)]
pub struct ResilientEmbedder {
    remote: Option<Arc<dyn EmbeddingBackend>>,
    timeout: Duration,
    dimension: usize,
}

impl ResilientEmbedder {
    pub fn new(remote: Arc<dyn EmbeddingBackend>, timeout: Duration) -> Self {
        let dimension = remote.dimension();
        Self {
            remote: Some(remote),
            timeout,
            dimension,
        }
    }

    /// An embedder that always uses the local hash approximation.
    pub fn fallback_only(dimension: usize) -> Self {
        Self {
            remote: None,
            timeout: Duration::from_secs(defaults::EMBED_TIMEOUT_SECS),
            dimension,
        }
    }

    fn fallback(&self, text: &str) -> EmbeddingOutcome {
        EmbeddingOutcome {
            vector: Vector::from(hash_embedding(text, self.dimension)),
            source: EmbeddingSource::Fallback,
            model: defaults::FALLBACK_EMBED_MODEL.to_string(),
        }
    }
}

#[async_trait]
impl TextEmbedder for ResilientEmbedder {
    #[instrument(skip(self, text), fields(subsystem = "inference", component = "embedder", op = "embed", text_len = text.len()))]
    async fn embed(&self, text: &str) -> EmbeddingOutcome {
        let Some(remote) = self.remote.as_ref() else {
            return self.fallback(text);
        };
        if text.trim().is_empty() {
            return self.fallback(text);
        }

        let start = Instant::now();
        let input = [text.to_string()];
        let reason = match tokio::time::timeout(self.timeout, remote.embed_texts(&input)).await {
            Ok(Ok(mut vectors)) if vectors.len() == 1 => {
                let vector = vectors.remove(0);
                if vector.as_slice().len() == self.dimension {
                    debug!(
                        embedding_source = "remote",
                        model = remote.model_name(),
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Remote embedding complete"
                    );
                    return EmbeddingOutcome {
                        vector,
                        source: EmbeddingSource::Remote,
                        model: remote.model_name().to_string(),
                    };
                }
                format!(
                    "dimension mismatch: expected {}, got {}",
                    self.dimension,
                    vector.as_slice().len()
                )
            }
            Ok(Ok(vectors)) => format!("expected 1 vector, got {}", vectors.len()),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {}s", self.timeout.as_secs_f32()),
        };

        warn!(
            embedding_source = "fallback",
            model = remote.model_name(),
            error = %reason,
            "Remote embedding unavailable, using hash fallback"
        );
        self.fallback(text)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockInferenceBackend;

    #[tokio::test]
    async fn test_remote_success() {
        let backend = Arc::new(MockInferenceBackend::new().with_dimension(16));
        let embedder = ResilientEmbedder::new(backend, Duration::from_secs(1));
        let out = embedder.embed("hello world").await;
        assert_eq!(out.source, EmbeddingSource::Remote);
        assert_eq!(out.model, "mock-embed");
        assert_eq!(out.vector.as_slice().len(), 16);
    }

    #[tokio::test]
    async fn test_failure_degrades_to_fallback() {
        let backend = Arc::new(
            MockInferenceBackend::new()
                .with_dimension(16)
                .with_embedding_failure(),
        );
        let embedder = ResilientEmbedder::new(backend, Duration::from_secs(1));
        let out = embedder.embed("hello world").await;
        assert_eq!(out.source, EmbeddingSource::Fallback);
        assert_eq!(out.model, defaults::FALLBACK_EMBED_MODEL);
        assert_eq!(out.vector.as_slice(), hash_embedding("hello world", 16).as_slice());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_degrades_to_fallback() {
        let backend = Arc::new(
            MockInferenceBackend::new()
                .with_dimension(16)
                .with_latency_ms(60_000),
        );
        let embedder = ResilientEmbedder::new(backend, Duration::from_secs(2));
        let out = embedder.embed("slow text").await;
        assert_eq!(out.source, EmbeddingSource::Fallback);
    }

    #[tokio::test]
    async fn test_wrong_dimension_degrades_to_fallback() {
        let backend = Arc::new(
            MockInferenceBackend::new()
                .with_dimension(16)
                .with_returned_dimension(8),
        );
        let embedder = ResilientEmbedder::new(backend, Duration::from_secs(1));
        let out = embedder.embed("hello").await;
        assert_eq!(out.source, EmbeddingSource::Fallback);
        assert_eq!(out.vector.as_slice().len(), 16);
    }

    #[tokio::test]
    async fn test_fallback_only_is_deterministic() {
        let embedder = ResilientEmbedder::fallback_only(32);
        let a = embedder.embed("same text").await;
        let b = embedder.embed("same text").await;
        assert_eq!(a.vector, b.vector);
        assert_eq!(embedder.dimension(), 32);
    }
}
