//! Mock inference backend for deterministic testing.
//!
//! Embeddings reuse the hash approximation so similarity between mock
//! vectors is meaningful; generation returns a fixed response and records
//! every prompt it received.
//!
//! ```rust
//! use mande_inference::mock::MockInferenceBackend;
//!
//! let backend = MockInferenceBackend::new()
//!     .with_dimension(384)
//!     .with_fixed_response("Test response");
//! assert!(backend.prompts().is_empty());
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use mande_core::{
    CancellationSignal, EmbeddingBackend, Error, GenerationBackend, GenerationRequest,
    InferenceBackend, Result, Vector,
};

use crate::fallback::hash_embedding;

#[derive(Debug, Clone)]
struct MockConfig {
    dimension: usize,
    returned_dimension: Option<usize>,
    response: String,
    latency: Duration,
    fail_embeddings: bool,
    fail_generation: Option<fn(String) -> Error>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            dimension: 768,
            returned_dimension: None,
            response: "Mock response".to_string(),
            latency: Duration::ZERO,
            fail_embeddings: false,
            fail_generation: None,
        }
    }
}

/// Mock inference backend for testing.
#[derive(Clone, Default)]
pub struct MockInferenceBackend {
    config: Arc<MockConfig>,
    prompts: Arc<Mutex<Vec<GenerationRequest>>>,
    embed_calls: Arc<Mutex<usize>>,
}

impl MockInferenceBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        Arc::make_mut(&mut self.config).dimension = dimension;
        self
    }

    /// Return vectors of a different size than `dimension()` reports.
    pub fn with_returned_dimension(mut self, dimension: usize) -> Self {
        Arc::make_mut(&mut self.config).returned_dimension = Some(dimension);
        self
    }

    pub fn with_fixed_response(mut self, response: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).response = response.into();
        self
    }

    /// Simulated latency applied to every call.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency = Duration::from_millis(latency_ms);
        self
    }

    pub fn with_embedding_failure(mut self) -> Self {
        Arc::make_mut(&mut self.config).fail_embeddings = true;
        self
    }

    /// Fail every generation call with the given error variant.
    pub fn with_generation_failure(mut self, kind: fn(String) -> Error) -> Self {
        Arc::make_mut(&mut self.config).fail_generation = Some(kind);
        self
    }

    /// Generation requests received so far.
    pub fn prompts(&self) -> Vec<GenerationRequest> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    pub fn embed_call_count(&self) -> usize {
        self.embed_calls.lock().map(|n| *n).unwrap_or_default()
    }

    async fn simulate_latency(&self) {
        if !self.config.latency.is_zero() {
            tokio::time::sleep(self.config.latency).await;
        }
    }
}

#[async_trait]
impl EmbeddingBackend for MockInferenceBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        if let Ok(mut n) = self.embed_calls.lock() {
            *n += 1;
        }
        self.simulate_latency().await;
        if self.config.fail_embeddings {
            return Err(Error::Transient("mock embedding failure".to_string()));
        }
        let dimension = self
            .config
            .returned_dimension
            .unwrap_or(self.config.dimension);
        Ok(texts
            .iter()
            .map(|t| Vector::from(hash_embedding(t, dimension)))
            .collect())
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embed"
    }
}

#[async_trait]
impl GenerationBackend for MockInferenceBackend {
    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationSignal,
    ) -> Result<String> {
        if request.prompt.trim().is_empty() {
            return Err(Error::InvalidInput("prompt is empty".to_string()));
        }
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(request.clone());
        }
        cancel
            .run(async {
                self.simulate_latency().await;
                match self.config.fail_generation {
                    Some(kind) => Err(kind("mock generation failure".to_string())),
                    None => Ok(self.config.response.clone()),
                }
            })
            .await
    }

    fn model_name(&self) -> &str {
        "mock-gen"
    }
}

#[async_trait]
impl InferenceBackend for MockInferenceBackend {
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mande_core::CancelHandle;

    #[tokio::test]
    async fn test_embeddings_are_deterministic() {
        let backend = MockInferenceBackend::new().with_dimension(32);
        let texts = vec!["alpha".to_string(), "alpha".to_string()];
        let vectors = backend.embed_texts(&texts).await.unwrap();
        assert_eq!(vectors[0], vectors[1]);
        assert_eq!(backend.embed_call_count(), 1);
    }

    #[tokio::test]
    async fn test_generation_records_prompts() {
        let backend = MockInferenceBackend::new().with_fixed_response("ok");
        let out = backend
            .generate(&GenerationRequest::new("question"), &CancellationSignal::never())
            .await
            .unwrap();
        assert_eq!(out, "ok");
        assert_eq!(backend.prompts()[0].prompt, "question");
    }

    #[tokio::test(start_paused = true)]
    async fn test_generation_honours_cancellation() {
        let backend = MockInferenceBackend::new().with_latency_ms(60_000);
        let handle = CancelHandle::new();
        let signal = handle.signal();
        let task = tokio::spawn(async move {
            backend
                .generate(&GenerationRequest::new("slow"), &signal)
                .await
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.cancel();
        let res = task.await.unwrap();
        assert!(matches!(res, Err(Error::Cancelled(_))));
    }
}
