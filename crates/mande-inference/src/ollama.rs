//! Ollama inference backend implementation.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use mande_core::{
    defaults, CancellationSignal, EmbeddingBackend, Error, GenerationBackend, GenerationRequest,
    InferenceBackend, Result, Vector,
};

use crate::retry::RetryPolicy;

/// Ollama connection and model settings.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub embed_model: String,
    pub gen_model: String,
    pub dimension: usize,
    pub embed_timeout: Duration,
    pub gen_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::OLLAMA_URL.to_string(),
            embed_model: defaults::EMBED_MODEL.to_string(),
            gen_model: defaults::GEN_MODEL.to_string(),
            dimension: defaults::EMBED_DIMENSION,
            embed_timeout: Duration::from_secs(defaults::EMBED_TIMEOUT_SECS),
            gen_timeout: Duration::from_secs(defaults::GEN_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        }
    }
}

impl OllamaConfig {
    /// Create from environment variables.
    pub fn from_env() -> Self {
        let env_u64 = |key: &str, default: u64| {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(default)
        };

        Self {
            base_url: std::env::var("OLLAMA_BASE")
                .unwrap_or_else(|_| defaults::OLLAMA_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            embed_model: std::env::var("OLLAMA_EMBED_MODEL")
                .unwrap_or_else(|_| defaults::EMBED_MODEL.to_string()),
            gen_model: std::env::var("OLLAMA_GEN_MODEL")
                .unwrap_or_else(|_| defaults::GEN_MODEL.to_string()),
            dimension: std::env::var("MANDE_EMBED_DIM")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults::EMBED_DIMENSION),
            embed_timeout: Duration::from_secs(env_u64(
                "MANDE_EMBED_TIMEOUT_SECS",
                defaults::EMBED_TIMEOUT_SECS,
            )),
            gen_timeout: Duration::from_secs(env_u64(
                "MANDE_GEN_TIMEOUT_SECS",
                defaults::GEN_TIMEOUT_SECS,
            )),
            retry: RetryPolicy::from_env(),
        }
    }
}

/// Ollama inference backend.
pub struct OllamaBackend {
    client: Client,
    config: OllamaConfig,
}

impl OllamaBackend {
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.gen_timeout.max(config.embed_timeout))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "inference",
            component = "ollama",
            url = %config.base_url,
            embed_model = %config.embed_model,
            gen_model = %config.gen_model,
            dimension = config.dimension,
            "Initializing Ollama backend"
        );

        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(OllamaConfig::from_env())
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    async fn embed_once(&self, request: &EmbeddingRequest<'_>) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(format!("{}/api/embed", self.config.base_url))
            .timeout(self.config.embed_timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| send_error(e, Error::Embedding))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body, Error::Embedding));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Failed to parse response: {}", e)))?;
        Ok(result.embeddings)
    }

    async fn chat_once(&self, request: &ChatRequest<'_>) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/api/chat", self.config.base_url))
            .timeout(self.config.gen_timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| send_error(e, Error::Inference))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body, Error::Inference));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;
        Ok(result.message.content)
    }
}

/// Timeouts and refused connections are transient; anything else is permanent.
fn send_error(e: reqwest::Error, permanent: fn(String) -> Error) -> Error {
    if e.is_timeout() || e.is_connect() {
        Error::Transient(format!("Request failed: {}", e))
    } else {
        permanent(format!("Request failed: {}", e))
    }
}

/// 5xx, 429 and 408 are transient; other statuses are permanent.
fn status_error(status: StatusCode, body: String, permanent: fn(String) -> Error) -> Error {
    let msg = format!("Ollama returned {}: {}", status, body);
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        Error::Transient(msg)
    } else {
        permanent(msg)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize, Deserialize, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Sampling options in Ollama's naming.
#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
    top_k: u32,
    top_p: f32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[async_trait]
impl EmbeddingBackend for OllamaBackend {
    #[instrument(skip(self, texts), fields(subsystem = "inference", component = "ollama", op = "embed_texts", model = %self.config.embed_model, input_count = texts.len()))]
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let start = Instant::now();
        let request = EmbeddingRequest {
            model: &self.config.embed_model,
            input: texts,
        };

        let embeddings = self
            .config
            .retry
            .run("embed", || self.embed_once(&request))
            .await?;

        if embeddings.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }
        if let Some(bad) = embeddings.iter().find(|v| v.len() != self.config.dimension) {
            return Err(Error::Embedding(format!(
                "Dimension mismatch: expected {}, got {}",
                self.config.dimension,
                bad.len()
            )));
        }

        let vectors: Vec<Vector> = embeddings.into_iter().map(Vector::from).collect();
        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            result_count = vectors.len(),
            duration_ms = elapsed,
            "Embedding complete"
        );
        if elapsed > 5000 {
            warn!(
                duration_ms = elapsed,
                input_count = texts.len(),
                slow = true,
                "Slow embedding operation"
            );
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        &self.config.embed_model
    }
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    #[instrument(skip(self, request, cancel), fields(subsystem = "inference", component = "ollama", op = "generate", model = %self.config.gen_model, prompt_len = request.prompt.len()))]
    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationSignal,
    ) -> Result<String> {
        if request.prompt.trim().is_empty() {
            return Err(Error::InvalidInput("prompt is empty".to_string()));
        }

        let start = Instant::now();
        let mut messages = Vec::new();
        if !request.system.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: request.system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: request.prompt.clone(),
        });

        let body = ChatRequest {
            model: &self.config.gen_model,
            messages,
            stream: false,
            options: ChatOptions {
                temperature: request.options.temperature,
                num_predict: request.options.max_tokens,
                top_k: request.options.top_k,
                top_p: request.options.top_p,
            },
        };

        let content = cancel
            .run(self.config.retry.run("generate", || self.chat_once(&body)))
            .await?;

        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            response_len = content.len(),
            duration_ms = elapsed,
            "Generation complete"
        );
        if elapsed > 30000 {
            warn!(
                duration_ms = elapsed,
                prompt_len = request.prompt.len(),
                slow = true,
                "Slow generation operation"
            );
        }
        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.config.gen_model
    }
}

#[async_trait]
impl InferenceBackend for OllamaBackend {
    async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.config.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                debug!("Ollama health check passed");
                Ok(true)
            }
            Ok(resp) => {
                warn!("Ollama health check failed: {}", resp.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Ollama health check error: {}", e);
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OllamaConfig::default();
        assert_eq!(config.base_url, "http://127.0.0.1:11434");
        assert_eq!(config.embed_model, "nomic-embed-text");
        assert_eq!(config.dimension, 768);
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_status_classification() {
        let e = status_error(StatusCode::SERVICE_UNAVAILABLE, "busy".into(), Error::Inference);
        assert!(e.is_transient());
        let e = status_error(StatusCode::TOO_MANY_REQUESTS, String::new(), Error::Inference);
        assert!(e.is_transient());
        let e = status_error(StatusCode::NOT_FOUND, "model not found".into(), Error::Embedding);
        assert!(matches!(e, Error::Embedding(_)));
        assert!(e.to_string().contains("model not found"));
    }

    #[test]
    fn test_chat_request_serialization() {
        let body = ChatRequest {
            model: "llama3.1:8b",
            messages: vec![ChatMessage {
                role: "user".into(),
                content: "hi".into(),
            }],
            stream: false,
            options: ChatOptions {
                temperature: 0.5,
                num_predict: 64,
                top_k: 40,
                top_p: 0.9,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "llama3.1:8b");
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_predict"], 64);
        assert_eq!(json["options"]["top_k"], 40);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_embedding_response_deserialization() {
        let json = r#"{"model":"nomic-embed-text","embeddings":[[0.1,0.2],[0.3,0.4]]}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.embeddings.len(), 2);
        assert_eq!(parsed.embeddings[1], vec![0.3, 0.4]);
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected_without_network() {
        let backend = OllamaBackend::new(OllamaConfig {
            base_url: "http://127.0.0.1:9".into(),
            ..OllamaConfig::default()
        })
        .unwrap();
        let err = backend
            .generate(&GenerationRequest::new("   "), &CancellationSignal::never())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
