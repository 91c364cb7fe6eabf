//! Extraction registry and the fallback-chain engine.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use mande_core::defaults::{EXTRACTION_CMD_TIMEOUT_SECS, MAX_UPLOAD_SIZE_BYTES};
use mande_core::{
    resolve_format, validate_upload, Error, ExtractionAttempt, ExtractionMethod,
    ExtractionOutcome, Result, TextExtractor,
};

use crate::adapters::{
    AlternateEncodingExtractor, ByteScanExtractor, DocxTextExtractor, LegacyDocExtractor,
    PandocExtractor, PdfTextExtractor, Utf8TextExtractor,
};

/// Configuration for the extraction engine.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Uploads above this size are rejected before extraction.
    pub max_upload_bytes: usize,
    /// Probe for pandoc at startup.
    pub pandoc_enabled: bool,
    /// Upper bound on a single extractor invocation.
    pub attempt_timeout: Duration,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: MAX_UPLOAD_SIZE_BYTES,
            pandoc_enabled: true,
            attempt_timeout: Duration::from_secs(EXTRACTION_CMD_TIMEOUT_SECS),
        }
    }
}

impl ExtractionConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `MANDE_MAX_UPLOAD_BYTES` | `52428800` | Upload size ceiling |
    /// | `MANDE_PANDOC_ENABLED` | `true` | Probe and register pandoc |
    pub fn from_env() -> Self {
        let max_upload_bytes = std::env::var("MANDE_MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(MAX_UPLOAD_SIZE_BYTES);

        let pandoc_enabled = std::env::var("MANDE_PANDOC_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        Self {
            max_upload_bytes,
            pandoc_enabled,
            ..Self::default()
        }
    }

    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    pub fn with_pandoc(mut self, enabled: bool) -> Self {
        self.pandoc_enabled = enabled;
        self
    }
}

/// Registry mapping extraction methods to their implementations.
pub struct ExtractionRegistry {
    extractors: HashMap<ExtractionMethod, Arc<dyn TextExtractor>>,
}

impl ExtractionRegistry {
    pub fn new() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// Register an extractor. Replaces any existing one for the same method.
    pub fn register(&mut self, extractor: Arc<dyn TextExtractor>) {
        self.extractors.insert(extractor.method(), extractor);
    }

    pub fn get(&self, method: ExtractionMethod) -> Option<&Arc<dyn TextExtractor>> {
        self.extractors.get(&method)
    }

    pub fn has_extractor(&self, method: ExtractionMethod) -> bool {
        self.extractors.contains_key(&method)
    }

    /// Registered methods in a stable order.
    pub fn available_methods(&self) -> Vec<ExtractionMethod> {
        let mut methods: Vec<_> = self.extractors.keys().copied().collect();
        methods.sort();
        methods
    }
}

impl Default for ExtractionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Startup health of every candidate extractor.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractorReadiness {
    pub methods: BTreeMap<ExtractionMethod, bool>,
}

impl ExtractorReadiness {
    pub fn is_ready(&self, method: ExtractionMethod) -> bool {
        self.methods.get(&method).copied().unwrap_or(false)
    }
}

/// Converts uploaded bytes into text, walking the fallback chain.
pub struct ExtractionEngine {
    registry: ExtractionRegistry,
    readiness: ExtractorReadiness,
    config: ExtractionConfig,
}

/// Built-in extractors for the given configuration.
pub fn builtin_extractors(config: &ExtractionConfig) -> Vec<Arc<dyn TextExtractor>> {
    let mut extractors: Vec<Arc<dyn TextExtractor>> = vec![
        Arc::new(PdfTextExtractor),
        Arc::new(DocxTextExtractor),
        Arc::new(LegacyDocExtractor),
        Arc::new(Utf8TextExtractor),
        Arc::new(AlternateEncodingExtractor),
        Arc::new(ByteScanExtractor),
    ];
    if config.pandoc_enabled {
        extractors.push(Arc::new(
            PandocExtractor::new().with_timeout(config.attempt_timeout),
        ));
    }
    extractors
}

impl ExtractionEngine {
    /// Probe the built-in extractors once and register the healthy ones.
    pub async fn initialize(config: ExtractionConfig) -> Self {
        let candidates = builtin_extractors(&config);
        Self::initialize_with(config, candidates).await
    }

    /// Probe `candidates` once and register the healthy ones.
    pub async fn initialize_with(
        config: ExtractionConfig,
        candidates: Vec<Arc<dyn TextExtractor>>,
    ) -> Self {
        let mut registry = ExtractionRegistry::new();
        let mut readiness = ExtractorReadiness::default();

        for extractor in candidates {
            let method = extractor.method();
            let healthy = extractor.health_check().await.unwrap_or(false);
            readiness.methods.insert(method, healthy);
            if healthy {
                debug!(method = %method, name = extractor.name(), "Registered extractor");
                registry.register(extractor);
            } else {
                warn!(
                    method = %method,
                    name = extractor.name(),
                    "Extractor unavailable, removed from fallback chain"
                );
            }
        }

        info!(
            subsystem = "jobs",
            component = "extraction",
            available = ?registry.available_methods(),
            max_upload_bytes = config.max_upload_bytes,
            "Extraction engine initialized"
        );

        Self {
            registry,
            readiness,
            config,
        }
    }

    pub fn readiness(&self) -> &ExtractorReadiness {
        &self.readiness
    }

    pub fn registry(&self) -> &ExtractionRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Reject empty, oversized and executable uploads before extraction.
    pub fn validate(&self, filename: &str, data: &[u8]) -> Result<()> {
        validate_upload(filename, data, self.config.max_upload_bytes)
    }

    /// Extract text from `data`.
    ///
    /// Returns `Err` when the upload is rejected before any extractor runs
    /// (empty, too large, unsupported type). Otherwise returns an outcome
    /// whose `success` flag reports whether any method produced text.
    #[instrument(skip(self, data), fields(subsystem = "jobs", component = "extraction", op = "extract", size_bytes = data.len()))]
    pub async fn extract(
        &self,
        data: &[u8],
        declared_mime: Option<&str>,
        filename: &str,
    ) -> Result<ExtractionOutcome> {
        self.validate(filename, data)?;
        let format = resolve_format(filename, declared_mime, data)?;
        let mime_type = format.mime_type();
        let primary = format.primary_method();

        let start = Instant::now();
        let mut attempts: Vec<ExtractionAttempt> = Vec::new();
        let plan = std::iter::once(primary).chain(
            ExtractionMethod::FALLBACK_CHAIN
                .into_iter()
                .filter(move |m| *m != primary),
        );

        for method in plan {
            let Some(extractor) = self.registry.get(method) else {
                debug!(method = %method, "Skipping unregistered extractor");
                continue;
            };

            match self.attempt(extractor.as_ref(), data, filename, mime_type).await {
                Ok(text) => {
                    attempts.push(ExtractionAttempt {
                        method,
                        succeeded: true,
                        error: None,
                    });
                    if method == primary {
                        debug!(method = %method, chars = text.len(), duration_ms = start.elapsed().as_millis() as u64, "Primary extraction succeeded");
                    } else {
                        warn!(
                            primary = %primary,
                            method = %method,
                            attempts = attempts.len(),
                            "Primary extraction failed, fallback applied"
                        );
                    }
                    return Ok(ExtractionOutcome {
                        text,
                        success: true,
                        method_used: Some(method),
                        error: None,
                        attempts,
                    });
                }
                Err(e) => {
                    debug!(method = %method, error = %e, "Extraction attempt failed");
                    attempts.push(ExtractionAttempt {
                        method,
                        succeeded: false,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let aggregated = attempts
            .iter()
            .map(|a| format!("{}: {}", a.method, a.error.as_deref().unwrap_or("failed")))
            .collect::<Vec<_>>()
            .join("; ");
        warn!(
            filename,
            attempts = attempts.len(),
            error = %aggregated,
            "All extraction methods exhausted"
        );

        Ok(ExtractionOutcome {
            text: String::new(),
            success: false,
            method_used: None,
            error: Some(if aggregated.is_empty() {
                "no extractor available".to_string()
            } else {
                aggregated
            }),
            attempts,
        })
    }

    async fn attempt(
        &self,
        extractor: &dyn TextExtractor,
        data: &[u8],
        filename: &str,
        mime_type: &str,
    ) -> Result<String> {
        let text = tokio::time::timeout(
            self.config.attempt_timeout,
            extractor.extract(data, filename, mime_type),
        )
        .await
        .map_err(|_| {
            Error::Extraction(format!(
                "timed out after {}s",
                self.config.attempt_timeout.as_secs()
            ))
        })??;

        if text.trim().is_empty() {
            return Err(Error::Extraction("only whitespace extracted".to_string()));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedExtractor {
        method: ExtractionMethod,
        output: Option<&'static str>,
        healthy: bool,
    }

    #[async_trait]
    impl TextExtractor for FixedExtractor {
        fn method(&self) -> ExtractionMethod {
            self.method
        }

        async fn extract(&self, _data: &[u8], _f: &str, _m: &str) -> Result<String> {
            self.output
                .map(String::from)
                .ok_or_else(|| Error::Extraction(format!("{} forced failure", self.method)))
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(self.healthy)
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn fixed(
        method: ExtractionMethod,
        output: Option<&'static str>,
        healthy: bool,
    ) -> Arc<dyn TextExtractor> {
        Arc::new(FixedExtractor {
            method,
            output,
            healthy,
        })
    }

    fn config() -> ExtractionConfig {
        ExtractionConfig::default().with_pandoc(false)
    }

    #[test]
    fn test_registry_register_and_lookup() {
        let mut registry = ExtractionRegistry::new();
        assert!(registry.available_methods().is_empty());
        registry.register(Arc::new(Utf8TextExtractor));
        assert!(registry.has_extractor(ExtractionMethod::Utf8Text));
        assert!(!registry.has_extractor(ExtractionMethod::PdfText));
    }

    #[tokio::test]
    async fn test_unhealthy_extractors_are_not_registered() {
        let engine = ExtractionEngine::initialize_with(
            config(),
            vec![
                fixed(ExtractionMethod::Utf8Text, Some("x"), true),
                fixed(ExtractionMethod::ExternalTool, Some("x"), false),
            ],
        )
        .await;
        assert!(engine.readiness().is_ready(ExtractionMethod::Utf8Text));
        assert!(!engine.readiness().is_ready(ExtractionMethod::ExternalTool));
        assert!(!engine.registry().has_extractor(ExtractionMethod::ExternalTool));
    }

    #[tokio::test]
    async fn test_fallback_order_and_skips() {
        let engine = ExtractionEngine::initialize_with(
            config(),
            vec![
                fixed(ExtractionMethod::PdfText, None, true),
                fixed(ExtractionMethod::Utf8Text, None, true),
                fixed(ExtractionMethod::ExternalTool, None, false),
                fixed(ExtractionMethod::AlternateEncoding, None, true),
                fixed(ExtractionMethod::ByteScan, Some("recovered"), true),
            ],
        )
        .await;

        let outcome = engine
            .extract(b"%PDF-1.4 broken", Some("application/pdf"), "a.pdf")
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.method_used, Some(ExtractionMethod::ByteScan));
        assert_eq!(
            outcome.attempted_methods(),
            vec![
                ExtractionMethod::PdfText,
                ExtractionMethod::Utf8Text,
                ExtractionMethod::AlternateEncoding,
                ExtractionMethod::ByteScan,
            ]
        );
    }

    #[tokio::test]
    async fn test_primary_not_repeated_in_chain() {
        let engine = ExtractionEngine::initialize_with(
            config(),
            vec![
                fixed(ExtractionMethod::Utf8Text, None, true),
                fixed(ExtractionMethod::AlternateEncoding, Some("decoded"), true),
            ],
        )
        .await;
        let outcome = engine
            .extract(b"abc", Some("text/plain"), "a.txt")
            .await
            .unwrap();
        assert_eq!(
            outcome.attempted_methods(),
            vec![ExtractionMethod::Utf8Text, ExtractionMethod::AlternateEncoding]
        );
    }

    #[tokio::test]
    async fn test_whitespace_output_counts_as_failure() {
        let engine = ExtractionEngine::initialize_with(
            config(),
            vec![
                fixed(ExtractionMethod::Utf8Text, Some("  \n "), true),
                fixed(ExtractionMethod::ByteScan, Some("text"), true),
            ],
        )
        .await;
        let outcome = engine
            .extract(b"abc", Some("text/plain"), "a.txt")
            .await
            .unwrap();
        assert_eq!(outcome.method_used, Some(ExtractionMethod::ByteScan));
    }

    #[tokio::test]
    async fn test_all_failures_aggregate_errors() {
        let engine = ExtractionEngine::initialize_with(
            config(),
            vec![
                fixed(ExtractionMethod::Utf8Text, None, true),
                fixed(ExtractionMethod::ByteScan, None, true),
            ],
        )
        .await;
        let outcome = engine
            .extract(b"abc", Some("text/csv"), "a.csv")
            .await
            .unwrap();
        assert!(!outcome.success);
        assert!(outcome.text.is_empty());
        let error = outcome.error.unwrap();
        assert!(error.contains("utf8_text: "));
        assert!(error.contains("byte_scan: "));
    }

    #[tokio::test]
    async fn test_rejections_happen_before_extraction() {
        let engine = ExtractionEngine::initialize_with(
            config().with_max_upload_bytes(8),
            vec![fixed(ExtractionMethod::Utf8Text, Some("x"), true)],
        )
        .await;

        let err = engine.extract(b"", Some("text/plain"), "a.txt").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = engine
            .extract(b"123456789", Some("text/plain"), "a.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge(_)));

        let err = engine
            .extract(b"1234", Some("image/gif"), "a.gif")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedType(_)));
    }
}
