//! Server configuration.

use mande_core::defaults::{MAX_UPLOAD_SIZE_BYTES, SERVER_PORT};

/// Extra body allowance for multipart framing around the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// PostgreSQL URL. `None` selects the in-memory store.
    pub database_url: Option<String>,
    /// Origins allowed by CORS. Empty allows any origin.
    pub allowed_origins: Vec<String>,
    /// Upload ceiling enforced by the extraction engine.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: SERVER_PORT,
            database_url: None,
            allowed_origins: Vec::new(),
            max_upload_bytes: MAX_UPLOAD_SIZE_BYTES,
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `HOST` | `0.0.0.0` | Bind address |
    /// | `PORT` | `3000` | Bind port |
    /// | `DATABASE_URL` | unset | PostgreSQL URL; unset uses the in-memory store |
    /// | `ALLOWED_ORIGINS` | unset | Comma-separated CORS origins |
    /// | `MANDE_MAX_UPLOAD_BYTES` | `52428800` | Upload size ceiling |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            allowed_origins: std::env::var("ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            max_upload_bytes: std::env::var("MANDE_MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.max_upload_bytes),
        }
    }

    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = origins;
        self
    }

    /// Request body ceiling: the upload ceiling plus multipart framing.
    pub fn body_limit(&self) -> usize {
        self.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
