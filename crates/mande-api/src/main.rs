//! mande-api - HTTP API server for the mande knowledge pipeline

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mande_api::services::ContextConfig;
use mande_api::{router, AppState, Repositories, ServerConfig};
use mande_core::{GenerationBackend, TextEmbedder};
use mande_db::{Database, InMemoryStore, PoolConfig};
use mande_inference::{OllamaBackend, ResilientEmbedder};
use mande_jobs::{DocumentConfig, ExpirySweeper, ExtractionConfig, ExtractionEngine, SweepConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "mande_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mande_api=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    // Optionally create a file appender with daily rotation
    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("mande-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false)); // no ANSI in files by default
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let config = ServerConfig::from_env();

    // Inference backend and embedder
    let backend = Arc::new(OllamaBackend::from_env()?);
    let dimension = backend.config().dimension;
    let embed_timeout = backend.config().embed_timeout;
    let embedder: Arc<dyn TextEmbedder> =
        Arc::new(ResilientEmbedder::new(backend.clone(), embed_timeout));
    let generator: Arc<dyn GenerationBackend> = backend;

    // Storage
    let repos = match config.database_url.as_deref() {
        Some(url) => {
            info!("Connecting to database...");
            let pool = mande_db::create_pool(url, PoolConfig::from_env()).await?;
            let db = Database::with_dimension(pool, dimension);
            info!("Running database migrations...");
            db.migrate().await?;
            info!("Database ready");
            Repositories::postgres(&db)
        }
        None => {
            warn!("DATABASE_URL not set, using the in-memory store; data is lost on restart");
            Repositories::in_memory(&InMemoryStore::with_dimension(dimension))
        }
    };

    // Extraction engine (probes optional extractors once)
    let extraction = Arc::new(
        ExtractionEngine::initialize(
            ExtractionConfig::from_env().with_max_upload_bytes(config.max_upload_bytes),
        )
        .await,
    );
    let ready: Vec<String> = extraction
        .registry()
        .available_methods()
        .iter()
        .map(|m| m.to_string())
        .collect();
    info!(extractors = %ready.join(","), "Extraction engine initialized");

    let embeddings = repos.embedding_tasks(embedder);

    // Expiry sweeper with embedding backfill
    let sweeper = ExpirySweeper::new(repos.documents.clone(), SweepConfig::from_env())
        .with_backfill(embeddings.clone())
        .start();

    let state = AppState::new(
        repos,
        extraction,
        embeddings,
        generator,
        ContextConfig::from_env(),
        DocumentConfig::from_env(),
    );
    let app = router(state, &config);

    // Start server
    let addr: SocketAddr = config.bind_address().parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped, shutting down sweeper");
    if let Err(e) = sweeper.shutdown().await {
        warn!(error = %e, "Sweeper did not shut down cleanly");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
