//! # mande-api
//!
//! HTTP surface and service layer for the mande knowledge pipeline.
//!
//! This crate provides:
//! - Knowledge, document and chat services over the storage, search,
//!   extraction and inference crates
//! - The context assembler that builds generation prompts
//! - An axum router with request ids, tracing, CORS and a body limit
//!
//! The `mande-api` binary wires these to PostgreSQL (or the in-memory store)
//! and Ollama.

pub mod config;
pub mod error;
pub mod handlers;
pub mod services;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

pub use config::ServerConfig;
pub use error::ApiError;
pub use state::{AppState, Repositories};

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Build the application router.
pub fn router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/api/v1/knowledge",
            get(handlers::knowledge::list_knowledge).post(handlers::knowledge::upload_knowledge),
        )
        .route(
            "/api/v1/knowledge/search",
            get(handlers::knowledge::search_knowledge),
        )
        .route(
            "/api/v1/knowledge/stats",
            get(handlers::knowledge::knowledge_stats),
        )
        .route(
            "/api/v1/knowledge/:id",
            delete(handlers::knowledge::delete_knowledge),
        )
        .route(
            "/api/v1/documents",
            post(handlers::documents::upload_document),
        )
        .route(
            "/api/v1/documents/:id",
            get(handlers::documents::get_document),
        )
        .route(
            "/api/v1/documents/:id/similar",
            get(handlers::documents::similar_documents),
        )
        .route("/api/v1/chat", post(handlers::chat::chat))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(cors_layer(&config.allowed_origins))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.body_limit()))
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(handlers::OWNER_HEADER),
        ])
        .max_age(std::time::Duration::from_secs(3600));

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}
