use axum::{extract::State, Json};
use serde::Serialize;

use mande_jobs::ExtractorReadiness;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub extractors: ExtractorReadiness,
}

/// Liveness plus the extractor readiness report from startup.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        extractors: state.extraction.readiness().clone(),
    })
}
