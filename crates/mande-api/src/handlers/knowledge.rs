//! Knowledge base endpoints.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mande_core::defaults::SEARCH_LIMIT;
use mande_core::{Error, KnowledgeItem, KnowledgeStats};
use mande_search::ScoredItem;

use crate::error::ApiError;
use crate::handlers::{Owner, UploadForm};
use crate::state::AppState;

/// Upper bound on `limit` accepted by the search endpoint.
const MAX_SEARCH_LIMIT: usize = 100;

/// Upload a file (field `file`) or plain text (field `content`).
///
/// # Returns
/// - 201 Created with the stored item
/// - 400 when the form has neither field or the text is empty
/// - 413 / 415 / 422 for oversized, unsupported or unreadable files
pub async fn upload_knowledge(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
    multipart: Multipart,
) -> Result<(StatusCode, Json<KnowledgeItem>), ApiError> {
    let form = UploadForm::read(multipart).await?;
    let item = match (form.file, form.content) {
        (Some(file), _) => {
            state
                .knowledge
                .upload_knowledge_file(
                    &file.data,
                    file.content_type.as_deref(),
                    &file.filename,
                    owner_id,
                    form.title,
                )
                .await?
        }
        (None, Some(content)) => state.knowledge.add_text(owner_id, form.title, &content).await?,
        (None, None) => {
            return Err(Error::InvalidInput(
                "Expected a 'file' or 'content' form field".to_string(),
            )
            .into())
        }
    };
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn list_knowledge(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
) -> Result<Json<Vec<KnowledgeItem>>, ApiError> {
    Ok(Json(state.knowledge.list(owner_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<ScoredItem>,
    pub total: usize,
}

pub async fn search_knowledge(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    let limit = query.limit.unwrap_or(SEARCH_LIMIT).min(MAX_SEARCH_LIMIT);
    let results = state
        .knowledge
        .search_knowledge(&query.q, owner_id, limit)
        .await?;
    Ok(Json(SearchResponse {
        total: results.len(),
        query: query.q,
        results,
    }))
}

pub async fn knowledge_stats(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
) -> Result<Json<KnowledgeStats>, ApiError> {
    Ok(Json(state.knowledge.get_knowledge_stats(owner_id).await?))
}

/// # Returns
/// - 204 No Content when deleted
/// - 404 Not Found when missing or owned by someone else
pub async fn delete_knowledge(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.knowledge.delete_knowledge_item(id, owner_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
