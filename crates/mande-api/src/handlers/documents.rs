//! Chat document endpoints.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use mande_core::{Document, Error};
use mande_search::ScoredDocument;

use crate::error::ApiError;
use crate::handlers::{Owner, UploadForm};
use crate::state::AppState;

const DEFAULT_SIMILAR_LIMIT: usize = 5;
const MAX_SIMILAR_LIMIT: usize = 50;

/// Accept a document for background extraction.
///
/// Returns 202 with the document in the `processing` state; poll
/// `GET /api/v1/documents/:id` for the result.
pub async fn upload_document(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Document>), ApiError> {
    let form = UploadForm::read(multipart).await?;
    let file = form
        .file
        .ok_or_else(|| Error::InvalidInput("Expected a 'file' form field".to_string()))?;
    let document = state
        .documents
        .upload(
            owner_id,
            &file.filename,
            file.content_type.as_deref(),
            file.data,
        )
        .await?;
    Ok((StatusCode::ACCEPTED, Json(document)))
}

pub async fn get_document(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
    Path(id): Path<Uuid>,
) -> Result<Json<Document>, ApiError> {
    Ok(Json(state.documents.fetch(id, owner_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct SimilarQuery {
    pub limit: Option<usize>,
}

pub async fn similar_documents(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
    Path(id): Path<Uuid>,
    Query(query): Query<SimilarQuery>,
) -> Result<Json<Vec<ScoredDocument>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_SIMILAR_LIMIT)
        .min(MAX_SIMILAR_LIMIT);
    Ok(Json(state.documents.similar(id, owner_id, limit).await?))
}
