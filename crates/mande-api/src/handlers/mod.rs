//! HTTP handlers.
//!
//! Owner identity arrives in the `X-Owner-Id` header, set by the
//! authentication layer in front of this service.

pub mod chat;
pub mod documents;
pub mod health;
pub mod knowledge;

use axum::{
    async_trait,
    extract::{FromRequestParts, Multipart},
    http::request::Parts,
};
use uuid::Uuid;

use mande_core::Error;

use crate::error::ApiError;

/// Header carrying the authenticated owner id.
pub const OWNER_HEADER: &str = "x-owner-id";

/// The authenticated owner of the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner(pub Uuid);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Owner {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(OWNER_HEADER)
            .ok_or_else(|| Error::Forbidden("missing owner identity".to_string()))?;
        let id = value
            .to_str()
            .ok()
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .ok_or_else(|| Error::InvalidInput("malformed owner identity".to_string()))?;
        Ok(Owner(id))
    }
}

/// A file part from a multipart upload.
#[derive(Debug)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// Parsed multipart upload form.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<UploadedFile>,
    pub title: Option<String>,
    /// Plain text entered instead of a file.
    pub content: Option<String>,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = UploadForm::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => {
                    let filename = field.file_name().unwrap_or("upload").to_string();
                    // Browsers send octet-stream when they cannot tell.
                    let content_type = field
                        .content_type()
                        .filter(|ct| *ct != "application/octet-stream")
                        .map(str::to_string);
                    let data = field.bytes().await?.to_vec();
                    form.file = Some(UploadedFile {
                        filename,
                        content_type,
                        data,
                    });
                }
                "title" => form.title = Some(field.text().await?).filter(|t| !t.trim().is_empty()),
                "content" => form.content = Some(field.text().await?),
                _ => {}
            }
        }
        Ok(form)
    }
}
