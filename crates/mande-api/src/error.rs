//! HTTP error mapping.

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, error, warn};

use mande_core::Error;

/// Client closed the request before the response was ready.
const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Error returned by handlers, rendered as `{ "error": message }`.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError(Error::PayloadTooLarge(err.body_text()))
        } else {
            ApiError(Error::InvalidInput(format!(
                "Malformed multipart body: {}",
                err.body_text()
            )))
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Error::UnsupportedType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Error::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::Embedding(_) | Error::Inference(_) => StatusCode::BAD_GATEWAY,
            Error::Cancelled(_) => StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
                .unwrap_or(StatusCode::REQUEST_TIMEOUT),
            Error::Database(_)
            | Error::Config(_)
            | Error::Internal(_)
            | Error::Io(_)
            | Error::Serialization(_)
            | Error::Request(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match &self.0 {
            Error::Transient(_) => {
                "The assistant is temporarily unavailable, please try again shortly".to_string()
            }
            // Infrastructure details stay in the logs.
            Error::Database(_) | Error::Config(_) | Error::Internal(_) | Error::Io(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.0.kind();
        match &self.0 {
            Error::Cancelled(_) => debug!(kind, "Request cancelled by client"),
            _ if status.is_server_error() => error!(kind, error = %self.0, "Request failed"),
            _ => warn!(kind, status = status.as_u16(), error = %self.0, "Request rejected"),
        }

        let body = Json(serde_json::json!({
            "error": self.message(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(err: Error) -> u16 {
        ApiError(err).status().as_u16()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status(Error::InvalidInput("x".into())), 400);
        assert_eq!(status(Error::PayloadTooLarge("x".into())), 413);
        assert_eq!(status(Error::UnsupportedType("x".into())), 415);
        assert_eq!(status(Error::Extraction("x".into())), 422);
        assert_eq!(status(Error::Transient("x".into())), 503);
        assert_eq!(status(Error::NotFound("x".into())), 404);
        assert_eq!(status(Error::Forbidden("x".into())), 403);
        assert_eq!(status(Error::Embedding("x".into())), 502);
        assert_eq!(status(Error::Inference("x".into())), 502);
        assert_eq!(status(Error::Cancelled("x".into())), 499);
        assert_eq!(status(Error::Internal("x".into())), 500);
    }

    #[test]
    fn test_transient_message_is_degraded_notice() {
        let err = ApiError(Error::Transient("connection refused".into()));
        assert!(err.message().contains("temporarily unavailable"));
        assert!(!err.message().contains("refused"));
    }
}
