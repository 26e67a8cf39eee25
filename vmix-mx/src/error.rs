//! Error types for vmix-mx
//!
//! `MixError` is the structured failure of one mix request. `ApiError` maps it
//! onto HTTP responses with a `{error, kind}` JSON body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failure of a single mix request
#[derive(Debug, Error)]
pub enum MixError {
    /// Missing/malformed field or out-of-range value; nothing has been fetched yet
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Transport error or non-success status while retrieving a source
    #[error("Failed to fetch {url}: {cause}")]
    FetchFailed { url: String, cause: String },

    /// Transcoding engine exited non-zero or produced no output
    #[error("Transcoding failed: {0}")]
    TranscodeFailed(String),

    /// Local I/O on the scratch directory
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Broken internal invariant
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MixError {
    /// Stable machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            MixError::InvalidRequest(_) => "INVALID_REQUEST",
            MixError::FetchFailed { .. } => "FETCH_FAILED",
            MixError::TranscodeFailed(_) => "TRANSCODE_FAILED",
            MixError::Io(_) => "IO_ERROR",
            MixError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            MixError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            MixError::FetchFailed { .. } => StatusCode::BAD_GATEWAY,
            MixError::TranscodeFailed(_) | MixError::Io(_) | MixError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Mix pipeline failure
    #[error(transparent)]
    Mix(#[from] MixError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError::Mix(err) = self;
        let status = err.status_code();

        let body = Json(json!({
            "error": err.to_string(),
            "kind": err.kind(),
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            MixError::InvalidRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            MixError::FetchFailed {
                url: "http://a/b".into(),
                cause: "404".into()
            }
            .status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            MixError::TranscodeFailed("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_fetch_failed_message_names_url() {
        let err = MixError::FetchFailed {
            url: "http://example.com/v.webm".into(),
            cause: "HTTP 404 Not Found".into(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to fetch http://example.com/v.webm: HTTP 404 Not Found"
        );
        assert_eq!(err.kind(), "FETCH_FAILED");
    }
}
