//! Error types for analysis and the HTTP API

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Errors raised while analyzing a set of views.
///
/// An unavailable model is not an error: the engine runs mock inference instead.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// A view payload could not be decoded into a raster
    #[error("Failed to decode image {index}: {reason}")]
    Decode { index: usize, reason: String },

    /// Raster with unsupported dimensionality or channel count
    #[error("Invalid image shape: {0}")]
    InvalidShape(String),

    /// No views submitted
    #[error("At least one view is required for analysis")]
    EmptyViews,

    /// The loaded model failed while running
    #[error("Inference failed: {0}")]
    Inference(String),
}

impl AnalysisError {
    /// Whether the failure was caused by the submitted input
    pub fn is_client_error(&self) -> bool {
        !matches!(self, AnalysisError::Inference(_))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// API errors
#[derive(Error, Debug)]
pub enum ApiError {
    /// Unknown piece
    #[error("Piece not found: {0}")]
    NotFound(String),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Analysis failed
    #[error("Analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(format!("{:#}", err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            ApiError::Analysis(e) if e.is_client_error() => {
                (StatusCode::BAD_REQUEST, "analysis_failed")
            }
            ApiError::Analysis(_) => (StatusCode::INTERNAL_SERVER_ERROR, "analysis_failed"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = Json(json!({
            "error": error,
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let resp = ApiError::NotFound("P1".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = ApiError::from(AnalysisError::EmptyViews).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = ApiError::from(AnalysisError::Inference("boom".into())).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_decode_message_names_view() {
        let err = AnalysisError::Decode {
            index: 2,
            reason: "invalid base64".into(),
        };
        assert_eq!(err.to_string(), "Failed to decode image 2: invalid base64");
    }
}
