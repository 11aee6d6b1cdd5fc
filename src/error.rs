use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::export::ExportError;
use crate::jobs::QueueError;

/// JSON body for failed requests
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::BadRequest(msg) => {
                tracing::warn!("Bad request: {}", msg);
                (StatusCode::BAD_REQUEST, ErrorResponse::with_details("Bad request", msg.clone()))
            }
            ApiError::Queue(e) => {
                tracing::error!("Job queue unavailable: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, ErrorResponse::new(e.to_string()))
            }
            // Missing export backends answer with a payload, not a failed request
            ApiError::Export(e @ ExportError::Unavailable(_)) => {
                tracing::info!("{}", e);
                (StatusCode::OK, ErrorResponse::new(e.to_string()))
            }
            ApiError::Export(e) => {
                tracing::error!("Export failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::new(e.to_string()))
            }
        };

        (status, Json(body)).into_response()
    }
}
