use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::engine::EngineError;

/// JSON body of every failed request.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Handler failure. Only `Internal` carries a `details` field, holding the
/// full error chain.
pub enum AppError {
    /// Rejected operator input: bad drafts, imports, editor indices, or a
    /// run finished without an outcome.
    BadRequest(String),
    /// Unknown scenario or step.
    NotFound(String),
    /// Store failures such as I/O errors or corrupt documents.
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            AppError::Internal(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                Some(format!("{:#}", err)),
            ),
        };

        (status, Json(ErrorResponse { error, details })).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::ScenarioNotFound(_) => AppError::NotFound(err.to_string()),
            EngineError::InvalidScenario(_)
            | EngineError::MissingClassification
            | EngineError::Validation(_)
            | EngineError::Import(_) => AppError::BadRequest(err.to_string()),
            EngineError::Storage(e) => AppError::Internal(e),
        }
    }
}
