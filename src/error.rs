use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Request-scoped failures. Caught at the handler boundary and surfaced as a
/// structured JSON error; a bad request never takes the process down.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("model not loaded; run training and then /reload-model, or ensure a model file exists")]
    ModelUnavailable,
    #[error("prediction failed: {0}")]
    PredictionFailed(String),
    #[error("dataset unavailable: {0}")]
    DataUnavailable(String),
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        tracing::error!("{}", self);
        let body = Json(json!({ "error": self.to_string() }));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

/// Training-run failures. Each one is fatal to the run; no partial artifact
/// is ever committed to the final path.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("dataset not found: {0}")]
    DataNotFound(PathBuf),
    #[error("dataset unreadable: {0}")]
    DataUnreadable(String),
    #[error("CSV columns mismatch; expected {expected:?}, found {found:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("training failed: {0}")]
    TrainingFailed(String),
    #[error("model save failed: {0}")]
    SaveFailed(String),
}
