//! Error taxonomy for prediction requests and artifact loading

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PredictError {
    #[error("Failed to load artifact {path}: {reason}")]
    ArtifactLoad { path: PathBuf, reason: String },

    #[error("Failed to load reference dataset {path}: {reason}")]
    DatasetLoad { path: PathBuf, reason: String },

    #[error("Feature vector has {actual} values, model expects {expected}")]
    SchemaMismatch { expected: usize, actual: usize },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Model invocation failed: {0}")]
    Invocation(String),

    #[error("Unknown deployment: {0}")]
    UnknownDeployment(String),

    #[error("Chart rendering failed: {0}")]
    Render(String),
}

impl PredictError {
    pub fn artifact(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PredictError::ArtifactLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid(field: &str, reason: impl ToString) -> Self {
        PredictError::InvalidInput {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Short label used for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::ArtifactLoad { .. } => "artifact_load",
            PredictError::DatasetLoad { .. } => "dataset_load",
            PredictError::SchemaMismatch { .. } => "schema_mismatch",
            PredictError::InvalidInput { .. } => "invalid_input",
            PredictError::Invocation(_) => "invocation",
            PredictError::UnknownDeployment(_) => "unknown_deployment",
            PredictError::Render(_) => "render",
        }
    }

    /// Status code and the message that is safe to show a client
    fn public_parts(&self) -> (StatusCode, String) {
        match self {
            PredictError::InvalidInput { .. } => (StatusCode::BAD_REQUEST, self.to_string()),
            PredictError::UnknownDeployment(_) => (StatusCode::NOT_FOUND, self.to_string()),
            PredictError::Invocation(detail) => {
                tracing::error!(detail = %detail, "Model invocation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Prediction failed".to_string(),
                )
            }
            other => {
                tracing::error!(kind = other.kind(), detail = %other, "Internal prediction error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        let (status, message) = self.public_parts();

        let body = Json(json!({
            "error": true,
            "message": message,
        }));

        (status, body).into_response()
    }
}

/// Same error rendered as an HTML page for the form routes
pub struct PageError(pub PredictError);

impl From<PredictError> for PageError {
    fn from(err: PredictError) -> Self {
        PageError(err)
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let (status, message) = self.0.public_parts();
        let html = crate::server::pages::error_page(status, &message);
        (status, Html(html)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, PredictError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let (status, msg) = PredictError::invalid("Tenure", "not a number").public_parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(msg.contains("Tenure"));

        let (status, _) = PredictError::UnknownDeployment("nope".into()).public_parts();
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, msg) = PredictError::Invocation("shape [1,3]".into()).public_parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(msg, "Prediction failed");

        let (status, msg) = PredictError::SchemaMismatch {
            expected: 9,
            actual: 8,
        }
        .public_parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!msg.contains('9'));
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(PredictError::artifact("m.json", "missing").kind(), "artifact_load");
        assert_eq!(
            PredictError::SchemaMismatch {
                expected: 1,
                actual: 2
            }
            .kind(),
            "schema_mismatch"
        );
    }
}
