use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::generation::GenerationError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Duplicate entry: {0}")]
    Duplicate(String),

    #[error("File upload error: {0}")]
    FileUpload(String),

    #[error("Invalid file type: {0}")]
    InvalidFileType(String),

    #[error("File too large: {0}")]
    FileTooLarge(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("S3 error: {0}")]
    S3(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::FileNotFound(msg) => (StatusCode::NOT_FOUND, "FILE_NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Duplicate(msg) => (StatusCode::BAD_REQUEST, "DUPLICATE_ENTRY", msg.clone()),
            AppError::FileUpload(msg) => (StatusCode::BAD_REQUEST, "FILE_UPLOAD_ERROR", msg.clone()),
            AppError::InvalidFileType(msg) => {
                (StatusCode::BAD_REQUEST, "INVALID_FILE_TYPE", msg.clone())
            }
            AppError::FileTooLarge(msg) => (StatusCode::BAD_REQUEST, "FILE_SIZE_EXCEEDED", msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Redis(e) => {
                tracing::error!("Redis error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CACHE_ERROR",
                    "A cache error occurred".to_string(),
                )
            }
            AppError::Generation(e) => generation_parts(e),
            AppError::S3(msg) => {
                tracing::error!("S3 error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "S3_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        }
    }
}

fn generation_parts(e: &GenerationError) -> (StatusCode, &'static str, String) {
    match e {
        GenerationError::InvalidRequest(msg) => {
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
        }
        GenerationError::StorageRead(err) => {
            tracing::error!("Generation storage error: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "A database error occurred".to_string(),
            )
        }
        GenerationError::InconsistentRecords(msg) => {
            tracing::error!("Inconsistent resume records: {msg}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INCONSISTENT_RECORDS",
                "Stored resume records are out of order; reorder them and retry".to_string(),
            )
        }
        GenerationError::ExternalService(err) => {
            tracing::error!("LLM error: {err}");
            (
                StatusCode::BAD_GATEWAY,
                "LLM_ERROR",
                "An AI processing error occurred".to_string(),
            )
        }
        GenerationError::MalformedOutput(_) => {
            tracing::error!("{e}");
            (
                StatusCode::BAD_GATEWAY,
                "MALFORMED_GENERATION_OUTPUT",
                "The AI response could not be parsed".to_string(),
            )
        }
        GenerationError::ReconciliationMismatch { .. } => {
            tracing::error!("{e}");
            (
                StatusCode::BAD_GATEWAY,
                "RECONCILIATION_MISMATCH",
                e.to_string(),
            )
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let body = Json(json!({
            "success": false,
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::LlmError;

    #[test]
    fn test_client_errors_keep_their_message() {
        let (status, code, message) = AppError::Duplicate("Skill 'Rust' already exists".into()).parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "DUPLICATE_ENTRY");
        assert_eq!(message, "Skill 'Rust' already exists");

        let (status, code, _) = AppError::FileNotFound("no resume".into()).parts();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "FILE_NOT_FOUND");
    }

    #[test]
    fn test_generation_errors_map_to_status() {
        let cases = [
            (
                AppError::from(GenerationError::InvalidRequest("bad".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::from(GenerationError::InconsistentRecords("dup".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AppError::from(GenerationError::ExternalService(LlmError::EmptyContent)),
                StatusCode::BAD_GATEWAY,
            ),
            (
                AppError::from(GenerationError::MalformedOutput("x".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                AppError::from(GenerationError::ReconciliationMismatch {
                    content_id: "9".into(),
                    reason: "no stored record has this content id",
                }),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_server_errors_hide_details() {
        let (_, _, message) = AppError::Internal(anyhow::anyhow!("secret path /etc")).parts();
        assert!(!message.contains("/etc"));
    }
}
