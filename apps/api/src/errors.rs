use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::agent::QaError;
use crate::auth::AuthError;
use crate::vector::VectorStoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Gateway timeout: {0}")]
    GatewayTimeout(String),

    #[error("Retries exhausted: {0}")]
    RetriesExhausted(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::UnprocessableEntity(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPROCESSABLE_ENTITY",
                msg.clone(),
            ),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Llm(msg) => {
                tracing::error!("LLM error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "LLM_ERROR",
                    "An AI processing error occurred".to_string(),
                )
            }
            AppError::VectorStore(msg) => {
                tracing::error!("Vector store error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "VECTOR_STORE_ERROR",
                    "A vector store error occurred".to_string(),
                )
            }
            AppError::GatewayTimeout(msg) => {
                (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT", msg.clone())
            }
            AppError::RetriesExhausted(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "RETRIES_EXHAUSTED",
                msg.clone(),
            ),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

impl From<QaError> for AppError {
    fn from(e: QaError) -> Self {
        match e {
            QaError::Validation(msg) => AppError::Validation(msg),
            QaError::Timeout(_) => {
                AppError::GatewayTimeout("The model timed out after multiple retries.".to_string())
            }
            QaError::Exhausted { last, .. } => {
                AppError::RetriesExhausted(format!("Failed after retries: {last}"))
            }
            // Non-retryable failures surface on the attempt that produced them.
            other => AppError::Llm(other.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials
            | AuthError::MissingToken
            | AuthError::TokenExpired
            | AuthError::InvalidToken => AppError::Unauthorized(e.to_string()),
            AuthError::UserNotFound => AppError::NotFound(e.to_string()),
            AuthError::UsernameTaken | AuthError::EmailTaken => AppError::Conflict(e.to_string()),
            AuthError::Database(e) => AppError::Database(e),
            AuthError::Hashing(_) | AuthError::Jwt(_) => AppError::Internal(anyhow::anyhow!(e)),
        }
    }
}

impl From<VectorStoreError> for AppError {
    fn from(e: VectorStoreError) -> Self {
        match e {
            VectorStoreError::Load(_) | VectorStoreError::EmptyDocument => {
                AppError::UnprocessableEntity(e.to_string())
            }
            VectorStoreError::InvalidQuery(msg) => AppError::Validation(msg),
            other => AppError::VectorStore(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::agent::tools::RetrievalError;

    #[test]
    fn test_timeout_maps_to_gateway_timeout() {
        let response = AppError::from(QaError::Timeout(Duration::from_secs(30))).into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_exhaustion_maps_to_500_with_last_error() {
        let err = AppError::from(QaError::Exhausted {
            attempts: 3,
            last: Box::new(QaError::Retrieval(RetrievalError::InvalidArguments(
                "'query' is required".to_string(),
            ))),
        });
        assert_eq!(
            err.to_string(),
            "Retries exhausted: Failed after retries: Retrieval failed: Invalid tool arguments: 'query' is required"
        );
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_non_retryable_failure_does_not_claim_retries() {
        let err = AppError::from(QaError::Model(crate::llm_client::LlmError::Api {
            status: 401,
            message: "invalid api key".to_string(),
        }));
        assert!(matches!(err, AppError::Llm(_)));
        assert!(!err.to_string().contains("retries"));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_blank_questions_map_to_400() {
        let response =
            AppError::from(QaError::Validation("Questions cannot be empty.".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_auth_errors_map_to_status_codes() {
        assert_eq!(
            AppError::from(AuthError::TokenExpired).into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::from(AuthError::UsernameTaken).into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(AuthError::UserNotFound).into_response().status(),
            StatusCode::NOT_FOUND
        );
    }
}
