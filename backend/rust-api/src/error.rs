use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Error taxonomy for the pool/assembly/attempt core. Every variant is
/// surfaced to the caller; nothing is retried internally.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{0}")]
    Validation(String),
    #[error("no eligible questions match the requested filters")]
    NoEligibleQuestions,
    #[error("attempt is finalized and can no longer be modified")]
    AttemptFinalized,
    #[error("{0} not found")]
    NotFound(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        CoreError::NotFound(what.into())
    }

    fn code(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "validation_error",
            CoreError::NoEligibleQuestions => "no_eligible_questions",
            CoreError::AttemptFinalized => "attempt_finalized",
            CoreError::NotFound(_) => "not_found",
            CoreError::Storage(_) => "storage_error",
        }
    }
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = match &self {
            CoreError::Validation(_) => StatusCode::BAD_REQUEST,
            CoreError::NoEligibleQuestions => StatusCode::UNPROCESSABLE_ENTITY,
            CoreError::AttemptFinalized => StatusCode::CONFLICT,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("request failed: {:#}", self);
        }

        let body = json!({
            "code": self.code(),
            "message": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}
