use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("batch has no member orders")]
    EmptyBatch,

    #[error("driver {0} is not active and available")]
    DriverUnavailable(Uuid),

    #[error("handoff incomplete: {0}")]
    IncompleteHandoff(String),

    #[error("verification code invalid")]
    CodeInvalid,

    #[error("verification code already used")]
    CodeAlreadyUsed,

    #[error("verification code expired")]
    CodeExpired,

    #[error("internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    pub fn invalid_transition(from: impl std::fmt::Debug, to: impl std::fmt::Debug) -> Self {
        DispatchError::InvalidTransition {
            from: format!("{from:?}"),
            to: format!("{to:?}"),
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = match &self {
            DispatchError::NotFound(_) => StatusCode::NOT_FOUND,
            DispatchError::BadRequest(_) | DispatchError::EmptyBatch => StatusCode::BAD_REQUEST,
            DispatchError::InvalidTransition { .. }
            | DispatchError::DriverUnavailable(_)
            | DispatchError::IncompleteHandoff(_)
            | DispatchError::CodeAlreadyUsed => StatusCode::CONFLICT,
            DispatchError::CodeInvalid => StatusCode::UNPROCESSABLE_ENTITY,
            DispatchError::CodeExpired => StatusCode::GONE,
            DispatchError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}
