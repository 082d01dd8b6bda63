use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::auth::repo::StoreError;

/// Failures of the auth service as seen by clients.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Validation failed")]
    Validation(Vec<String>),

    #[error("Email already registered")]
    DuplicateEmail,

    /// Unknown email and wrong password share this variant and message.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Not authorized")]
    Unauthenticated,

    #[error("User not found")]
    UserNotFound,

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::DuplicateEmail => StatusCode::CONFLICT,
            AuthError::InvalidCredentials | AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => AuthError::DuplicateEmail,
            StoreError::Database(e) => AuthError::Internal(anyhow::Error::new(e).context("user store")),
            StoreError::Unavailable(msg) => AuthError::Internal(anyhow::anyhow!(msg)),
        }
    }
}

/// Unreadable or mistyped JSON bodies are reported like any other bad input.
impl From<JsonRejection> for AuthError {
    fn from(rejection: JsonRejection) -> Self {
        AuthError::Validation(vec![rejection.body_text()])
    }
}

/// Error body returned to clients.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let details = match &self {
            AuthError::Validation(details) => details.clone(),
            AuthError::Internal(e) => {
                error!(error = ?e, "internal error");
                Vec::new()
            }
            _ => Vec::new(),
        };
        let body = ErrorResponse {
            error: self.to_string(),
            details,
        };
        (status, Json(body)).into_response()
    }
}
