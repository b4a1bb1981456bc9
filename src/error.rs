use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use sqlx::migrate::MigrateError;
use thiserror::Error as ThisError;
use tracing::error;

#[derive(Debug, ThisError)]
pub enum PaymentsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] SqlxError),

    #[error("Migration error: {0}")]
    MigrateError(#[from] MigrateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    /// A user with the same name, id or email is already stored.
    #[error("{0}")]
    UserExists(String),

    /// The ledger refused to apply or look up a transaction.
    #[error("{0}")]
    Payment(String),

    #[error("{0}")]
    NotFound(String),

    /// Request was well-formed but cannot be processed.
    #[error("{0}")]
    Unprocessable(String),

    #[error("Request validation failed: {0:?}")]
    Validation(Vec<FieldError>),
}

impl PaymentsError {
    pub fn payment(msg: impl Into<String>) -> Self {
        Self::Payment(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            PaymentsError::UserExists(_) | PaymentsError::Payment(_) => StatusCode::CONFLICT,
            PaymentsError::NotFound(_) => StatusCode::NOT_FOUND,
            PaymentsError::Unprocessable(_) | PaymentsError::Validation(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            PaymentsError::Config(_)
            | PaymentsError::DatabaseError(_)
            | PaymentsError::MigrateError(_)
            | PaymentsError::Io(_)
            | PaymentsError::PasswordHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PaymentsError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        match self {
            PaymentsError::Validation(errors) => {
                (status, Json(ApiErrorResponse { detail: errors })).into_response()
            }
            PaymentsError::UserExists(msg)
            | PaymentsError::Payment(msg)
            | PaymentsError::NotFound(msg)
            | PaymentsError::Unprocessable(msg) => {
                (status, Json(ApiErrorResponse { detail: msg })).into_response()
            }
            internal => {
                error!(error = %internal, "request failed");
                (
                    status,
                    Json(ApiErrorResponse {
                        detail: "Internal server error",
                    }),
                )
                    .into_response()
            }
        }
    }
}

/// Error body: `{"detail": ...}` where detail is a message or a list of [`FieldError`].
#[derive(Serialize)]
pub struct ApiErrorResponse<T: Serialize> {
    pub detail: T,
}

/// One rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub loc: Vec<String>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl FieldError {
    pub fn body(field: &str, kind: &str, msg: impl Into<String>) -> Self {
        Self {
            loc: vec!["body".to_string(), field.to_string()],
            msg: msg.into(),
            kind: kind.to_string(),
        }
    }

    pub fn query(field: &str, kind: &str, msg: impl Into<String>) -> Self {
        Self {
            loc: vec!["query".to_string(), field.to_string()],
            msg: msg.into(),
            kind: kind.to_string(),
        }
    }
}
