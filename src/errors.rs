use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Failure taxonomy shared by the orchestrator and its three collaborators.
///
/// Every variant carries a human-readable message; callers add tenant/bucket
/// context with [`ProvisionError::context`] without changing the kind.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Lookup miss on the natural key or a stored identifier.
    #[error("not found: {0}")]
    NotFound(String),
    /// The identity service reported a conflicting credential.
    #[error("already exists: {0}")]
    AlreadyExists(String),
    /// The request context is missing the tenant id or internal bucket path.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
    /// Transport or server failure in a collaborator.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProvisionError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Prefix the message with caller context, keeping the kind intact.
    pub fn context(self, msg: impl fmt::Display) -> Self {
        match self {
            Self::NotFound(m) => Self::NotFound(format!("{msg}: {m}")),
            Self::AlreadyExists(m) => Self::AlreadyExists(format!("{msg}: {m}")),
            Self::PreconditionFailed(m) => Self::PreconditionFailed(format!("{msg}: {m}")),
            Self::Internal(m) => Self::Internal(format!("{msg}: {m}")),
        }
    }
}

impl From<sqlx::Error> for ProvisionError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(format!("database error: {err}"))
    }
}

impl From<reqwest::Error> for ProvisionError {
    fn from(err: reqwest::Error) -> Self {
        Self::Internal(format!("transport error: {err}"))
    }
}

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<ProvisionError> for AppError {
    fn from(err: ProvisionError) -> Self {
        let status = match err {
            ProvisionError::NotFound(_) => StatusCode::NOT_FOUND,
            ProvisionError::AlreadyExists(_) => StatusCode::CONFLICT,
            ProvisionError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            ProvisionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError::new(status, err.to_string())
    }
}
