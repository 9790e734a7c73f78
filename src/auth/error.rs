//! Error taxonomy shared by every engine operation.

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing or malformed input the caller can correct.
    #[error("{0}")]
    InvalidArgument(String),
    /// Unknown identity or code.
    #[error("Not found")]
    NotFound,
    /// Wrong secret, bad token, failed signature, or active lockout.
    #[error("{0}")]
    Unauthorized(String),
    /// Duplicate phone number or already-set credential.
    #[error("{0}")]
    Conflict(String),
    /// One-time code past its time-to-live.
    #[error("Code expired")]
    Expired,
    /// Operation attempted before its prerequisite state exists.
    #[error("{0}")]
    PreconditionFailed(String),
    /// Store or dispatch failure; details are logged, not returned.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) | Self::Expired => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::PreconditionFailed(message.into())
    }
}
