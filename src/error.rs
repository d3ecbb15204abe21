use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::models::Role;

/// ApiError
///
/// The error taxonomy every handler returns. Each variant maps to exactly one
/// HTTP status; the JSON body carries the variant name and a client-facing
/// message that the front end shows verbatim in its notification toast.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing, blank or malformed input (including unknown JSON fields).
    #[error("{0}")]
    Validation(String),
    #[error("Email already registered")]
    DuplicateEmail,
    #[error("Email is not registered")]
    UnknownEmail,
    #[error("Invalid password")]
    InvalidCredentials,
    /// The login form asked for a role the account does not hold.
    #[error("This account is not a {0}")]
    RoleMismatch(Role),
    #[error("Authentication required")]
    Unauthenticated,
    #[error("You do not have permission to perform this action")]
    Forbidden,
    /// Resource label, e.g. "File". Also covers "exists but not yours".
    #[error("{0} not found")]
    NotFound(&'static str),
    /// Metadata survives but the stored bytes are missing.
    #[error("{0} content is no longer available")]
    Gone(&'static str),
    /// Catch-all. The detail is logged, never sent to the client.
    #[error("Server error")]
    Server(String),
}

/// ErrorBody
///
/// Wire shape of every error response.
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::DuplicateEmail
            | ApiError::UnknownEmail
            | ApiError::InvalidCredentials => StatusCode::BAD_REQUEST,
            ApiError::RoleMismatch(_) | ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Gone(_) => StatusCode::GONE,
            ApiError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable name of the variant.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "ValidationError",
            ApiError::DuplicateEmail => "DuplicateEmail",
            ApiError::UnknownEmail => "UnknownEmail",
            ApiError::InvalidCredentials => "InvalidCredentials",
            ApiError::RoleMismatch(_) => "RoleMismatch",
            ApiError::Unauthenticated => "Unauthenticated",
            ApiError::Forbidden => "Forbidden",
            ApiError::NotFound(_) => "NotFound",
            ApiError::Gone(_) => "Gone",
            ApiError::Server(_) => "ServerError",
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Server(detail) = &self {
            tracing::error!(detail = %detail, "request failed with server error");
        }

        let body = ErrorBody {
            error: self.code(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// RepositoryError
///
/// Failures surfaced by any `Repository` / `Collection` implementation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RepositoryError {
    /// The unique index on account email rejected the write.
    #[error("email already in use")]
    DuplicateEmail,
    /// An owner reference points at an account that no longer exists.
    #[error("owner account does not exist")]
    MissingOwner,
    #[error("repository backend failure: {0}")]
    Backend(String),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            match db.code().as_deref() {
                // unique_violation
                Some("23505") if db.constraint().is_some_and(|c| c.contains("email")) => {
                    return RepositoryError::DuplicateEmail;
                }
                // foreign_key_violation
                Some("23503") => return RepositoryError::MissingOwner,
                _ => {}
            }
        }
        RepositoryError::Backend(err.to_string())
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::DuplicateEmail => ApiError::DuplicateEmail,
            // The token outlived its account; there is no principal any more.
            RepositoryError::MissingOwner => ApiError::Unauthenticated,
            RepositoryError::Backend(detail) => ApiError::Server(detail),
        }
    }
}

/// StorageError
///
/// Failures from the content store holding uploaded bytes.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("object {0} does not exist")]
    NotFound(String),
    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => ApiError::Gone("File"),
            StorageError::Backend(detail) => ApiError::Server(detail),
        }
    }
}
