/// Unified error types for driftmail.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the token/account lifecycle and its adapters.
#[derive(Error, Debug)]
pub enum Error {
    /// Underlying store errors (failed statements, failed commits)
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Referenced token absent
    #[error("token does not exist: {0}")]
    TokenNotFound(String),

    /// No token prefix matches the given address
    #[error("could not determine token for address: {0}")]
    NoMatchingToken(String),

    /// Redemption with an unknown token secret; deliberately context-free
    #[error("invalid or unknown token")]
    InvalidToken,

    /// Referenced account absent
    #[error("account does not exist: {0}")]
    AccountNotFound(String),

    /// Token name uniqueness violation
    #[error("token name already exists: {0}")]
    DuplicateName(String),

    /// Token secret uniqueness violation
    #[error("token value already in use by another token")]
    DuplicateTokenValue,

    /// Address uniqueness violation
    #[error("account already exists: {0}")]
    AddressExists(String),

    /// Token's lifetime creation ceiling reached
    #[error("token {name} has no uses left (max_use = {max_use})")]
    QuotaExceeded { name: String, max_use: i64 },

    /// Address fails format, prefix, or domain rules
    #[error("invalid address {addr}: {reason}")]
    InvalidAddress { addr: String, reason: String },

    /// Token deletion blocked while accounts still reference it
    #[error("token {0} still has accounts; delete or prune them first")]
    TokenInUse(String),

    /// Operation requires configuration that `init` has not written yet
    #[error("database not initialized, run `driftmail init` first")]
    NotInitialized,

    /// `init` called twice without `--force`
    #[error("database already initialized (pass --force to replace the config)")]
    AlreadyInitialized,

    /// Malformed duration code
    #[error("invalid duration {0:?} (expected digits plus s/m/h/d/w, e.g. \"1d\")")]
    InvalidDuration(String),

    /// IO errors (generated files, QR output)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error response body for the web adapter
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert Error to an HTTP response
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            Error::TokenNotFound(_) | Error::NoMatchingToken(_) | Error::AccountNotFound(_) => {
                (StatusCode::NOT_FOUND, "NotFound", self.to_string())
            }
            Error::InvalidToken => (StatusCode::FORBIDDEN, "InvalidToken", self.to_string()),
            Error::QuotaExceeded { .. } => {
                (StatusCode::FORBIDDEN, "QuotaExceeded", self.to_string())
            }
            Error::DuplicateName(_) | Error::DuplicateTokenValue => {
                (StatusCode::CONFLICT, "Duplicate", self.to_string())
            }
            Error::AddressExists(_) => (StatusCode::CONFLICT, "AddressExists", self.to_string()),
            Error::TokenInUse(_) => (StatusCode::CONFLICT, "TokenInUse", self.to_string()),
            Error::AlreadyInitialized => {
                (StatusCode::CONFLICT, "AlreadyInitialized", self.to_string())
            }
            Error::InvalidAddress { .. } | Error::InvalidDuration(_) => {
                (StatusCode::BAD_REQUEST, "InvalidRequest", self.to_string())
            }
            Error::NotInitialized => (
                StatusCode::SERVICE_UNAVAILABLE,
                "NotInitialized",
                self.to_string(),
            ),
            Error::Database(_) | Error::Io(_) | Error::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                // Don't leak details
                "internal server error".to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for driftmail operations
pub type Result<T> = std::result::Result<T, Error>;
