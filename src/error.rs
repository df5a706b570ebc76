//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Validation Errors**: Malformed or missing request fields
/// - **Authentication Errors**: Missing or invalid bearer tokens, bad credentials
/// - **Resource Errors**: Users or accounts that do not exist
/// - **Transfer Errors**: Operations that would break a balance invariant
/// - **Conflict Errors**: Lock or serialization contention, safe to retry
/// - **Internal Errors**: Unexpected store failures (never shown to clients)
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    ///
    /// Returns HTTP 500. The underlying error is logged, not returned.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Request body failed to parse or a field failed validation.
    ///
    /// Returns HTTP 411, matching the public contract for bad input.
    #[error("Incorrect inputs: {0}")]
    Validation(String),

    /// Bearer token is missing, malformed, expired or badly signed.
    #[error("Unauthenticated")]
    Unauthenticated,

    #[error("Username already taken")]
    DuplicateUsername,

    /// Username/password pair does not match any user.
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    /// No account is owned by the requested identity.
    #[error("Account not found")]
    AccountNotFound,

    /// The owner already has an account (one account per user).
    #[error("Account already exists")]
    AccountAlreadyExists,

    /// Debit would take the balance below zero.
    #[error("Insufficient balance")]
    InsufficientFunds,

    /// Amount is zero, negative, or would overflow a balance.
    #[error("Invalid amount")]
    InvalidAmount,

    /// Transfer destination equals the source.
    #[error("Cannot transfer to own account")]
    InvalidTarget,

    /// Lock acquisition timed out or the store reported a serialization
    /// conflict. Nothing was written; the request may be retried as-is.
    #[error("Conflicting concurrent update, please retry")]
    ConflictRetryable,

    /// Unexpected failure outside the database layer.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the caller may safely resend the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::ConflictRetryable)
    }

    /// HTTP status code for this error.
    ///
    /// # Status Code Mapping
    ///
    /// - `Validation`, `DuplicateUsername`, `InvalidCredentials` → 411 Length Required
    /// - `Unauthenticated` → 401 Unauthorized
    /// - `UserNotFound` → 404 Not Found
    /// - `AccountNotFound`, `InsufficientFunds`, `InvalidAmount`, `InvalidTarget` → 400 Bad Request
    /// - `AccountAlreadyExists`, `ConflictRetryable` → 409 Conflict
    /// - `Database`, `Internal` → 500 Internal Server Error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::DuplicateUsername | AppError::InvalidCredentials => {
                StatusCode::LENGTH_REQUIRED
            }
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::UserNotFound => StatusCode::NOT_FOUND,
            AppError::AccountNotFound
            | AppError::InsufficientFunds
            | AppError::InvalidAmount
            | AppError::InvalidTarget => StatusCode::BAD_REQUEST,
            AppError::AccountAlreadyExists | AppError::ConflictRetryable => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) | AppError::Internal(_) => "internal_error",
            AppError::Validation(_) => "invalid_input",
            AppError::Unauthenticated => "unauthenticated",
            AppError::DuplicateUsername => "duplicate_username",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::UserNotFound => "user_not_found",
            AppError::AccountNotFound => "account_not_found",
            AppError::AccountAlreadyExists => "account_already_exists",
            AppError::InsufficientFunds => "insufficient_funds",
            AppError::InvalidAmount => "invalid_amount",
            AppError::InvalidTarget => "invalid_target",
            AppError::ConflictRetryable => "conflict_retryable",
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "error": {
///     "code": "insufficient_funds",
///     "message": "Insufficient balance",
///     "retryable": false
///   }
/// }
/// ```
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal failures are logged here and hidden from the client
        let message = match &self {
            AppError::Database(e) => {
                tracing::error!(error = ?e, "database error");
                "An internal error occurred".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": message,
                "retryable": self.is_retryable()
            }
        }));

        (status, body).into_response()
    }
}
