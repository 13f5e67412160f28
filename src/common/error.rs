// src/common/error.rs

use std::collections::HashMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Every failure the front door can surface. Client-facing variants carry
/// their own message; storage and crypto internals collapse into a generic
/// 500 and are only logged.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("email already registered")]
    EmailAlreadyExists,

    #[error("subdomain already taken")]
    SubdomainAlreadyTaken,

    #[error("invalid tenant")]
    InvalidTenant,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("email not verified")]
    EmailNotVerified,

    #[error("invalid token")]
    InvalidToken,

    #[error("token expired")]
    TokenExpired,

    // Same shape for "no such user" and "reset email not sent".
    #[error("password reset unavailable")]
    PasswordResetUnavailable,

    #[error("invalid or expired session")]
    InvalidSession,

    #[error("user not found")]
    UserNotFound,

    #[error("database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    InternalServerError(#[from] anyhow::Error),

    #[error("bcrypt error: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("jwt error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::InvalidTenant
            | AppError::InvalidToken
            | AppError::TokenExpired
            | AppError::PasswordResetUnavailable => StatusCode::BAD_REQUEST,
            AppError::EmailAlreadyExists | AppError::SubdomainAlreadyTaken => StatusCode::CONFLICT,
            AppError::InvalidCredentials | AppError::InvalidSession => StatusCode::UNAUTHORIZED,
            AppError::EmailNotVerified => StatusCode::FORBIDDEN,
            AppError::UserNotFound => StatusCode::NOT_FOUND,
            AppError::DatabaseError(_)
            | AppError::InternalServerError(_)
            | AppError::BcryptError(_)
            | AppError::JwtError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message a caller is allowed to see.
    pub fn public_message(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "Validation failed",
            AppError::EmailAlreadyExists => "Email already registered",
            AppError::SubdomainAlreadyTaken => "Subdomain already taken",
            AppError::InvalidTenant => "Invalid tenant",
            AppError::InvalidCredentials => "Invalid credentials",
            AppError::EmailNotVerified => "Please verify your email before logging in",
            AppError::InvalidToken => "Invalid or already used token",
            AppError::TokenExpired => "Token has expired",
            AppError::PasswordResetUnavailable => {
                "Unable to send password reset instructions. Please try again."
            }
            AppError::InvalidSession => "Invalid or missing session token",
            AppError::UserNotFound => "User not found",
            _ => "An unexpected error occurred",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            // Every failing field, not just the first one.
            AppError::ValidationError(errors) => {
                let mut details = HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map_or_else(|| e.code.to_string(), ToString::to_string)
                        })
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                json!({
                    "success": false,
                    "error": self.public_message(),
                    "details": details,
                })
            }
            AppError::EmailAlreadyExists => json!({
                "success": false,
                "error": self.public_message(),
                "field": "companyEmail",
            }),
            AppError::SubdomainAlreadyTaken => json!({
                "success": false,
                "error": self.public_message(),
                "field": "subdomain",
            }),
            e if status.is_server_error() => {
                tracing::error!("Internal server error: {}", e);
                json!({ "success": false, "error": self.public_message() })
            }
            _ => json!({ "success": false, "error": self.public_message() }),
        };

        (status, Json(body)).into_response()
    }
}
