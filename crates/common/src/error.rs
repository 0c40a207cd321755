use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Common error types used across the application.
///
/// `Configuration`, `KeyFormat` and `TokenExchange` are fatal to an
/// invocation. `RecipientResolution` and `Delivery` are scoped to a single
/// recipient and normally end up folded into a `DeliveryOutcome`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Key format error: {0}")]
    KeyFormat(String),

    #[error("Token exchange failed: {detail}")]
    TokenExchange { status: Option<u16>, detail: String },

    #[error("Recipient resolution failed: {0}")]
    RecipientResolution(String),

    #[error("Delivery failed: {detail}")]
    Delivery { status: Option<u16>, detail: String },

    #[error("User store error: {0}")]
    Store(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Build a `TokenExchange` error from an HTTP status and response body.
    pub fn token_exchange_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        AppError::TokenExchange {
            status: Some(status),
            detail: format!("status {}: {}", status, body),
        }
    }

    /// Build a `Delivery` error from an HTTP status and response body.
    pub fn delivery_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        AppError::Delivery {
            status: Some(status),
            detail: format!("status {}: {}", status, body),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Configuration(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            AppError::KeyFormat(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            AppError::TokenExchange { .. } => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            AppError::RecipientResolution(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::Delivery { .. } => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            AppError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            AppError::Auth(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = json!({ "error": message });
        (status, Json(body)).into_response()
    }
}
