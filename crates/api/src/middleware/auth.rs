//! Trigger authentication.
//!
//! When `TRIGGER_JWT_SECRET` is configured, callers (the scheduler, other
//! backend functions) must present `Authorization: Bearer <JWT>` signed
//! with that secret (HS256). Without a secret the trigger routes are open.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use nudge_common::error::AppError;

use crate::state::AppState;

/// JWT claims stored in the token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject: name of the calling service
    pub sub: String,
    /// Expiration time (UNIX timestamp)
    pub exp: i64,
    /// Issued at (UNIX timestamp)
    pub iat: i64,
}

/// Caller of a trigger route. `caller` is `None` when authentication is off.
#[derive(Debug, Clone)]
pub struct TriggerAuth {
    pub caller: Option<String>,
}

/// Encode a trigger JWT for `subject`.
pub fn encode_jwt(subject: &str, secret: &str, expiry_hours: u64) -> Result<String, AppError> {
    let now = Utc::now();
    let exp = now + Duration::hours(expiry_hours as i64);

    let claims = Claims {
        sub: subject.to_string(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Auth(format!("Failed to encode JWT: {}", e)))
}

/// Decode and validate a trigger JWT.
pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::Auth(format!("Invalid token: {}", e)))?;

    Ok(token_data.claims)
}

impl FromRequestParts<AppState> for TriggerAuth {
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let secret = state.config.trigger_jwt_secret.clone();

        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        async move {
            let Some(secret) = secret else {
                return Ok(TriggerAuth { caller: None });
            };

            if let Some(auth) = auth_header
                && let Some(token) = auth.strip_prefix("Bearer ")
            {
                let claims = decode_jwt(token, &secret)?;
                return Ok(TriggerAuth {
                    caller: Some(claims.sub),
                });
            }

            Err(AppError::Auth(
                "Missing or invalid Authorization header. Use 'Bearer <JWT>'".to_string(),
            ))
        }
    }
}
