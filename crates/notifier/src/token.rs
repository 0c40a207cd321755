//! OAuth2 JWT-bearer token exchange.
//!
//! Trades a signed assertion for a short-lived bearer token. The token is
//! minted once per invocation and never cached across invocations.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use nudge_common::error::AppError;
use nudge_common::types::ServiceAccountKey;

use crate::assertion::{AssertionBuilder, SignedAssertion};

/// Grant type of the OAuth2 JWT-bearer flow (RFC 7523).
pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Body of a successful token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenExchangeResult {
    pub access_token: Option<String>,
    pub expires_in: Option<i64>,
    pub token_type: Option<String>,
}

/// Short-lived bearer credential for the push gateway.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl BearerToken {
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    pub fn secret(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// `Authorization` header value.
    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.value)
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Source of the bearer token used for one invocation.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Mint a fresh bearer token.
    async fn access_token(&self) -> Result<BearerToken, AppError>;
}

/// Posts JWT-bearer grants to an OAuth2 token endpoint.
#[derive(Debug, Clone)]
pub struct TokenExchanger {
    http_client: reqwest::Client,
    token_uri: String,
}

impl TokenExchanger {
    pub fn new(http_client: reqwest::Client, token_uri: impl Into<String>) -> Self {
        Self {
            http_client,
            token_uri: token_uri.into(),
        }
    }

    /// Exchange the assertion for a bearer token.
    ///
    /// Fails with `TokenExchange` on transport errors, non-2xx responses and
    /// responses without an `access_token`.
    pub async fn exchange(&self, assertion: SignedAssertion) -> Result<BearerToken, AppError> {
        let params = [
            ("grant_type", JWT_BEARER_GRANT),
            ("assertion", assertion.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::TokenExchange {
                status: None,
                detail: format!("request to token endpoint failed: {}", e),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| AppError::TokenExchange {
            status: Some(status.as_u16()),
            detail: format!("failed to read token response: {}", e),
        })?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Token endpoint rejected assertion");
            return Err(AppError::token_exchange_status(status.as_u16(), body));
        }

        let result: TokenExchangeResult =
            serde_json::from_str(&body).map_err(|e| AppError::TokenExchange {
                status: Some(status.as_u16()),
                detail: format!("unparsable token response: {}", e),
            })?;

        let access_token = result
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::TokenExchange {
                status: Some(status.as_u16()),
                detail: "token response has no access_token".to_string(),
            })?;

        let lifetime = result.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        let expires_at = Duration::try_seconds(lifetime)
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .ok_or_else(|| AppError::TokenExchange {
                status: Some(status.as_u16()),
                detail: format!("token response has out-of-range expires_in: {}", lifetime),
            })?;

        tracing::debug!(
            token_type = result.token_type.as_deref().unwrap_or("Bearer"),
            expires_in = lifetime,
            "Access token minted"
        );

        Ok(BearerToken::new(access_token, expires_at))
    }
}

/// Mints bearer tokens from a service account: build assertion, then exchange.
pub struct ServiceAccountTokenSource {
    key: Arc<ServiceAccountKey>,
    builder: AssertionBuilder,
    exchanger: TokenExchanger,
}

impl ServiceAccountTokenSource {
    /// Exchange against the token endpoint named in the key.
    pub fn new(key: Arc<ServiceAccountKey>, http_client: reqwest::Client) -> Self {
        let exchanger = TokenExchanger::new(http_client, key.token_uri.clone());
        Self {
            key,
            builder: AssertionBuilder::new(),
            exchanger,
        }
    }
}

#[async_trait]
impl AccessTokenProvider for ServiceAccountTokenSource {
    async fn access_token(&self) -> Result<BearerToken, AppError> {
        let assertion = self.builder.build(&self.key)?;
        self.exchanger.exchange(assertion).await
    }
}
