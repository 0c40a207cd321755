//! Credential exchange and push delivery.
//!
//! - `assertion`: RS256-signed JWT-bearer assertions from a service account
//! - `token`: OAuth2 exchange of an assertion for a bearer token
//! - `message`: FCM HTTP v1 message envelope
//! - `dispatcher`: sends one envelope and reports the outcome

pub mod assertion;
pub mod dispatcher;
pub mod message;
pub mod token;

use std::time::Duration;

use nudge_common::error::AppError;

pub use assertion::{AssertionBuilder, SignedAssertion};
pub use dispatcher::{FcmDispatcher, GatewayResponse, PushGateway};
pub use message::MessageEnvelope;
pub use token::{AccessTokenProvider, BearerToken, ServiceAccountTokenSource, TokenExchanger};

/// HTTP client shared by the token exchanger and the dispatcher.
///
/// Fails with `Configuration` when the client cannot be built, so the
/// configured timeout is never silently dropped.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("idle-nudge/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AppError::Configuration(format!("failed to build HTTP client: {}", e)))
}
