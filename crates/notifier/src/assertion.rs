//! Signed assertions for the OAuth2 JWT-bearer grant.
//!
//! A service account proves its identity to the token endpoint by signing a
//! short claim set with its RSA private key (RS256). The resulting JWT is
//! valid for one hour and is consumed by exactly one token exchange.

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};

use nudge_common::error::AppError;
use nudge_common::types::ServiceAccountKey;

/// OAuth2 scope granting access to the messaging send API.
pub const MESSAGING_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

/// Lifetime of a signed assertion in seconds.
pub const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// JWT claims of the assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    /// Issuer, the service account email
    pub iss: String,
    pub scope: String,
    /// Audience, the token endpoint
    pub aud: String,
    /// Issued at (UNIX timestamp)
    pub iat: i64,
    /// Expiration time (UNIX timestamp)
    pub exp: i64,
}

/// A signed, serialized assertion together with the claims it carries.
///
/// Not `Clone`: an assertion is handed to the token exchanger by value.
pub struct SignedAssertion {
    claims: AssertionClaims,
    jwt: String,
}

impl SignedAssertion {
    pub fn claims(&self) -> &AssertionClaims {
        &self.claims
    }

    /// The compact JWS serialization (`header.claims.signature`).
    pub fn as_str(&self) -> &str {
        &self.jwt
    }
}

impl std::fmt::Debug for SignedAssertion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedAssertion")
            .field("claims", &self.claims)
            .field("jwt", &"<redacted>")
            .finish()
    }
}

/// Builds signed assertions for a fixed scope.
#[derive(Debug, Clone)]
pub struct AssertionBuilder {
    scope: String,
}

impl AssertionBuilder {
    pub fn new() -> Self {
        Self {
            scope: MESSAGING_SCOPE.to_string(),
        }
    }

    /// Build an assertion issued now.
    pub fn build(&self, key: &ServiceAccountKey) -> Result<SignedAssertion, AppError> {
        self.build_at(key, Utc::now().timestamp())
    }

    /// Build an assertion issued at `issued_at` (UNIX seconds).
    ///
    /// The audience is the key's token endpoint and the expiry is exactly
    /// `issued_at + ASSERTION_LIFETIME_SECS`.
    pub fn build_at(
        &self,
        key: &ServiceAccountKey,
        issued_at: i64,
    ) -> Result<SignedAssertion, AppError> {
        let encoding_key = EncodingKey::from_rsa_pem(&key.private_key_pem())
            .map_err(|e| AppError::KeyFormat(format!("Invalid RSA private key: {}", e)))?;

        let claims = AssertionClaims {
            iss: key.client_email.clone(),
            scope: self.scope.clone(),
            aud: key.token_uri.clone(),
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
        };

        // Header::new sets typ = "JWT"
        let header = Header::new(Algorithm::RS256);

        let jwt = encode(&header, &claims, &encoding_key).map_err(|e| match e.kind() {
            ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidKeyFormat => {
                AppError::KeyFormat(format!("Invalid RSA private key: {}", e))
            }
            _ => AppError::Internal(format!("Failed to sign assertion: {}", e)),
        })?;

        Ok(SignedAssertion { claims, jwt })
    }
}

impl Default for AssertionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
