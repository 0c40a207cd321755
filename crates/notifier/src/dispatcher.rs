//! Push gateway dispatch.
//!
//! One envelope, one request, no retries. Failures are reported as a
//! `DeliveryOutcome::Failed` for the recipient and never escape further.

use async_trait::async_trait;
use serde::Deserialize;

use nudge_common::error::AppError;
use nudge_common::types::DeliveryOutcome;

use crate::message::MessageEnvelope;
use crate::token::BearerToken;

/// Body of a successful send response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayResponse {
    /// `projects/{project}/messages/{id}`
    pub name: Option<String>,
}

/// A gateway that accepts encoded messages.
#[async_trait]
pub trait PushGateway: Send + Sync {
    /// Send one envelope. Errors are `AppError::Delivery`.
    async fn send(
        &self,
        token: &BearerToken,
        envelope: &MessageEnvelope,
    ) -> Result<GatewayResponse, AppError>;

    /// Send one envelope and fold the result into an outcome.
    async fn dispatch(&self, token: &BearerToken, envelope: &MessageEnvelope) -> DeliveryOutcome {
        match self.send(token, envelope).await {
            Ok(response) => DeliveryOutcome::Delivered {
                message_id: response.name,
            },
            Err(e) => DeliveryOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }
}

/// Firebase Cloud Messaging HTTP v1 dispatcher.
#[derive(Debug, Clone)]
pub struct FcmDispatcher {
    http_client: reqwest::Client,
    endpoint: String,
}

impl FcmDispatcher {
    /// `base_url` is the gateway origin, e.g. `https://fcm.googleapis.com`.
    pub fn new(http_client: reqwest::Client, base_url: &str, project_id: &str) -> Self {
        Self {
            http_client,
            endpoint: format!(
                "{}/v1/projects/{}/messages:send",
                base_url.trim_end_matches('/'),
                project_id
            ),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl PushGateway for FcmDispatcher {
    async fn send(
        &self,
        token: &BearerToken,
        envelope: &MessageEnvelope,
    ) -> Result<GatewayResponse, AppError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .header(reqwest::header::AUTHORIZATION, token.header_value())
            .json(envelope)
            .send()
            .await
            .map_err(|e| AppError::Delivery {
                status: None,
                detail: format!("request to push gateway failed: {}", e),
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Push gateway rejected message");
            return Err(AppError::delivery_status(status.as_u16(), body));
        }

        // The message name is informational; a 2xx is a delivery either way.
        Ok(serde_json::from_str(&body).unwrap_or_default())
    }
}
