//! Batch coordinator.
//!
//! Mints one bearer token per invocation, then delivers to each recipient
//! independently:
//! 1. Resolve the device token (absent → `Skipped`, lookup error → `Failed`)
//! 2. Encode the message envelope
//! 3. Dispatch through the push gateway
//!
//! Every recipient ends with exactly one `DeliveryOutcome`; nothing that
//! happens to one recipient affects another. Only a failed token mint
//! aborts the batch, and it does so before any recipient is touched.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::stream;
use uuid::Uuid;

use nudge_common::error::AppError;
use nudge_common::types::{BatchReport, DeliveryOutcome, Notice, Recipient};
use nudge_notifier::{AccessTokenProvider, BearerToken, MessageEnvelope, PushGateway};

use crate::store::UserStore;

/// Default number of recipients dispatched concurrently.
pub const DEFAULT_CONCURRENCY: usize = 8;

const NO_DEVICE_TOKEN: &str = "no device token registered";

pub struct BatchCoordinator {
    store: Arc<dyn UserStore>,
    tokens: Arc<dyn AccessTokenProvider>,
    gateway: Arc<dyn PushGateway>,
    concurrency: usize,
    deadline: Option<Duration>,
}

impl BatchCoordinator {
    pub fn new(
        store: Arc<dyn UserStore>,
        tokens: Arc<dyn AccessTokenProvider>,
        gateway: Arc<dyn PushGateway>,
    ) -> Self {
        Self {
            store,
            tokens,
            gateway,
            concurrency: DEFAULT_CONCURRENCY,
            deadline: None,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Stop waiting for outstanding deliveries once `deadline` has elapsed.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Deliver `notice` to every user in `user_ids`.
    ///
    /// Returns an error only when the bearer token cannot be minted; in that
    /// case no recipient is processed. Duplicate identifiers are delivered to
    /// once. When a deadline is set and elapses, the report holds the
    /// outcomes recorded so far and is marked `cancelled`.
    pub async fn run(&self, user_ids: Vec<String>, notice: &Notice) -> Result<BatchReport, AppError> {
        let run_id = Uuid::new_v4();
        let mut report = BatchReport::new(run_id);

        let mut seen = HashSet::new();
        let recipients: Vec<String> = user_ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();

        if recipients.is_empty() {
            return Ok(report);
        }

        tracing::info!(run_id = %run_id, recipients = recipients.len(), "Starting reminder batch");

        let token = self.tokens.access_token().await.inspect_err(|e| {
            tracing::error!(run_id = %run_id, error = %e, "Could not mint access token, aborting batch");
        })?;

        let deadline = self.deadline.map(|d| tokio::time::Instant::now() + d);
        let token = &token;

        let mut pending = stream::iter(recipients)
            .map(move |user_id| async move {
                let outcome = self.deliver(token, &user_id, notice).await;
                (user_id, outcome)
            })
            .buffer_unordered(self.concurrency);

        loop {
            let next = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, pending.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        report.cancelled = true;
                        break;
                    }
                },
                None => pending.next().await,
            };

            let Some((user_id, outcome)) = next else {
                break;
            };
            report.record(user_id, outcome);
        }

        if report.cancelled {
            tracing::warn!(
                run_id = %run_id,
                recorded = report.len(),
                "Batch deadline reached, remaining recipients dropped"
            );
        }

        tracing::info!(
            run_id = %run_id,
            delivered = report.delivered(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Reminder batch finished"
        );

        Ok(report)
    }

    /// Deliver `notice` to one user outside of a batch.
    ///
    /// The device token is resolved first, so an unknown user costs no
    /// token exchange. Lookup and token errors are returned as errors;
    /// gateway errors become a `Failed` outcome.
    pub async fn deliver_single(
        &self,
        user_id: &str,
        notice: &Notice,
    ) -> Result<DeliveryOutcome, AppError> {
        let recipient = self.store.resolve(user_id).await?;
        let Some(device_token) = recipient.device_token.as_deref() else {
            tracing::info!(user_id, "No device token registered, nothing sent");
            return Ok(DeliveryOutcome::Skipped {
                reason: NO_DEVICE_TOKEN.to_string(),
            });
        };

        let token = self.tokens.access_token().await?;
        Ok(self.send(&token, &recipient.user_id, device_token, notice).await)
    }

    async fn deliver(&self, token: &BearerToken, user_id: &str, notice: &Notice) -> DeliveryOutcome {
        let device_token = match self.store.resolve(user_id).await {
            Ok(Recipient {
                device_token: Some(device_token),
                ..
            }) => device_token,
            Ok(_) => {
                tracing::debug!(user_id, "No device token registered, skipping");
                return DeliveryOutcome::Skipped {
                    reason: NO_DEVICE_TOKEN.to_string(),
                };
            }
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Device token lookup failed");
                return DeliveryOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        self.send(token, user_id, &device_token, notice).await
    }

    async fn send(
        &self,
        token: &BearerToken,
        user_id: &str,
        device_token: &str,
        notice: &Notice,
    ) -> DeliveryOutcome {
        let envelope =
            MessageEnvelope::encode(device_token, notice.title.as_deref(), notice.body.as_deref());
        let outcome = self.gateway.dispatch(token, &envelope).await;

        match &outcome {
            DeliveryOutcome::Failed { reason } => {
                tracing::warn!(user_id, reason = %reason, "Notification delivery failed");
            }
            _ => tracing::info!(user_id, "Notification delivered"),
        }

        outcome
    }
}
