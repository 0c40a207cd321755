use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default OAuth2 token endpoint for Google service accounts.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Firebase service account credentials.
///
/// Only the fields the push pipeline needs are kept; the rest of the
/// downloaded JSON document is ignored.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceAccountKey {
    pub project_id: String,
    /// Issuer identity of the signed assertion.
    pub client_email: String,
    /// PKCS#8 or PKCS#1 PEM encoded RSA private key.
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    /// Parse the service account JSON document.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// PEM bytes with escaped `\n` sequences turned into real newlines.
    ///
    /// Secrets pasted into environment variables frequently keep the
    /// JSON-escaped form of the key.
    pub fn private_key_pem(&self) -> Vec<u8> {
        self.private_key.replace("\\n", "\n").into_bytes()
    }
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

/// A row returned by the inactivity query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct InactiveUser {
    pub user_id: String,
    pub updated_at: DateTime<Utc>,
}

/// A user selected for a notification, with the device token once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub user_id: String,
    pub device_token: Option<String>,
}

/// Title and body requested for a notification. Either may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub title: Option<String>,
    pub body: Option<String>,
}

impl Notice {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            body: Some(body.into()),
        }
    }
}

/// Result of delivering (or not) a notification to one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered {
        /// Message name assigned by the gateway, when it returned one.
        #[serde(skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
    },
    Skipped {
        reason: String,
    },
    Failed {
        reason: String,
    },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, DeliveryOutcome::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, DeliveryOutcome::Failed { .. })
    }
}

impl std::fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryOutcome::Delivered { .. } => write!(f, "delivered"),
            DeliveryOutcome::Skipped { reason } => write!(f, "skipped: {}", reason),
            DeliveryOutcome::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

/// Outcomes of one batch invocation, keyed by recipient identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub outcomes: BTreeMap<String, DeliveryOutcome>,
    /// Set when the batch deadline elapsed before every recipient finished.
    pub cancelled: bool,
}

impl BatchReport {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            outcomes: BTreeMap::new(),
            cancelled: false,
        }
    }

    pub fn record(&mut self, user_id: impl Into<String>, outcome: DeliveryOutcome) {
        self.outcomes.insert(user_id.into(), outcome);
    }

    pub fn get(&self, user_id: &str) -> Option<&DeliveryOutcome> {
        self.outcomes.get(user_id)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn delivered(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_delivered()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_skipped()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_failed()).count()
    }

    /// One-line human readable summary.
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Reminder run complete: {} delivered, {} skipped, {} failed",
            self.delivered(),
            self.skipped(),
            self.failed()
        );
        if self.cancelled {
            summary.push_str(" (deadline reached, remaining recipients not dispatched)");
        }
        summary
    }
}
