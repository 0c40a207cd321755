//! FCM HTTP v1 message envelope.

use serde::Serialize;

/// Title used when the caller did not supply one.
pub const DEFAULT_TITLE: &str = "Notification";

/// Android delivery priority.
const ANDROID_PRIORITY: &str = "HIGH";

/// APNs priority header value (10 = deliver immediately).
const APNS_PRIORITY: &str = "10";

/// `{ "message": { ... } }` body of a send request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageEnvelope {
    message: Message,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct Message {
    token: String,
    notification: Notification,
    android: AndroidConfig,
    apns: ApnsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct Notification {
    title: String,
    body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct AndroidConfig {
    priority: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct ApnsConfig {
    headers: ApnsHeaders,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct ApnsHeaders {
    #[serde(rename = "apns-priority")]
    apns_priority: &'static str,
}

impl MessageEnvelope {
    /// Encode a notification for one device.
    ///
    /// Never fails: a missing title becomes `DEFAULT_TITLE`, a missing body
    /// becomes empty. The device token is passed through unvalidated.
    pub fn encode(device_token: &str, title: Option<&str>, body: Option<&str>) -> Self {
        Self {
            message: Message {
                token: device_token.to_string(),
                notification: Notification {
                    title: title.unwrap_or(DEFAULT_TITLE).to_string(),
                    body: body.unwrap_or_default().to_string(),
                },
                android: AndroidConfig {
                    priority: ANDROID_PRIORITY,
                },
                apns: ApnsConfig {
                    headers: ApnsHeaders {
                        apns_priority: APNS_PRIORITY,
                    },
                },
            },
        }
    }

    pub fn device_token(&self) -> &str {
        &self.message.token
    }

    pub fn title(&self) -> &str {
        &self.message.notification.title
    }

    pub fn body(&self) -> &str {
        &self.message.notification.body
    }
}
