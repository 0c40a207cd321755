use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::Value;

use nudge_common::error::AppError;
use nudge_common::types::InactiveUser;

use super::{UserStore, non_blank};

/// User store reached through the hosted store's REST interface
/// (`/rest/v1/<table>` and `/rest/v1/rpc/<function>`).
#[derive(Clone)]
pub struct RestUserStore {
    http_client: reqwest::Client,
    base_url: String,
    service_key: String,
}

/// Row shape of `user_tokens` as returned by the REST interface.
#[derive(Debug, Deserialize)]
struct UserTokenRow {
    #[serde(default)]
    user_id: Value,
    #[serde(default)]
    updated_at: Value,
}

impl UserTokenRow {
    fn to_inactive_user(&self) -> Option<InactiveUser> {
        Some(InactiveUser {
            user_id: identifier(&self.user_id)?,
            updated_at: self.updated_at.as_str().and_then(parse_timestamp)?,
        })
    }
}

impl RestUserStore {
    pub fn new(
        http_client: reqwest::Client,
        base_url: impl Into<String>,
        service_key: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
        }
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }
}

#[async_trait]
impl UserStore for RestUserStore {
    async fn inactive_users(&self, cutoff: DateTime<Utc>) -> Result<Vec<InactiveUser>, AppError> {
        let url = format!("{}/rest/v1/user_tokens", self.base_url);
        let filter = format!("lt.{}", cutoff.to_rfc3339_opts(SecondsFormat::Millis, true));

        let response = self
            .authorized(self.http_client.get(&url))
            .query(&[("select", "user_id,updated_at"), ("updated_at", filter.as_str())])
            .send()
            .await
            .map_err(|e| AppError::Store(format!("inactivity query failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Store(format!(
                "inactivity query returned status {}: {}",
                status.as_u16(),
                body
            )));
        }

        let rows: Vec<UserTokenRow> = response
            .json()
            .await
            .map_err(|e| AppError::Store(format!("unparsable inactivity rows: {}", e)))?;

        // A malformed row is dropped; it must not cost the other users their reminder
        let users = rows
            .iter()
            .filter_map(|row| {
                let user = row.to_inactive_user();
                if user.is_none() {
                    tracing::warn!(row = ?row, "Skipping unusable user_tokens row");
                }
                user
            })
            .collect();

        Ok(users)
    }

    async fn device_token(&self, user_id: &str) -> Result<Option<String>, AppError> {
        let url = format!("{}/rest/v1/rpc/get_user_token", self.base_url);

        let response = self
            .authorized(self.http_client.post(&url))
            .json(&serde_json::json!({ "uid_text": user_id }))
            .send()
            .await
            .map_err(|e| AppError::RecipientResolution(format!("token lookup failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(AppError::RecipientResolution(format!(
                "token lookup returned status {}: {}",
                status.as_u16(),
                body
            )));
        }

        if body.trim().is_empty() {
            return Ok(None);
        }

        let value: Value = serde_json::from_str(&body).map_err(|e| {
            AppError::RecipientResolution(format!("unparsable token lookup response: {}", e))
        })?;

        Ok(non_blank(token_from_value(value)))
    }
}

/// The RPC returns either a bare string or an object with a `token` field.
fn token_from_value(value: Value) -> Option<String> {
    match value {
        Value::String(token) => Some(token),
        Value::Object(mut fields) => match fields.remove("token") {
            Some(Value::String(token)) => Some(token),
            _ => None,
        },
        Value::Array(rows) => rows.into_iter().next().and_then(token_from_value),
        _ => None,
    }
}

fn identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Accepts `timestamptz` (RFC 3339) and `timestamp` (no offset, read as UTC).
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
