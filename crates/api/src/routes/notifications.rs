//! Single-recipient dispatch.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};

use nudge_common::error::AppError;
use nudge_common::types::{DeliveryOutcome, Notice};

use crate::middleware::auth::TriggerAuth;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/notifications/send", post(send_notification))
}

/// Request body for a single notification.
///
/// `user_id` is kept loose so numeric identifiers are accepted and a missing
/// one is reported as a 400 rather than a deserialization failure.
#[derive(Debug, Deserialize)]
pub struct SendNotificationRequest {
    #[serde(default)]
    pub user_id: Option<Value>,
    pub title: Option<String>,
    pub body: Option<String>,
}

impl SendNotificationRequest {
    /// The trimmed, non-empty user identifier.
    fn user_id(&self) -> Result<String, AppError> {
        let id = match &self.user_id {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Null) | None => String::new(),
            Some(other) => {
                return Err(AppError::Validation(format!("user_id must be a string, got {}", other)));
            }
        };

        if id.is_empty() {
            return Err(AppError::Validation("user_id missing".to_string()));
        }
        Ok(id)
    }
}

/// POST /api/notifications/send: Push a notice to one user's device.
///
/// 400 when `user_id` is missing or the user has no device token, 500 on
/// configuration, token or gateway failures.
async fn send_notification(
    State(state): State<AppState>,
    _auth: TriggerAuth,
    payload: Result<Json<SendNotificationRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(req) =
        payload.map_err(|e| AppError::Validation(format!("Invalid request body: {}", e.body_text())))?;
    let user_id = req.user_id()?;

    let reminders = state.reminders()?;
    let notice = Notice {
        title: req.title,
        body: req.body,
    };

    match reminders.notify_user(&user_id, &notice).await? {
        DeliveryOutcome::Delivered { message_id } => {
            tracing::info!(user_id = %user_id, "Push sent");
            Ok(Json(json!({ "status": "Push sent", "message_id": message_id })).into_response())
        }
        DeliveryOutcome::Skipped { .. } => Err(AppError::Validation(
            "Device token not found for user".to_string(),
        )),
        DeliveryOutcome::Failed { reason } => {
            tracing::warn!(user_id = %user_id, reason = %reason, "Push failed");
            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": reason })),
            )
                .into_response())
        }
    }
}
