//! Scheduled inactivity scan.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;

use nudge_common::error::AppError;
use nudge_common::types::BatchReport;

use crate::middleware::auth::TriggerAuth;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/reminders/run", post(run_reminders))
}

/// Response of a scan run.
#[derive(Debug, Serialize)]
pub struct RunResponse {
    /// Human-readable status line
    pub status: String,
    pub delivered: usize,
    pub skipped: usize,
    pub failed: usize,
    #[serde(flatten)]
    pub report: BatchReport,
}

impl From<BatchReport> for RunResponse {
    fn from(report: BatchReport) -> Self {
        let status = if report.is_empty() && !report.cancelled {
            "No inactive users".to_string()
        } else {
            report.summary()
        };

        Self {
            status,
            delivered: report.delivered(),
            skipped: report.skipped(),
            failed: report.failed(),
            report,
        }
    }
}

/// POST /api/reminders/run: Remind every user inactive past the threshold.
///
/// Per-recipient failures are reported in the body with status 200; only a
/// configuration, store or token failure turns the whole run into an error.
async fn run_reminders(
    State(state): State<AppState>,
    auth: TriggerAuth,
) -> Result<Json<RunResponse>, AppError> {
    let reminders = state.reminders()?;

    tracing::info!(caller = ?auth.caller, "Reminder run triggered");
    let report = reminders.run_scan().await?;

    Ok(Json(RunResponse::from(report)))
}
