//! Shared application state for the Axum API server.

use std::sync::Arc;

use nudge_common::config::AppConfig;
use nudge_common::error::AppError;
use nudge_engine::reminder::ReminderService;

/// Application state shared across all route handlers via Axum `State`.
///
/// The reminder pipeline is wired once at start-up. If the configuration is
/// incomplete the server still runs and the trigger routes answer with the
/// configuration error.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    reminders: Arc<Result<ReminderService, String>>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let reminders = ReminderService::from_config(&config).map_err(|e| {
            tracing::warn!(error = %e, "Reminder pipeline not configured");
            match e {
                AppError::Configuration(msg) => msg,
                other => other.to_string(),
            }
        });

        Self {
            config: Arc::new(config),
            reminders: Arc::new(reminders),
        }
    }

    /// Build state around an already wired service.
    pub fn with_service(config: AppConfig, reminders: ReminderService) -> Self {
        Self {
            config: Arc::new(config),
            reminders: Arc::new(Ok(reminders)),
        }
    }

    pub fn reminders(&self) -> Result<&ReminderService, AppError> {
        match &*self.reminders {
            Ok(service) => Ok(service),
            Err(msg) => Err(AppError::Configuration(msg.clone())),
        }
    }
}
