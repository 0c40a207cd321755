//! User store adapters.
//!
//! The pipeline reads two things from the store: users whose last activity
//! is older than a cutoff, and the device token registered for a user.

mod postgres;
mod rest;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use nudge_common::config::{AppConfig, StoreBackend};
use nudge_common::db::create_pool;
use nudge_common::error::AppError;
use nudge_common::types::{InactiveUser, Recipient};

pub use postgres::PgUserStore;
pub use rest::RestUserStore;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Users whose `updated_at` is strictly older than `cutoff`.
    async fn inactive_users(&self, cutoff: DateTime<Utc>) -> Result<Vec<InactiveUser>, AppError>;

    /// The device token registered for `user_id`, if any.
    ///
    /// Errors are `AppError::RecipientResolution`.
    async fn device_token(&self, user_id: &str) -> Result<Option<String>, AppError>;

    /// Resolve `user_id` into a recipient, with its device token if any.
    async fn resolve(&self, user_id: &str) -> Result<Recipient, AppError> {
        let device_token = self.device_token(user_id).await?;
        Ok(Recipient {
            user_id: user_id.to_string(),
            device_token,
        })
    }
}

/// Build the store selected by the configuration.
pub fn from_config(
    config: &AppConfig,
    http_client: reqwest::Client,
) -> Result<Arc<dyn UserStore>, AppError> {
    match config.store_backend()? {
        StoreBackend::Postgres {
            database_url,
            max_connections,
        } => {
            let pool = create_pool(&database_url, max_connections)
                .map_err(|e| AppError::Configuration(format!("DATABASE_URL is invalid: {}", e)))?;
            Ok(Arc::new(PgUserStore::new(pool)))
        }
        StoreBackend::Rest {
            base_url,
            service_key,
        } => Ok(Arc::new(RestUserStore::new(
            http_client,
            base_url,
            service_key,
        ))),
    }
}

/// Treat blank tokens the same as missing ones.
fn non_blank(token: Option<String>) -> Option<String> {
    token.filter(|t| !t.trim().is_empty())
}
