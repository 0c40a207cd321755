use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use nudge_common::error::AppError;
use nudge_common::types::InactiveUser;

use super::{UserStore, non_blank};

/// User store backed directly by the `user_tokens` table.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn inactive_users(&self, cutoff: DateTime<Utc>) -> Result<Vec<InactiveUser>, AppError> {
        let users: Vec<InactiveUser> = sqlx::query_as(
            r#"
            SELECT user_id, updated_at
            FROM user_tokens
            WHERE updated_at < $1
            ORDER BY updated_at ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn device_token(&self, user_id: &str) -> Result<Option<String>, AppError> {
        let token: Option<String> = sqlx::query_scalar("SELECT get_user_token($1)")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::RecipientResolution(format!("token lookup failed: {}", e)))?;

        Ok(non_blank(token))
    }
}
