//! Inactivity reminder service.
//!
//! Ties the user store to the batch coordinator: a scan finds users who
//! have not been active since the threshold and reminds each of them; a
//! single-user request delivers a caller-provided notice to one user.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use nudge_common::config::AppConfig;
use nudge_common::error::AppError;
use nudge_common::types::{BatchReport, DeliveryOutcome, Notice};
use nudge_notifier::{FcmDispatcher, ServiceAccountTokenSource, http_client};

use crate::batch::BatchCoordinator;
use crate::store::{self, UserStore};

pub struct ReminderService {
    store: Arc<dyn UserStore>,
    coordinator: BatchCoordinator,
    inactivity_threshold: Duration,
    reminder: Notice,
}

impl ReminderService {
    pub fn new(
        store: Arc<dyn UserStore>,
        coordinator: BatchCoordinator,
        inactivity_threshold: Duration,
        reminder: Notice,
    ) -> Self {
        Self {
            store,
            coordinator,
            inactivity_threshold,
            reminder,
        }
    }

    /// Wire the production pipeline from configuration.
    ///
    /// Fails with `Configuration` when the service account or the user
    /// store settings are missing. No network call is made here.
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let account = Arc::new(config.service_account()?.clone());
        let http = http_client(config.http_timeout)?;

        let store = store::from_config(config, http.clone())?;
        let tokens = Arc::new(ServiceAccountTokenSource::new(account.clone(), http.clone()));
        let gateway = Arc::new(FcmDispatcher::new(
            http,
            &config.fcm_base_url,
            &account.project_id,
        ));

        let coordinator = BatchCoordinator::new(store.clone(), tokens, gateway)
            .with_concurrency(config.dispatch_concurrency)
            .with_deadline(config.batch_deadline);

        Ok(Self::new(
            store,
            coordinator,
            config.inactivity_threshold,
            Notice::new(config.reminder_title.clone(), config.reminder_body.clone()),
        ))
    }

    /// Remind every user inactive for longer than the threshold.
    ///
    /// An empty report means there was nobody to remind; no token is minted
    /// in that case.
    pub async fn run_scan(&self) -> Result<BatchReport, AppError> {
        let threshold = chrono::Duration::from_std(self.inactivity_threshold)
            .map_err(|e| AppError::Configuration(format!("inactivity threshold too large: {}", e)))?;
        let cutoff = Utc::now() - threshold;

        let inactive = self.store.inactive_users(cutoff).await.inspect_err(|e| {
            tracing::error!(error = %e, "Inactivity query failed");
        })?;

        if inactive.is_empty() {
            tracing::info!(cutoff = %cutoff, "No inactive users, nothing to send");
        } else {
            tracing::info!(cutoff = %cutoff, count = inactive.len(), "Found inactive users");
        }

        let user_ids = inactive.into_iter().map(|u| u.user_id).collect();
        self.coordinator.run(user_ids, &self.reminder).await
    }

    /// Deliver `notice` to a single user.
    pub async fn notify_user(
        &self,
        user_id: &str,
        notice: &Notice,
    ) -> Result<DeliveryOutcome, AppError> {
        self.coordinator.deliver_single(user_id, notice).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::DateTime;

    use nudge_common::types::InactiveUser;
    use nudge_notifier::{
        AccessTokenProvider, BearerToken, GatewayResponse, MessageEnvelope, PushGateway,
    };

    use super::*;

    struct ScanStore {
        rows: Vec<InactiveUser>,
        cutoffs: Mutex<Vec<DateTime<Utc>>>,
    }

    #[async_trait]
    impl UserStore for ScanStore {
        async fn inactive_users(&self, cutoff: DateTime<Utc>) -> Result<Vec<InactiveUser>, AppError> {
            self.cutoffs.lock().unwrap().push(cutoff);
            Ok(self.rows.iter().filter(|r| r.updated_at < cutoff).cloned().collect())
        }

        async fn device_token(&self, user_id: &str) -> Result<Option<String>, AppError> {
            Ok(Some(format!("dev-{}", user_id)))
        }
    }

    struct PanickingTokens;

    #[async_trait]
    impl AccessTokenProvider for PanickingTokens {
        async fn access_token(&self) -> Result<BearerToken, AppError> {
            panic!("no token should be minted");
        }
    }

    struct StaticTokens;

    #[async_trait]
    impl AccessTokenProvider for StaticTokens {
        async fn access_token(&self) -> Result<BearerToken, AppError> {
            Ok(BearerToken::new("ya29.static", Utc::now()))
        }
    }

    #[derive(Default)]
    struct RecordingGateway {
        titles: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PushGateway for RecordingGateway {
        async fn send(
            &self,
            _token: &BearerToken,
            envelope: &MessageEnvelope,
        ) -> Result<GatewayResponse, AppError> {
            self.titles.lock().unwrap().push(envelope.title().to_string());
            Ok(GatewayResponse::default())
        }
    }

    fn row(user_id: &str, days_ago: i64) -> InactiveUser {
        InactiveUser {
            user_id: user_id.to_string(),
            updated_at: Utc::now() - chrono::Duration::days(days_ago),
        }
    }

    #[tokio::test]
    async fn test_scan_reminds_only_users_past_threshold() {
        let store = Arc::new(ScanStore {
            rows: vec![row("old", 10), row("recent", 1)],
            cutoffs: Mutex::new(Vec::new()),
        });
        let gateway = Arc::new(RecordingGateway::default());
        let coordinator =
            BatchCoordinator::new(store.clone(), Arc::new(StaticTokens), gateway.clone());
        let service = ReminderService::new(
            store.clone(),
            coordinator,
            Duration::from_secs(7 * 24 * 3600),
            Notice::new("We miss you", "Come back"),
        );

        let report = service.run_scan().await.unwrap();

        assert_eq!(report.len(), 1);
        assert!(report.get("old").unwrap().is_delivered());
        assert_eq!(*gateway.titles.lock().unwrap(), vec!["We miss you".to_string()]);

        let cutoff = store.cutoffs.lock().unwrap()[0];
        let age = Utc::now() - cutoff;
        assert!(age >= chrono::Duration::days(7));
        assert!(age < chrono::Duration::days(7) + chrono::Duration::minutes(1));
    }

    #[tokio::test]
    async fn test_scan_without_inactive_users_mints_no_token() {
        let store = Arc::new(ScanStore {
            rows: vec![row("recent", 1)],
            cutoffs: Mutex::new(Vec::new()),
        });
        let coordinator = BatchCoordinator::new(
            store.clone(),
            Arc::new(PanickingTokens),
            Arc::new(RecordingGateway::default()),
        );
        let service = ReminderService::new(
            store,
            coordinator,
            Duration::from_secs(7 * 24 * 3600),
            Notice::default(),
        );

        let report = service.run_scan().await.unwrap();
        assert!(report.is_empty());
    }

    #[test]
    fn test_from_config_requires_service_account() {
        let config = AppConfig::from_lookup(|name| match name {
            "STORE_URL" => Some("https://store.example".to_string()),
            "STORE_SERVICE_KEY" => Some("service-role".to_string()),
            _ => None,
        })
        .unwrap();

        assert!(matches!(
            ReminderService::from_config(&config),
            Err(AppError::Configuration(_))
        ));
    }
}
