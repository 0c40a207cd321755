use std::net::SocketAddr;
use std::time::Duration;

use crate::error::AppError;
use crate::types::ServiceAccountKey;

pub const DEFAULT_FCM_BASE_URL: &str = "https://fcm.googleapis.com";
pub const DEFAULT_REMINDER_TITLE: &str = "Dailymoji misses you 💌";
pub const DEFAULT_REMINDER_BODY: &str = "How about recording how you felt today?";

/// Global application configuration loaded from environment variables.
///
/// Built once at start-up and shared read-only. Secrets are optional here so
/// the server can still start and report a configuration error per request.
#[derive(Clone)]
pub struct AppConfig {
    /// Listen address of the HTTP server
    pub bind_addr: SocketAddr,

    /// Base URL of the hosted user store (REST backend)
    pub store_url: Option<String>,

    /// Service credential for the hosted user store
    pub store_service_key: Option<String>,

    /// PostgreSQL connection string (takes precedence over the REST store)
    pub database_url: Option<String>,

    /// Maximum number of PostgreSQL connections in the pool (default: 5)
    pub db_max_connections: u32,

    /// Messaging service account, parsed from `GOOGLE_SERVICE_ACCOUNT`
    pub service_account: Option<ServiceAccountKey>,

    /// Base URL of the push gateway
    pub fcm_base_url: String,

    /// Users whose last activity is older than this are reminded (default: 7 days)
    pub inactivity_threshold: Duration,

    /// Title of the reminder sent by the scan pipeline
    pub reminder_title: String,

    /// Body of the reminder sent by the scan pipeline
    pub reminder_body: String,

    /// Maximum number of recipients dispatched concurrently (default: 8)
    pub dispatch_concurrency: usize,

    /// Optional deadline for one batch run
    pub batch_deadline: Option<Duration>,

    /// Timeout applied to every outbound HTTP request (default: 10s)
    pub http_timeout: Duration,

    /// HS256 secret trigger callers must sign their bearer JWT with
    pub trigger_jwt_secret: Option<String>,
}

/// Where inactive users and device tokens are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres {
        database_url: String,
        max_connections: u32,
    },
    Rest {
        base_url: String,
        service_key: String,
    },
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let service_account = match var("GOOGLE_SERVICE_ACCOUNT") {
            Some(raw) => Some(ServiceAccountKey::from_json(&raw).map_err(|e| {
                anyhow::anyhow!("GOOGLE_SERVICE_ACCOUNT is not a valid service account: {}", e)
            })?),
            None => None,
        };

        Ok(Self {
            bind_addr: var("BIND_ADDR")
                .unwrap_or_else(|| "0.0.0.0:3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("BIND_ADDR must be a valid socket address"))?,
            store_url: var("STORE_URL").map(|url| url.trim_end_matches('/').to_string()),
            store_service_key: var("STORE_SERVICE_KEY"),
            database_url: var("DATABASE_URL"),
            db_max_connections: var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|| "5".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
            service_account,
            fcm_base_url: var("FCM_BASE_URL")
                .unwrap_or_else(|| DEFAULT_FCM_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            inactivity_threshold: Duration::from_secs(
                var("INACTIVITY_THRESHOLD_HOURS")
                    .unwrap_or_else(|| "168".to_string())
                    .parse::<u64>()
                    .map_err(|_| anyhow::anyhow!("INACTIVITY_THRESHOLD_HOURS must be a valid u64"))?
                    * 3600,
            ),
            reminder_title: var("REMINDER_TITLE")
                .unwrap_or_else(|| DEFAULT_REMINDER_TITLE.to_string()),
            reminder_body: var("REMINDER_BODY").unwrap_or_else(|| DEFAULT_REMINDER_BODY.to_string()),
            dispatch_concurrency: var("DISPATCH_CONCURRENCY")
                .unwrap_or_else(|| "8".to_string())
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| anyhow::anyhow!("DISPATCH_CONCURRENCY must be a positive integer"))?,
            batch_deadline: var("BATCH_DEADLINE_SECS")
                .map(|v| {
                    v.parse()
                        .map(Duration::from_secs)
                        .map_err(|_| anyhow::anyhow!("BATCH_DEADLINE_SECS must be a valid u64"))
                })
                .transpose()?,
            http_timeout: Duration::from_secs(
                var("HTTP_TIMEOUT_SECS")
                    .unwrap_or_else(|| "10".to_string())
                    .parse()
                    .map_err(|_| anyhow::anyhow!("HTTP_TIMEOUT_SECS must be a valid u64"))?,
            ),
            trigger_jwt_secret: var("TRIGGER_JWT_SECRET"),
        })
    }

    /// The messaging service account, or a configuration error if it is missing.
    pub fn service_account(&self) -> Result<&ServiceAccountKey, AppError> {
        self.service_account.as_ref().ok_or_else(|| {
            AppError::Configuration("GOOGLE_SERVICE_ACCOUNT is not set".to_string())
        })
    }

    /// Select the user store backend. `DATABASE_URL` wins over the REST store.
    pub fn store_backend(&self) -> Result<StoreBackend, AppError> {
        if let Some(database_url) = &self.database_url {
            return Ok(StoreBackend::Postgres {
                database_url: database_url.clone(),
                max_connections: self.db_max_connections,
            });
        }

        match (&self.store_url, &self.store_service_key) {
            (Some(base_url), Some(service_key)) => Ok(StoreBackend::Rest {
                base_url: base_url.clone(),
                service_key: service_key.clone(),
            }),
            (None, _) => Err(AppError::Configuration(
                "STORE_URL (or DATABASE_URL) is not set".to_string(),
            )),
            (Some(_), None) => Err(AppError::Configuration(
                "STORE_SERVICE_KEY is not set".to_string(),
            )),
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("store_url", &self.store_url)
            .field("has_store_service_key", &self.store_service_key.is_some())
            .field("has_database_url", &self.database_url.is_some())
            .field("db_max_connections", &self.db_max_connections)
            .field("service_account", &self.service_account)
            .field("fcm_base_url", &self.fcm_base_url)
            .field("inactivity_threshold", &self.inactivity_threshold)
            .field("dispatch_concurrency", &self.dispatch_concurrency)
            .field("batch_deadline", &self.batch_deadline)
            .field("http_timeout", &self.http_timeout)
            .field("has_trigger_jwt_secret", &self.trigger_jwt_secret.is_some())
            .finish()
    }
}
