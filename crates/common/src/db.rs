use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Create a PostgreSQL connection pool for the user store.
///
/// `max_connections` comes from `AppConfig::db_max_connections` (default 5).
/// The pool connects lazily, so a database that is down surfaces as a
/// per-request store error instead of a start-up failure.
pub fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect_lazy(database_url)?;

    tracing::info!(max_connections, "PostgreSQL pool configured");
    Ok(pool)
}
