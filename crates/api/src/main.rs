//! Idle Nudge API server binary entrypoint.

use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use nudge_common::config::AppConfig;

use nudge_api::routes::create_router;
use nudge_api::state::AppState;

/// Trigger payloads are tiny; anything larger is rejected before parsing.
const MAX_BODY_BYTES: usize = 64 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("nudge_api=debug,nudge_engine=debug,nudge_notifier=debug,tower_http=debug")
    });
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!("Starting Idle Nudge API server...");

    // Load configuration
    let config = AppConfig::from_env()?;
    tracing::debug!(?config, "Configuration loaded");
    let addr = config.bind_addr;

    // Build application state
    let state = AppState::new(config);

    // Build router
    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES));

    // Start server
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
