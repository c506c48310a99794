//! # hims-api: Binary Entry Point
//!
//! Starts the Axum HTTP server for the Health Insurance Management API.
//! Binds to `0.0.0.0:$PORT` (default 8000) and drains in-flight requests on
//! Ctrl+C or SIGTERM. SIGHUP reloads the tables from PostgreSQL, for data
//! installed by `hims seed` while the server runs.

use hims_api::state::{AppConfig, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env().map_err(|e| {
        tracing::error!("Invalid configuration: {e}");
        e
    })?;
    tracing::info!(?config, "configuration loaded");

    // Initialize database pool (absent means in-memory only).
    let db_pool = hims_api::db::init_pool(config.database_url.as_deref())
        .await
        .map_err(|e| {
            tracing::error!("Database initialization failed: {e}");
            e
        })?;

    let port = config.port;
    let state = AppState::with_pool(config, db_pool);

    // Hydrate in-memory tables from database (if connected).
    state.hydrate_from_db().await.map_err(|e| {
        tracing::error!("Database hydration failed: {e}");
        e
    })?;

    #[cfg(unix)]
    tokio::spawn(reload_on_hangup(state.clone()));

    let app = hims_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("HIMS API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HIMS API stopped");
    Ok(())
}

#[cfg(unix)]
async fn reload_on_hangup(state: AppState) {
    use tokio::signal::unix::{signal, SignalKind};
    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(sig) => sig,
        Err(e) => {
            tracing::error!("Failed to install SIGHUP handler: {e}");
            return;
        }
    };
    while hangup.recv().await.is_some() {
        tracing::info!("Received SIGHUP, reloading tables");
        if let Err(e) = state.hydrate_from_db().await {
            tracing::error!("Reload from database failed: {e}");
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
