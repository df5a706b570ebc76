//! Wallet Service - Main Application Entry Point
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Open the store (PostgreSQL pool + migrations, or in-memory)
//! 3. Build HTTP router with routes and middleware
//! 4. Serve until SIGINT/SIGTERM, then close the store

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use wallet_service::{
    app::{self, AppState, TransferSettings},
    config::Config,
    db,
    services::token_service::TokenIssuer,
    store::{MemoryStore, PgStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads RUST_LOG (defaults to "info")
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    let tokens = TokenIssuer::new(&config.jwt_secret, config.token_ttl_secs);
    let settings = TransferSettings {
        attempt_timeout: config.lock_timeout(),
        max_retries: config.transfer_max_retries,
    };

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    match &config.database_url {
        Some(database_url) => {
            let pool = db::create_pool(database_url, config.database_max_connections).await?;
            tracing::info!("Database pool created");

            db::run_migrations(&pool).await?;
            tracing::info!("Database migrations complete");

            let store = Arc::new(PgStore::new(pool, config.lock_timeout()));
            let app = app::create_app(AppState::new(store.clone(), tokens, settings));

            tracing::info!("Server listening on {} (postgres store)", addr);
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            store.pool().close().await;
            tracing::info!("Database pool closed");
        }
        None => {
            tracing::warn!("DATABASE_URL not set; balances live in memory and are lost on exit");

            let store = Arc::new(MemoryStore::new());
            let app = app::create_app(AppState::new(store, tokens, settings));

            tracing::info!("Server listening on {} (memory store)", addr);
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
    }

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {}", e);
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

    tracing::info!("Shutdown signal received");
}
