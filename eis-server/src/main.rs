//! EIS Server - dashboard API and SIMPUS webhook receiver.
//!
//! Loads configuration, opens the store, and serves the router until
//! SIGINT/SIGTERM.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use eis::auth::validate_role_table;
use eis::{router, AppState, Config, Store, TokenService, WebhookVerifier};

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("Failed to read .env");
        }
    }

    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    validate_role_table().context("Role table is inconsistent")?;

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        database_path = %config.database_path,
        production = config.is_production(),
        jwt_secret_configured = config.jwt_secret.is_some(),
        webhook_secret_configured = config.webhook_secret.is_some(),
        webhook_signature_max_age = config.webhook_signature_max_age,
        "config_loaded"
    );

    let jwt_secret = config.jwt_secret().context("Invalid session configuration")?;
    let tokens = TokenService::new(&jwt_secret).context("Invalid JWT_SECRET")?;

    let webhook_secret = config
        .webhook_secret()
        .context("Invalid webhook configuration")?;
    let webhook = WebhookVerifier::new(&webhook_secret, config.webhook_signature_max_age)
        .context("Invalid SIMPUS_WEBHOOK_SECRET")?;

    if !config.is_production() {
        warn!("running_in_development_mode");
    }

    let store = Store::open(&config.database_path).context("Failed to open database")?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = router(AppState::new(config, store, tokens, webhook));

    // Bind to address
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "ctrl_c_handler_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
