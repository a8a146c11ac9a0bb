mod backend;
mod bot;
mod config;
mod data;
mod error;
mod i18n;
mod platform;
mod server;
mod webhook;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,gasbridge=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let state = Arc::new(AppState::new(config)?);

    info!("Configuration loaded successfully");
    info!("  Webhook mode: {}", state.config.webhook.mode);
    info!("  Backends: {}", state.pool_size());
    info!("  Secret: {}", if state.config.backend.secret.is_some() { "set" } else { "none" });
    info!("  Admin: {:?}", state.config.telegram.admin_id);

    if state.pool_size() == 0 {
        warn!("No backend configured; data requests will fail with 500");
    }
    if state.config.bot_token().is_none() {
        warn!("No bot token configured; interactive replies are disabled");
    }

    server::serve(state).await
}
