//! Courier server binary.

use anyhow::{Context, Result};
use clap::Parser;
use courier_cache::ResponseCache;
use courier_core::config::AppConfig;
use courier_server::{AppState, Notifier, create_router};
use courier_storage::ObjectStore;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Courier - an application release catalog and update server
#[derive(Parser, Debug)]
#[command(name = "courierd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "COURIER_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Courier v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration (file is optional, env vars can provide/override everything)
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    let has_config_file = config_path.exists();

    if has_config_file {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("No config file found at {}", args.config);
    }

    let has_env_config =
        std::env::vars().any(|(key, _)| key.starts_with("COURIER_") && key != "COURIER_CONFIG");

    if !has_config_file && !has_env_config {
        anyhow::bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: courierd --config /path/to/config.toml\n  \
             2. Environment variables: COURIER_SERVER__BIND=0.0.0.0:9000 \
             COURIER_AUTH__API_KEY=... COURIER_AUTH__JWT_SECRET=... courierd\n\n\
             Set COURIER_CONFIG to specify a default config file path."
        );
    }

    if !has_config_file {
        tracing::info!("Using environment variables for configuration");
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("COURIER_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    // Initialize storage backend
    let storage = courier_storage::from_config(&config.storage)
        .await
        .context("failed to initialize storage")?;
    tracing::info!(backend = storage.backend_name(), "Storage backend initialized");

    // Verify storage connectivity before accepting requests
    storage
        .health_check()
        .await
        .context("storage health check failed")?;
    tracing::info!("Storage backend connectivity verified");

    // Initialize metadata store
    let metadata = courier_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")?;
    tracing::info!("Metadata store initialized");

    // Initialize the response cache if configured
    let cache = courier_cache::from_config(&config.cache)
        .await
        .context("failed to initialize response cache")?;
    match &cache {
        Some(cache) => {
            cache
                .health_check()
                .await
                .context("cache health check failed")?;
            tracing::info!(backend = cache.backend_name(), "Response cache initialized");
        }
        None => tracing::info!("Response cache disabled"),
    }

    // Spawn the notification worker if configured
    let notifier = Notifier::spawn(&config.notify);

    // Create application state and router
    let state = AppState::new(config.clone(), storage, metadata, cache, notifier);
    let app = create_router(state);

    // Parse bind address
    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
