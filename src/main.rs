//! Habit Enrichment Service
//!
//! Records sleep sessions and enriches them with habit metrics:
//! - Phase 1: the base session is persisted immediately
//! - Phase 2: steps, exercise time and daylight time are fetched
//!   concurrently and linked to the day's sessions in the background

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::info;

use api::{router, AppState};
use metric_provider::{HttpMetricSource, ProviderConfig};
use session_store::{SessionStore, StoreConfig};
use telemetry::init_tracing_from_env;
use worker::SessionPipeline;

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct AppConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    #[serde(default)]
    store: StoreConfig,

    #[serde(default)]
    provider: ProviderConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            store: StoreConfig::default(),
            provider: ProviderConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("Starting Habit Enrichment Service v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;

    info!(
        backend = ?config.store.backend,
        path = %config.store.path.display(),
        provider = %config.provider.base_url,
        "Loaded configuration"
    );

    let store = config.store.open().context("Failed to open session store")?;
    store.ping().await.context("Session store is not reachable")?;

    let source = Arc::new(
        HttpMetricSource::new(config.provider.clone())
            .context("Failed to create metric provider client")?,
    );

    let pipeline = Arc::new(SessionPipeline::new(store, source));
    let app = router(AppState::new(pipeline));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // In-flight enrichments are abandoned; their sessions stay saved and
    // unlinked until a backfill picks them up.
    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<AppConfig> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&AppConfig::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables, e.g. ENRICH__PROVIDER__BASE_URL
        .add_source(
            config::Environment::with_prefix("ENRICH")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
