//! SiteVault API Server

use sitevault_api::{create_router, state::AppState};
use sitevault_core::{AppConfig, ConfigError, LoggingConfig};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "sitevault_api={level},tower_http={level},audit=info",
            level = logging.level
        ))
    });

    if logging.json_format {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Environment only, or a TOML file named by `SITEVAULT_CONFIG` with
/// environment overrides on top
fn load_config() -> Result<AppConfig, ConfigError> {
    match std::env::var("SITEVAULT_CONFIG") {
        Ok(path) => AppConfig::from_file(path)?.with_env_override(),
        Err(_) => AppConfig::from_env(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            // Tracing is configured from the config; fall back to stderr defaults
            init_tracing(&LoggingConfig::default());
            tracing::error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging);

    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);

    let state = Arc::new(AppState::connect(config).await?);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("SiteVault API Server starting on http://{}", addr);
    tracing::info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
