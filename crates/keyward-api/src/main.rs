//! Keyward API Server
//!
//! Loads configuration, wires the stores into the token engine and serves
//! the REST API.

use anyhow::Context;
use keyward_api::{create_router, state::AppState};
use keyward_core::{AppConfig, AuthEngine};
use keyward_store::{PgStore, RedisRevocationStore};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn load_config() -> anyhow::Result<AppConfig> {
    let config = match std::env::var("KEYWARD_CONFIG") {
        Ok(path) => AppConfig::from_file(&path)
            .with_context(|| format!("loading config from {path}"))?
            .with_env_override()?,
        Err(_) => AppConfig::from_env()?,
    };
    Ok(config)
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=info", config.logging.level)));

    if config.logging.json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn build_engine(config: &AppConfig) -> anyhow::Result<AuthEngine> {
    let in_memory = std::env::var("KEYWARD_IN_MEMORY")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    if in_memory {
        tracing::warn!("Running with in-memory stores; data is lost on restart");
        return Ok(AuthEngine::in_memory(config)?);
    }

    let store = Arc::new(
        PgStore::connect(&config.database)
            .await
            .context("connecting to PostgreSQL")?,
    );
    let revocations = Arc::new(
        RedisRevocationStore::connect(&config.cache)
            .await
            .context("connecting to Redis")?,
    );

    Ok(AuthEngine::new(config, store.clone(), store, revocations)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_tracing(&config);

    let engine = build_engine(&config).await?;
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let state = Arc::new(AppState::new(config, Arc::new(engine)));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Keyward API Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);
    tracing::info!("OpenAPI document at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
