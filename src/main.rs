use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cache;
mod config;
mod error;
mod handlers;
mod metrics;
mod models;
mod provider;
mod rate_limit;
mod state;
mod store;

use config::Args;
use provider::OpenWeatherClient;
use state::AppState;
use store::{MemoryStore, RecordStore, SqliteStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "weather_gateway=info".into()),
        )
        .with_target(true)
        .init();

    let args = Args::parse();

    let store: Arc<dyn RecordStore> = match &args.database {
        Some(path) => Arc::new(
            SqliteStore::open(path)
                .with_context(|| format!("Failed to open database {}", path.display()))?,
        ),
        None => {
            tracing::warn!("No --database given, request history and cache are kept in memory");
            Arc::new(MemoryStore::new())
        }
    };

    for api_key in args.api_keys.iter().filter(|k| !k.trim().is_empty()) {
        let user = store
            .add_user(api_key.trim(), true)
            .await
            .context("Failed to provision API key")?;
        tracing::info!(user_id = user.id, enabled = user.enabled, "API key provisioned");
    }

    let provider = Arc::new(OpenWeatherClient::new(args.openweather_config())?);
    let state = Arc::new(AppState::new(
        store,
        provider,
        args.rate_limit_config(),
        args.cache_config(),
    ));

    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!("Weather gateway running on http://localhost:{}", args.port);
    tracing::info!("Forwarding to OpenWeatherMap at {}", args.openweather_url);
    tracing::info!("Cache freshness: {} minutes", args.cache_freshness);
    tracing::info!(
        "Rate limit: {} requests per {} minutes",
        args.rate_limit,
        args.rate_window
    );

    axum::serve(listener, app).await?;
    Ok(())
}
