//! Binary for the `weather-server` forwarding endpoint.
//!
//! # Environment Variables
//!
//! - `OPENWEATHER_API_KEY`: provider key (overrides the config file)
//! - `RUST_LOG`: log filter (default: info)

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use weather_core::Config;
use weather_server::{AppState, create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let config = Config::load()?;
    let state = AppState::from_config(&config);
    if state.upstream.is_none() {
        warn!("no OpenWeather API key configured; every request will fail with 500");
    }

    let app = create_router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("weather-server listening on http://{addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
