//! Application state for the HTTP server.

use std::sync::Arc;
use weather_core::{Config, provider::openweather::OpenWeatherClient};

/// Shared application state passed to all handlers.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    /// `None` when no API key is configured; requests then fail with 500.
    pub upstream: Option<Arc<OpenWeatherClient>>,
}

impl AppState {
    pub fn new(upstream: Option<OpenWeatherClient>) -> Self {
        Self { upstream: upstream.map(Arc::new) }
    }

    pub fn from_config(config: &Config) -> Self {
        let upstream = config
            .api_key()
            .map(|key| OpenWeatherClient::with_base_url(key, config.provider_base_url()));
        Self::new(upstream)
    }
}
