use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

use crate::{
    Config, ForecastSeries, Query, WeatherError, WeatherSnapshot,
    provider::{endpoint::EndpointClient, openweather::OpenWeatherClient},
};

pub mod endpoint;
pub mod openweather;

/// Which provider resource a request targets (`type` on the forwarding endpoint).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Weather,
    Forecast,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Weather => "weather",
            Resource::Forecast => "forecast",
        }
    }

    /// Anything other than `forecast` means current conditions.
    pub fn from_param(value: Option<&str>) -> Self {
        match value {
            Some("forecast") => Resource::Forecast,
            _ => Resource::Weather,
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two remote read operations. Implementations neither retry nor cache.
#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    async fn fetch_current(&self, query: &Query) -> Result<WeatherSnapshot, WeatherError>;

    async fn fetch_forecast(&self, query: &Query) -> Result<ForecastSeries, WeatherError>;
}

/// Construct the fetch layer from config.
///
/// `direct` talks to OpenWeather with the local API key instead of going
/// through the forwarding endpoint.
pub fn source_from_config(config: &Config, direct: bool) -> anyhow::Result<Arc<dyn WeatherSource>> {
    if !direct {
        return Ok(Arc::new(EndpointClient::new(config.endpoint_url())));
    }

    direct_source(config, config.api_key())
}

fn direct_source(config: &Config, api_key: Option<String>) -> anyhow::Result<Arc<dyn WeatherSource>> {
    let api_key = api_key.ok_or_else(|| {
        WeatherError::Configuration(
            "No OpenWeather API key configured for direct mode.\n\
             Hint: run `weather configure` or set OPENWEATHER_API_KEY."
                .to_string(),
        )
    })?;

    let client = OpenWeatherClient::with_base_url(api_key, config.provider_base_url());
    Ok(Arc::new(client))
}
