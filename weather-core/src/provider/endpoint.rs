use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use tracing::debug;

use crate::{
    ForecastSeries, Query, WeatherError, WeatherSnapshot,
    provider::{Resource, WeatherSource},
};

pub const DEFAULT_ENDPOINT_URL: &str = "http://127.0.0.1:3000";

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Client of the forwarding endpoint (`GET /api/weather`).
#[derive(Debug, Clone)]
pub struct EndpointClient {
    base_url: String,
    http: Client,
}

impl EndpointClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    async fn get<T: DeserializeOwned>(&self, query: &Query, resource: Resource) -> Result<T, WeatherError> {
        let url = format!("{}/api/weather", self.base_url);

        let mut params = query.params();
        params.push(("type", resource.as_str().to_string()));

        debug!(%resource, %query, "requesting forwarding endpoint");

        let res = self.http.get(&url).query(&params).send().await.map_err(|e| {
            WeatherError::transport(None, None, Some(format!("Failed to reach weather endpoint: {e}")))
        })?;

        let status = res.status();
        let body = res.text().await.map_err(|e| {
            WeatherError::transport(
                Some(status.as_u16()),
                None,
                Some(format!("Failed to read {resource} response body: {e}")),
            )
        })?;

        if !status.is_success() {
            let upstream = serde_json::from_str::<ErrorBody>(&body).ok().and_then(|b| b.error);
            return Err(WeatherError::transport(
                Some(status.as_u16()),
                upstream,
                Some(format!("Request failed with status code {}", status.as_u16())),
            ));
        }

        serde_json::from_str(&body).map_err(|e| {
            WeatherError::transport(
                Some(status.as_u16()),
                None,
                Some(format!("Failed to parse {resource} response: {e}")),
            )
        })
    }
}

#[async_trait]
impl WeatherSource for EndpointClient {
    async fn fetch_current(&self, query: &Query) -> Result<WeatherSnapshot, WeatherError> {
        self.get(query, Resource::Weather).await
    }

    async fn fetch_forecast(&self, query: &Query) -> Result<ForecastSeries, WeatherError> {
        self.get(query, Resource::Forecast).await
    }
}
