use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    ForecastSeries, Query, WeatherError, WeatherSnapshot,
    error::FALLBACK_MESSAGE,
    provider::{Resource, WeatherSource},
};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// Failure talking to OpenWeather.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    /// Provider answered with a non-success status.
    #[error("{message}")]
    Status { status: u16, message: String },

    /// No usable answer (connection failure, unreadable body).
    #[error("{0}")]
    Request(String),
}

#[derive(Debug, Deserialize)]
struct OwErrorBody {
    message: Option<String>,
}

/// Thin client for the provider's `weather` and `forecast` resources, metric units.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    /// Fetch a resource and return the provider's JSON body untouched.
    pub async fn forward(
        &self,
        query: &Query,
        resource: Resource,
    ) -> Result<serde_json::Value, UpstreamError> {
        let url = format!("{}/{}", self.base_url, resource.as_str());

        let mut params: Vec<(&str, String)> = vec![
            ("appid", self.api_key.clone()),
            ("units", "metric".to_string()),
        ];
        match query {
            Query::City { city } => params.push(("q", city.clone())),
            Query::Coordinates { lat, lon } => {
                params.push(("lat", lat.to_string()));
                params.push(("lon", lon.to_string()));
            }
        }

        debug!(%resource, %query, "requesting OpenWeather");

        let res = self
            .http
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| UpstreamError::Request(format!("Failed to send request to OpenWeather ({resource}): {e}")))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| UpstreamError::Request(format!("Failed to read OpenWeather {resource} response body: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<OwErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| FALLBACK_MESSAGE.to_string());

            warn!(
                %resource,
                status = status.as_u16(),
                body = %truncate_body(&body),
                "OpenWeather request failed"
            );

            return Err(UpstreamError::Status { status: status.as_u16(), message });
        }

        serde_json::from_str(&body)
            .map_err(|e| UpstreamError::Request(format!("Failed to parse OpenWeather {resource} JSON: {e}")))
    }

    async fn fetch_typed<T: DeserializeOwned>(&self, query: &Query, resource: Resource) -> Result<T, WeatherError> {
        let value = self.forward(query, resource).await.map_err(WeatherError::from)?;

        serde_json::from_value(value).map_err(|e| {
            WeatherError::transport(
                None,
                None,
                Some(format!("Unexpected OpenWeather {resource} payload: {e}")),
            )
        })
    }
}

impl From<UpstreamError> for WeatherError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Status { status, message } => {
                WeatherError::transport(Some(status), Some(message), None)
            }
            UpstreamError::Request(detail) => WeatherError::transport(None, None, Some(detail)),
        }
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherClient {
    async fn fetch_current(&self, query: &Query) -> Result<WeatherSnapshot, WeatherError> {
        self.fetch_typed(query, Resource::Weather).await
    }

    async fn fetch_forecast(&self, query: &Query) -> Result<ForecastSeries, WeatherError> {
        self.fetch_typed(query, Resource::Forecast).await
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn weather_body() -> serde_json::Value {
        serde_json::json!({
            "name": "Jakarta",
            "main": { "temp": 28, "humidity": 70, "feels_like": 30, "pressure": 1012 },
            "weather": [{ "main": "Clouds", "description": "scattered clouds", "icon": "03d" }],
            "wind": { "speed": 4.5, "deg": 214, "gust": 5.2 },
            "sys": { "country": "ID" },
            "dt": 1638360000
        })
    }

    #[tokio::test]
    async fn forwards_city_query_with_metric_units() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("q", "Jakarta"))
            .and(query_param("appid", "KEY"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(weather_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenWeatherClient::with_base_url("KEY".into(), server.uri());
        let body = client.forward(&Query::city("Jakarta"), Resource::Weather).await.unwrap();

        assert_eq!(body, weather_body());
    }

    #[tokio::test]
    async fn forwards_coordinates_to_forecast() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .and(query_param("lat", "51.5074"))
            .and(query_param("lon", "-0.1278"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "list": [],
                "city": { "name": "London" }
            })))
            .mount(&server)
            .await;

        let client = OpenWeatherClient::with_base_url("KEY".into(), server.uri());
        let series = client
            .fetch_forecast(&Query::coordinates(51.5074, -0.1278))
            .await
            .unwrap();

        assert_eq!(series.city.name, "London");
        assert!(series.list.is_empty());
    }

    #[tokio::test]
    async fn provider_error_message_and_status_are_kept() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(serde_json::json!({ "cod": "404", "message": "city not found" })),
            )
            .mount(&server)
            .await;

        let client = OpenWeatherClient::with_base_url("KEY".into(), server.uri());
        let err = client.forward(&Query::city("Atlantis"), Resource::Weather).await.unwrap_err();

        assert_eq!(
            err,
            UpstreamError::Status { status: 404, message: "city not found".into() }
        );

        let err = client.fetch_current(&Query::city("Atlantis")).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.user_message(), "city not found");
    }

    #[tokio::test]
    async fn non_json_error_body_falls_back_to_generic_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
            .mount(&server)
            .await;

        let client = OpenWeatherClient::with_base_url("KEY".into(), server.uri());
        let err = client.forward(&Query::city("Jakarta"), Resource::Weather).await.unwrap_err();

        assert_eq!(
            err,
            UpstreamError::Status { status: 502, message: FALLBACK_MESSAGE.into() }
        );
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "é".repeat(300);
        let cut = truncate_body(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 203);
        assert_eq!(truncate_body("short"), "short");
    }
}
