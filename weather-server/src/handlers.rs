//! HTTP handlers for the forwarding endpoint.

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use serde::Deserialize;
use tracing::{info, warn};
use weather_core::{Query as WeatherQuery, Resource};

use super::error::ForwardError;
use super::state::AppState;

/// Raw query string of `GET /api/weather`.
#[derive(Debug, Default, Deserialize)]
pub struct WeatherParams {
    pub city: Option<String>,
    pub lat: Option<String>,
    pub lon: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl WeatherParams {
    /// City wins over coordinates; empty or unparseable values count as absent.
    pub fn query(&self) -> Option<WeatherQuery> {
        if let Some(city) = self.city.as_deref().filter(|c| !c.is_empty()) {
            return Some(WeatherQuery::city(city));
        }

        let lat = parse_coordinate(self.lat.as_deref())?;
        let lon = parse_coordinate(self.lon.as_deref())?;
        Some(WeatherQuery::coordinates(lat, lon))
    }

    pub fn resource(&self) -> Resource {
        Resource::from_param(self.kind.as_deref())
    }
}

fn parse_coordinate(value: Option<&str>) -> Option<f64> {
    value?.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// GET /health
pub async fn health_check() -> &'static str {
    "ok"
}

/// GET /api/weather?city=..|lat=..&lon=..&type=weather|forecast
///
/// Returns the provider's JSON body verbatim on success.
pub async fn get_weather(
    State(state): State<AppState>,
    params: Result<Query<WeatherParams>, QueryRejection>,
) -> Result<Json<serde_json::Value>, ForwardError> {
    let Query(params) = params.map_err(|rejection| {
        warn!(%rejection, "unreadable query string");
        ForwardError::Internal
    })?;

    let query = params.query().ok_or(ForwardError::MissingQuery)?;
    let upstream = state.upstream.as_ref().ok_or(ForwardError::Configuration)?;
    let resource = params.resource();

    info!(%query, %resource, "forwarding");
    let body = upstream.forward(&query, resource).await?;

    Ok(Json(body))
}
