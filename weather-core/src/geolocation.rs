//! Best-effort position lookup.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::{fmt::Debug, sync::Arc};
use thiserror::Error;
use tracing::debug;

use crate::{
    Config, Query,
    config::{DEFAULT_LOOKUP_URL, LocationSource},
};

/// Used when location fails and nothing else has been asked for yet.
pub const DEFAULT_CITY: &str = "Jakarta";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl From<Coordinates> for Query {
    fn from(c: Coordinates) -> Self {
        Query::coordinates(c.lat, c.lon)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocationError {
    #[error("Location permission denied")]
    Denied,

    #[error("Location unavailable: {0}")]
    Unavailable(String),
}

/// Idle → Requesting → Resolved | Failed
#[derive(Debug, Clone, PartialEq, Default)]
pub enum GeolocationState {
    #[default]
    Idle,
    Requesting,
    Resolved(Coordinates),
    Failed(LocationError),
}

impl GeolocationState {
    pub fn is_requesting(&self) -> bool {
        matches!(self, GeolocationState::Requesting)
    }
}

pub fn default_query() -> Query {
    Query::city(DEFAULT_CITY)
}

#[async_trait]
pub trait Geolocator: Send + Sync + Debug {
    async fn locate(&self) -> Result<Coordinates, LocationError>;
}

/// Always answers with the same position.
#[derive(Debug, Clone, Copy)]
pub struct FixedGeolocator(pub Coordinates);

#[async_trait]
impl Geolocator for FixedGeolocator {
    async fn locate(&self) -> Result<Coordinates, LocationError> {
        Ok(self.0)
    }
}

/// Location switched off; every request fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledGeolocator;

#[async_trait]
impl Geolocator for DisabledGeolocator {
    async fn locate(&self) -> Result<Coordinates, LocationError> {
        Err(LocationError::Denied)
    }
}

#[derive(Debug, Deserialize)]
struct IpLookupResponse {
    status: Option<String>,
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

/// Position from an ip-api.com style lookup service.
#[derive(Debug, Clone)]
pub struct IpGeolocator {
    url: String,
    http: Client,
}

impl IpGeolocator {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), http: Client::new() }
    }
}

#[async_trait]
impl Geolocator for IpGeolocator {
    async fn locate(&self) -> Result<Coordinates, LocationError> {
        debug!(url = %self.url, "looking up position");

        let res = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| LocationError::Unavailable(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            return Err(LocationError::Unavailable(format!("lookup returned {status}")));
        }

        let body: IpLookupResponse = res
            .json()
            .await
            .map_err(|e| LocationError::Unavailable(format!("unreadable lookup response: {e}")))?;

        if body.status.as_deref().is_some_and(|s| s != "success") {
            return Err(LocationError::Unavailable(
                body.message.unwrap_or_else(|| "lookup failed".to_string()),
            ));
        }

        match (body.lat, body.lon) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Ok(Coordinates { lat, lon }),
            _ => Err(LocationError::Unavailable("lookup returned no coordinates".to_string())),
        }
    }
}

/// Construct the geolocator selected by `[location]`.
pub fn geolocator_from_config(config: &Config) -> Arc<dyn Geolocator> {
    let location = &config.location;
    match location.source {
        LocationSource::Ip => Arc::new(IpGeolocator::new(
            location.lookup_url.clone().unwrap_or_else(|| DEFAULT_LOOKUP_URL.to_string()),
        )),
        LocationSource::Fixed => match (location.lat, location.lon) {
            (Some(lat), Some(lon)) => Arc::new(FixedGeolocator(Coordinates { lat, lon })),
            _ => Arc::new(DisabledGeolocator),
        },
        LocationSource::Off => Arc::new(DisabledGeolocator),
    }
}
