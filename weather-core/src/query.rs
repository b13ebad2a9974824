use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

pub const MIN_CITY_LEN: usize = 3;
pub const MAX_CITY_LEN: usize = 70;

/// What to fetch: a city name or a coordinate pair, never both.
///
/// Serialized untagged so the persisted form is `{"city": ".."}` or
/// `{"lat": .., "lon": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Query {
    City { city: String },
    Coordinates { lat: f64, lon: f64 },
}

impl Query {
    pub fn city(name: impl Into<String>) -> Self {
        Query::City { city: name.into() }
    }

    pub fn coordinates(lat: f64, lon: f64) -> Self {
        Query::Coordinates { lat, lon }
    }

    /// Only complete queries are ever dispatched.
    pub fn is_complete(&self) -> bool {
        match self {
            Query::City { city } => !city.is_empty(),
            Query::Coordinates { lat, lon } => lat.is_finite() && lon.is_finite(),
        }
    }

    pub fn key(&self) -> QueryKey {
        match self {
            Query::City { city } => QueryKey::City(city.clone()),
            Query::Coordinates { lat, lon } => QueryKey::Coordinates(lat.to_bits(), lon.to_bits()),
        }
    }

    /// Query-string pairs understood by both the forwarding endpoint and the provider
    /// (the provider wants `q` instead of `city`; see `provider::openweather`).
    pub fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            Query::City { city } => vec![("city", city.clone())],
            Query::Coordinates { lat, lon } => vec![("lat", lat.to_string()), ("lon", lon.to_string())],
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::City { city } => f.write_str(city),
            Query::Coordinates { lat, lon } => write!(f, "{lat:.4}, {lon:.4}"),
        }
    }
}

/// Hashable identity of a [`Query`]. Coordinates compare bitwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    City(String),
    Coordinates(u64, u64),
}

/// Validate a raw search box value.
///
/// Returns `Ok(None)` for blank input: no message, nothing to fetch.
pub fn validate_city(raw: &str) -> Result<Option<String>, ValidationError> {
    let trimmed = raw.trim();
    let len = trimmed.chars().count();

    if len == 0 {
        return Ok(None);
    }
    if len < MIN_CITY_LEN {
        return Err(ValidationError::TooShort { min: MIN_CITY_LEN });
    }
    if len > MAX_CITY_LEN {
        return Err(ValidationError::TooLong { max: MAX_CITY_LEN });
    }

    Ok(Some(trimmed.to_string()))
}
