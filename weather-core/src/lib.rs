//! Core library for the weather dashboard.
//!
//! This crate defines:
//! - The query model and its validation
//! - Fetch functions over the forwarding endpoint or OpenWeather directly
//! - The cached, de-duplicating orchestrator and the persisted last query
//! - Geolocation with a default-city fallback
//! - The page controller (reducer + async driver) and derived display values
//! - Configuration & credentials handling
//!
//! It is used by `weather-cli` and `weather-server`.

pub mod cache;
pub mod config;
pub mod controller;
pub mod dashboard;
pub mod error;
pub mod geolocation;
pub mod model;
pub mod orchestrator;
pub mod provider;
pub mod query;
pub mod store;
pub mod view;

pub use config::{Config, LocationConfig, LocationSource, ProviderConfig};
pub use controller::{Effect, Event, ViewState};
pub use dashboard::Dashboard;
pub use error::{TransportError, ValidationError, WeatherError};
pub use geolocation::{Coordinates, Geolocator, LocationError};
pub use model::{CachedQueryResult, ForecastEntry, ForecastSeries, WeatherSnapshot};
pub use orchestrator::Orchestrator;
pub use provider::{Resource, WeatherSource};
pub use query::{Query, QueryKey};
pub use store::{FileStore, LastQueryStore, MemoryStore};
