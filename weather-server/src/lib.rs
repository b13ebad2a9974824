//! Forwarding endpoint between the dashboard and OpenWeather.
//!
//! Exposes `GET /api/weather`, which validates the query, attaches the
//! server-side API key and relays the provider's JSON (or its error) back.

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::create_router;
pub use state::AppState;
