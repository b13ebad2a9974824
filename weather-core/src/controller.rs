//! Page controller: a pure reducer from events to view states.
//!
//! Every input (startup, search, location, fetch completion) is an [`Event`];
//! [`reduce`] turns the current [`ViewState`] and one event into the next state
//! plus the side effects to run. Running them is the job of
//! [`crate::dashboard::Dashboard`].

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    ForecastSeries, Query, QueryKey, WeatherError, WeatherSnapshot,
    geolocation::{Coordinates, GeolocationState, LocationError, default_query},
    query::validate_city,
    store::parse_record,
};

#[derive(Debug, Clone)]
pub enum Event {
    /// Session start. `preloaded` is a query known before startup (e.g. given
    /// on the command line); `stored_raw` is the raw persisted record.
    Started {
        preloaded: Option<Query>,
        stored_raw: Option<String>,
    },
    SearchSubmitted(String),
    QueryChanged(Query),
    LocationRequested,
    GeolocationResolved(Result<Coordinates, LocationError>),
    FetchSucceeded {
        key: QueryKey,
        snapshot: Arc<WeatherSnapshot>,
    },
    FetchFailed {
        key: QueryKey,
        error: WeatherError,
    },
    ForecastSucceeded {
        key: QueryKey,
        forecast: Arc<ForecastSeries>,
    },
    ForecastFailed {
        key: QueryKey,
        error: WeatherError,
    },
    ErrorDismissed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Fetch current conditions and forecast for the query.
    Fetch(Query),
    Locate,
    /// Record the snapshot just accepted for the current query.
    Persist {
        query: Query,
        snapshot: Arc<WeatherSnapshot>,
    },
}

/// Immutable snapshot of everything the page renders.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub current_query: Option<Query>,
    /// Latest query the user asked for, kept in memory only.
    pub last_query: Option<Query>,
    /// Last good snapshot; survives later loading and error states.
    pub snapshot: Option<Arc<WeatherSnapshot>>,
    pub forecast: Option<Arc<ForecastSeries>>,
    pub is_initializing: bool,
    pub is_fetching: bool,
    pub is_forecast_loading: bool,
    pub location_error: bool,
    pub geolocation: GeolocationState,
    /// Dismissible error notification.
    pub error: Option<String>,
    pub validation_message: Option<String>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            current_query: None,
            last_query: None,
            snapshot: None,
            forecast: None,
            is_initializing: true,
            is_fetching: false,
            is_forecast_loading: false,
            location_error: false,
            geolocation: GeolocationState::Idle,
            error: None,
            validation_message: None,
        }
    }
}

impl ViewState {
    /// Skeleton only while nothing can be shown in its place.
    pub fn show_loading(&self) -> bool {
        self.is_initializing || (self.is_fetching && self.snapshot.is_none())
    }

    /// Precipitation probability of the first forecast entry.
    pub fn rain_chance(&self) -> Option<f64> {
        self.forecast.as_ref()?.list.first().map(|e| e.pop)
    }

    fn is_current(&self, key: &QueryKey) -> bool {
        self.current_query.as_ref().is_some_and(|q| &q.key() == key)
    }
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub state: ViewState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn unchanged(state: &ViewState) -> Self {
        Self { state: state.clone(), effects: Vec::new() }
    }
}

pub fn reduce(state: &ViewState, event: Event) -> Transition {
    let mut next = state.clone();
    let mut effects = Vec::new();

    match event {
        Event::Started { preloaded, stored_raw } => {
            if !state.is_initializing
                || state.current_query.is_some()
                || state.geolocation.is_requesting()
            {
                debug!("startup already settled, ignoring");
                return Transition::unchanged(state);
            }

            if let Some(query) = preloaded {
                info!(%query, "starting with preloaded query");
                next.last_query = Some(query.clone());
                next.is_initializing = false;
                change_query(&mut next, &mut effects, query);
            } else if let Some(record) = stored_raw.as_deref().and_then(|raw| parse_record(raw).ok()) {
                info!(query = %record.query, "starting with stored query");
                next.last_query = Some(record.query.clone());
                next.is_initializing = false;
                change_query(&mut next, &mut effects, record.query);
            } else {
                info!("no stored query, requesting location");
                next.geolocation = GeolocationState::Requesting;
                effects.push(Effect::Locate);
            }
        }

        Event::SearchSubmitted(raw) => match validate_city(&raw) {
            Err(err) => next.validation_message = Some(err.to_string()),
            Ok(None) => next.validation_message = None,
            Ok(Some(city)) => {
                next.validation_message = None;
                let query = Query::city(city);
                next.last_query = Some(query.clone());
                change_query(&mut next, &mut effects, query);
            }
        },

        Event::QueryChanged(query) => {
            next.last_query = Some(query.clone());
            change_query(&mut next, &mut effects, query);
        }

        Event::LocationRequested => {
            if state.geolocation.is_requesting() {
                return Transition::unchanged(state);
            }
            next.geolocation = GeolocationState::Requesting;
            effects.push(Effect::Locate);
        }

        Event::GeolocationResolved(Ok(coords)) => {
            let query = Query::from(coords);
            next.geolocation = GeolocationState::Resolved(coords);
            next.location_error = false;
            next.is_initializing = false;
            next.last_query = Some(query.clone());
            change_query(&mut next, &mut effects, query);
        }

        Event::GeolocationResolved(Err(err)) => {
            warn!(error = %err, "location failed");
            next.geolocation = GeolocationState::Failed(err);
            next.location_error = true;
            if state.current_query.is_none() && state.last_query.is_none() {
                let query = default_query();
                info!(%query, "falling back to default query");
                next.last_query = Some(query.clone());
                change_query(&mut next, &mut effects, query);
            }
            next.is_initializing = false;
        }

        Event::FetchSucceeded { key, snapshot } => {
            if !state.is_current(&key) {
                debug!(?key, "dropping superseded snapshot");
                return Transition::unchanged(state);
            }
            if let Some(query) = &state.current_query {
                effects.push(Effect::Persist {
                    query: query.clone(),
                    snapshot: Arc::clone(&snapshot),
                });
            }
            next.snapshot = Some(snapshot);
            next.is_fetching = false;
        }

        Event::FetchFailed { key, error } => {
            if !state.is_current(&key) {
                debug!(?key, "dropping superseded failure");
                return Transition::unchanged(state);
            }
            warn!(error = %error, "weather fetch failed");
            next.is_fetching = false;
            next.error = Some(error.user_message());
        }

        Event::ForecastSucceeded { key, forecast } => {
            if !state.is_current(&key) {
                debug!(?key, "dropping superseded forecast");
                return Transition::unchanged(state);
            }
            next.forecast = Some(forecast);
            next.is_forecast_loading = false;
        }

        Event::ForecastFailed { key, error } => {
            if !state.is_current(&key) {
                return Transition::unchanged(state);
            }
            warn!(error = %error, "forecast fetch failed");
            next.is_forecast_loading = false;
        }

        Event::ErrorDismissed => next.error = None,
    }

    Transition { state: next, effects }
}

/// Adopt `query` as current. Displayed data is left alone until results arrive.
fn change_query(state: &mut ViewState, effects: &mut Vec<Effect>, query: Query) {
    state.current_query = Some(query.clone());
    if query.is_complete() {
        state.is_fetching = true;
        state.is_forecast_loading = true;
        effects.push(Effect::Fetch(query));
    } else {
        state.is_fetching = false;
        state.is_forecast_loading = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CachedQueryResult, model::fixtures};

    fn started(preloaded: Option<Query>, stored_raw: Option<String>) -> Transition {
        reduce(&ViewState::default(), Event::Started { preloaded, stored_raw })
    }

    fn stored(query: Query) -> String {
        serde_json::to_string(&CachedQueryResult::new(query, fixtures::snapshot("X", 1.0))).unwrap()
    }

    #[test]
    fn startup_prefers_preloaded_query() {
        let t = started(Some(Query::city("Paris")), Some(stored(Query::city("Oslo"))));

        assert_eq!(t.state.current_query, Some(Query::city("Paris")));
        assert!(!t.state.is_initializing);
        assert_eq!(t.effects, vec![Effect::Fetch(Query::city("Paris"))]);
    }

    #[test]
    fn startup_uses_stored_record() {
        let t = started(None, Some(stored(Query::coordinates(1.0, 2.0))));

        assert_eq!(t.state.current_query, Some(Query::coordinates(1.0, 2.0)));
        assert_eq!(t.state.last_query, Some(Query::coordinates(1.0, 2.0)));
        assert!(!t.state.is_initializing);
        assert_eq!(t.effects, vec![Effect::Fetch(Query::coordinates(1.0, 2.0))]);
    }

    #[test]
    fn startup_with_corrupt_record_requests_location() {
        let t = started(None, Some("{\"query\":".into()));

        assert_eq!(t.state.current_query, None);
        assert!(t.state.is_initializing);
        assert!(t.state.show_loading());
        assert_eq!(t.state.geolocation, GeolocationState::Requesting);
        assert_eq!(t.effects, vec![Effect::Locate]);
    }

    #[test]
    fn startup_is_not_reentered() {
        let t = started(Some(Query::city("Paris")), None);
        let again = reduce(
            &t.state,
            Event::Started { preloaded: Some(Query::city("Oslo")), stored_raw: None },
        );

        assert_eq!(again.state.current_query, Some(Query::city("Paris")));
        assert!(again.effects.is_empty());
    }

    #[test]
    fn startup_while_locating_is_not_reentered() {
        let t = started(None, None);
        assert_eq!(t.effects, vec![Effect::Locate]);

        let again = reduce(&t.state, Event::Started { preloaded: None, stored_raw: None });

        assert!(again.effects.is_empty());
        assert_eq!(again.state, t.state);
    }

    #[test]
    fn accepted_snapshot_is_persisted_for_current_query() {
        let t = started(Some(Query::city("Paris")), None);
        let paris = Arc::new(fixtures::snapshot("Paris", 20.0));
        let t = reduce(
            &t.state,
            Event::FetchSucceeded { key: Query::city("Paris").key(), snapshot: paris.clone() },
        );

        assert_eq!(
            t.effects,
            vec![Effect::Persist { query: Query::city("Paris"), snapshot: paris }]
        );
    }

    #[test]
    fn denied_location_without_prior_query_falls_back_to_jakarta() {
        let t = started(None, None);
        let t = reduce(&t.state, Event::GeolocationResolved(Err(LocationError::Denied)));

        assert_eq!(t.state.current_query, Some(Query::city("Jakarta")));
        assert!(t.state.location_error);
        assert!(!t.state.is_initializing);
        assert_eq!(t.effects, vec![Effect::Fetch(Query::city("Jakarta"))]);
    }

    #[test]
    fn denied_location_with_prior_query_keeps_it() {
        let t = started(Some(Query::city("Paris")), None);
        let t = reduce(&t.state, Event::LocationRequested);
        assert_eq!(t.effects, vec![Effect::Locate]);

        let t = reduce(
            &t.state,
            Event::GeolocationResolved(Err(LocationError::Unavailable("no fix".into()))),
        );

        assert_eq!(t.state.current_query, Some(Query::city("Paris")));
        assert!(t.state.location_error);
        assert!(t.effects.is_empty());
    }

    #[test]
    fn resolved_location_becomes_coordinate_query() {
        let t = started(None, None);
        let coords = Coordinates { lat: -6.2, lon: 106.8 };
        let t = reduce(&t.state, Event::GeolocationResolved(Ok(coords)));

        assert_eq!(t.state.current_query, Some(Query::coordinates(-6.2, 106.8)));
        assert_eq!(t.state.geolocation, GeolocationState::Resolved(coords));
        assert!(!t.state.location_error);
        assert!(!t.state.is_initializing);
        assert_eq!(t.effects, vec![Effect::Fetch(Query::coordinates(-6.2, 106.8))]);
    }

    #[test]
    fn repeated_location_request_while_pending_is_ignored() {
        let t = started(None, None);
        let t = reduce(&t.state, Event::LocationRequested);
        assert!(t.effects.is_empty());
    }

    #[test]
    fn invalid_search_sets_message_and_dispatches_nothing() {
        let t = started(Some(Query::city("Paris")), None);
        let t = reduce(&t.state, Event::SearchSubmitted("NY".into()));

        assert_eq!(
            t.state.validation_message.as_deref(),
            Some("City name must be at least 3 characters")
        );
        assert_eq!(t.state.current_query, Some(Query::city("Paris")));
        assert!(t.effects.is_empty());
    }

    #[test]
    fn empty_search_clears_message_and_dispatches_nothing() {
        let t = started(Some(Query::city("Paris")), None);
        let t = reduce(&t.state, Event::SearchSubmitted("NY".into()));
        let t = reduce(&t.state, Event::SearchSubmitted("   ".into()));

        assert_eq!(t.state.validation_message, None);
        assert!(t.effects.is_empty());
    }

    #[test]
    fn valid_search_replaces_query_and_keeps_snapshot() {
        let t = started(Some(Query::city("Paris")), None);
        let paris = Arc::new(fixtures::snapshot("Paris", 20.0));
        let t = reduce(
            &t.state,
            Event::FetchSucceeded { key: Query::city("Paris").key(), snapshot: paris.clone() },
        );

        let t = reduce(&t.state, Event::SearchSubmitted("  Oslo ".into()));

        assert_eq!(t.state.current_query, Some(Query::city("Oslo")));
        assert_eq!(t.state.last_query, Some(Query::city("Oslo")));
        assert_eq!(t.state.snapshot, Some(paris));
        assert!(t.state.is_fetching);
        assert!(!t.state.show_loading());
        assert_eq!(t.effects, vec![Effect::Fetch(Query::city("Oslo"))]);
    }

    #[test]
    fn superseded_result_is_dropped() {
        let t = started(Some(Query::city("Paris")), None);
        let t = reduce(&t.state, Event::SearchSubmitted("Oslo".into()));

        let late = reduce(
            &t.state,
            Event::FetchSucceeded {
                key: Query::city("Paris").key(),
                snapshot: Arc::new(fixtures::snapshot("Paris", 20.0)),
            },
        );
        assert_eq!(late.state.snapshot, None);
        assert!(late.state.is_fetching);
        assert!(late.effects.is_empty());

        let late = reduce(
            &late.state,
            Event::FetchFailed {
                key: Query::city("Paris").key(),
                error: WeatherError::transport(Some(500), None, None),
            },
        );
        assert_eq!(late.state.error, None);
    }

    #[test]
    fn failure_shows_notification_and_keeps_snapshot() {
        let t = started(Some(Query::city("Paris")), None);
        let paris = Arc::new(fixtures::snapshot("Paris", 20.0));
        let t = reduce(
            &t.state,
            Event::FetchSucceeded { key: Query::city("Paris").key(), snapshot: paris.clone() },
        );
        let t = reduce(&t.state, Event::SearchSubmitted("Atlantis".into()));
        let t = reduce(
            &t.state,
            Event::FetchFailed {
                key: Query::city("Atlantis").key(),
                error: WeatherError::transport(Some(404), Some("city not found".into()), None),
            },
        );

        assert_eq!(t.state.error.as_deref(), Some("city not found"));
        assert_eq!(t.state.snapshot, Some(paris));
        assert!(!t.state.is_fetching);

        let t = reduce(&t.state, Event::ErrorDismissed);
        assert_eq!(t.state.error, None);
    }

    #[test]
    fn failure_without_message_uses_fallback() {
        let t = started(Some(Query::city("Paris")), None);
        let t = reduce(
            &t.state,
            Event::FetchFailed {
                key: Query::city("Paris").key(),
                error: WeatherError::transport(None, None, None),
            },
        );

        assert_eq!(t.state.error.as_deref(), Some("Failed to fetch weather data"));
        assert!(!t.state.show_loading());
    }

    #[test]
    fn forecast_failure_is_silent() {
        let t = started(Some(Query::city("Paris")), None);
        let t = reduce(
            &t.state,
            Event::ForecastFailed {
                key: Query::city("Paris").key(),
                error: WeatherError::transport(Some(500), None, None),
            },
        );

        assert_eq!(t.state.error, None);
        assert!(!t.state.is_forecast_loading);
    }

    #[test]
    fn rain_chance_comes_from_first_forecast_entry() {
        let t = started(Some(Query::city("Paris")), None);
        assert_eq!(t.state.rain_chance(), None);

        let series = fixtures::series(
            "Paris",
            vec![
                fixtures::entry(1, "2023-12-01 09:00:00", 10.0, 0.35),
                fixtures::entry(2, "2023-12-01 12:00:00", 12.0, 0.9),
            ],
        );
        let t = reduce(
            &t.state,
            Event::ForecastSucceeded { key: Query::city("Paris").key(), forecast: Arc::new(series) },
        );

        assert_eq!(t.state.rain_chance(), Some(0.35));
    }

    #[test]
    fn incomplete_query_is_adopted_without_fetch() {
        let t = started(Some(Query::city("Paris")), None);
        let t = reduce(&t.state, Event::QueryChanged(Query::coordinates(f64::NAN, 0.0)));

        assert!(t.effects.is_empty());
        assert!(!t.state.is_fetching);
    }
}
