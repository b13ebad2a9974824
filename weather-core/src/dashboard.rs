use std::{future::Future, sync::Arc};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error};

use crate::{
    Query, WeatherError,
    controller::{Effect, Event, Transition, ViewState, reduce},
    geolocation::{Geolocator, LocationError},
    orchestrator::Orchestrator,
};

/// Runs the page controller.
///
/// Effects from [`reduce`] are spawned as tasks; their completions come back
/// through one channel and are reduced in arrival order. Each new
/// [`ViewState`] is published to [`Dashboard::subscribe`] receivers.
pub struct Dashboard {
    orchestrator: Arc<Orchestrator>,
    geolocator: Arc<dyn Geolocator>,
    state: ViewState,
    events_tx: mpsc::UnboundedSender<Option<Event>>,
    events_rx: mpsc::UnboundedReceiver<Option<Event>>,
    view_tx: watch::Sender<ViewState>,
    outstanding: usize,
}

impl Dashboard {
    pub fn new(orchestrator: Arc<Orchestrator>, geolocator: Arc<dyn Geolocator>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let state = ViewState::default();
        let (view_tx, _) = watch::channel(state.clone());

        Self {
            orchestrator,
            geolocator,
            state,
            events_tx,
            events_rx,
            view_tx,
            outstanding: 0,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.view_tx.subscribe()
    }

    /// Resolve the initial query: `preloaded`, then the stored record, then location.
    pub fn start(&mut self, preloaded: Option<Query>) {
        let stored_raw = self.orchestrator.store().load_raw();
        self.dispatch(Event::Started { preloaded, stored_raw });
    }

    pub fn search(&mut self, raw: &str) {
        self.dispatch(Event::SearchSubmitted(raw.to_string()));
    }

    pub fn locate(&mut self) {
        self.dispatch(Event::LocationRequested);
    }

    pub fn dismiss_error(&mut self) {
        self.dispatch(Event::ErrorDismissed);
    }

    pub fn dispatch(&mut self, event: Event) {
        let Transition { state, effects } = reduce(&self.state, event);
        self.state = state;
        self.view_tx.send_replace(self.state.clone());

        for effect in effects {
            self.run(effect);
        }
    }

    /// Number of spawned effects whose completion has not been reduced yet.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Wait for the next completion and reduce it (disabled fetches report
    /// nothing). Returns `false` when nothing is outstanding.
    pub async fn next(&mut self) -> bool {
        if self.outstanding == 0 {
            return false;
        }

        // the sender half lives in `self`, so the channel never closes here
        let Some(completion) = self.events_rx.recv().await else {
            return false;
        };
        self.outstanding -= 1;
        if let Some(event) = completion {
            self.dispatch(event);
        }
        true
    }

    /// Reduce completions until every effect, including follow-ups, has finished.
    pub async fn settle(&mut self) {
        while self.next().await {}
    }

    fn run(&mut self, effect: Effect) {
        match effect {
            Effect::Fetch(query) => {
                debug!(%query, "dispatching fetches");
                self.spawn_current(query.clone());
                self.spawn_forecast(query);
            }
            Effect::Locate => {
                let geolocator = Arc::clone(&self.geolocator);
                let aborted = Event::GeolocationResolved(Err(LocationError::Unavailable(
                    "location lookup aborted".to_string(),
                )));
                self.spawn(
                    async move { Some(Event::GeolocationResolved(geolocator.locate().await)) },
                    aborted,
                );
            }
            Effect::Persist { query, snapshot } => self.orchestrator.remember(&query, &snapshot),
        }
    }

    fn spawn_current(&mut self, query: Query) {
        let orchestrator = Arc::clone(&self.orchestrator);
        let key = query.key();
        let aborted = Event::FetchFailed { key: key.clone(), error: WeatherError::aborted() };
        self.spawn(
            async move {
                match orchestrator.current(&query).await {
                    Ok(Some(snapshot)) => Some(Event::FetchSucceeded { key, snapshot }),
                    Ok(None) => None,
                    Err(error) => Some(Event::FetchFailed { key, error }),
                }
            },
            aborted,
        );
    }

    fn spawn_forecast(&mut self, query: Query) {
        let orchestrator = Arc::clone(&self.orchestrator);
        let key = query.key();
        let aborted = Event::ForecastFailed { key: key.clone(), error: WeatherError::aborted() };
        self.spawn(
            async move {
                match orchestrator.forecast(&query).await {
                    Ok(Some(forecast)) => Some(Event::ForecastSucceeded { key, forecast }),
                    Ok(None) => None,
                    Err(error) => Some(Event::ForecastFailed { key, error }),
                }
            },
            aborted,
        );
    }

    /// Run `task` and report its completion. A task that panics or is
    /// cancelled reports `aborted` instead, so `outstanding` always drains.
    fn spawn<F>(&mut self, task: F, aborted: Event)
    where
        F: Future<Output = Option<Event>> + Send + 'static,
    {
        self.outstanding += 1;
        let tx = self.events_tx.clone();
        let handle = tokio::spawn(task);
        tokio::spawn(async move {
            let completion = match handle.await {
                Ok(completion) => completion,
                Err(err) => {
                    error!(error = %err, "effect task did not complete");
                    Some(aborted)
                }
            };
            // receiver dropped means the dashboard is gone; nothing to report to
            let _ = tx.send(completion);
        });
    }
}
