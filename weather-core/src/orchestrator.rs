use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

use crate::{
    CachedQueryResult, ForecastSeries, Query, WeatherError, WeatherSnapshot,
    cache::QueryCache,
    provider::WeatherSource,
    store::LastQueryStore,
};

/// Results younger than this are served from memory.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(10 * 60);

/// Sits between the page controller and the fetch functions.
///
/// Owns one [`QueryCache`] per resource and is the only writer of the
/// persisted last-query record. Fetching never writes the record; the caller
/// decides which result is current and hands it to [`Orchestrator::remember`].
#[derive(Debug)]
pub struct Orchestrator {
    source: Arc<dyn WeatherSource>,
    store: Arc<dyn LastQueryStore>,
    current: QueryCache<WeatherSnapshot>,
    forecast: QueryCache<ForecastSeries>,
}

impl Orchestrator {
    pub fn new(source: Arc<dyn WeatherSource>, store: Arc<dyn LastQueryStore>) -> Self {
        Self {
            source,
            store,
            current: QueryCache::new(DEFAULT_STALE_AFTER),
            forecast: QueryCache::new(DEFAULT_STALE_AFTER),
        }
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.current = QueryCache::new(stale_after);
        self.forecast = QueryCache::new(stale_after);
        self
    }

    pub fn store(&self) -> &Arc<dyn LastQueryStore> {
        &self.store
    }

    /// Fetching is suppressed for missing or incomplete queries.
    pub fn is_enabled(query: Option<&Query>) -> bool {
        query.is_some_and(Query::is_complete)
    }

    /// Current conditions for `query`; `Ok(None)` when the query is incomplete.
    pub async fn current(&self, query: &Query) -> Result<Option<Arc<WeatherSnapshot>>, WeatherError> {
        if !query.is_complete() {
            return Ok(None);
        }

        let source = Arc::clone(&self.source);
        let owned = query.clone();
        let snapshot = self
            .current
            .get_or_fetch(query.key(), move || async move {
                info!(query = %owned, "fetching current conditions");
                source.fetch_current(&owned).await
            })
            .await?;

        Ok(Some(snapshot))
    }

    /// Forecast for `query`; `Ok(None)` when the query is incomplete.
    pub async fn forecast(&self, query: &Query) -> Result<Option<Arc<ForecastSeries>>, WeatherError> {
        if !query.is_complete() {
            return Ok(None);
        }

        let source = Arc::clone(&self.source);
        let owned = query.clone();
        let series = self
            .forecast
            .get_or_fetch(query.key(), move || async move {
                info!(query = %owned, "fetching forecast");
                source.fetch_forecast(&owned).await
            })
            .await?;

        Ok(Some(series))
    }

    /// Last known snapshot for `query`, regardless of staleness.
    pub fn cached_current(&self, query: &Query) -> Option<Arc<WeatherSnapshot>> {
        self.current.peek(&query.key())
    }

    pub fn cached_forecast(&self, query: &Query) -> Option<Arc<ForecastSeries>> {
        self.forecast.peek(&query.key())
    }

    /// Overwrite the persisted record with the snapshot now on display.
    pub fn remember(&self, query: &Query, snapshot: &WeatherSnapshot) {
        let record = CachedQueryResult::new(query.clone(), snapshot.clone());
        if let Err(err) = self.store.save(&record) {
            warn!(error = %err, "failed to persist last search");
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::{
        collections::{HashMap, HashSet},
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use crate::{
        ForecastSeries, Query, WeatherError, WeatherSnapshot,
        model::fixtures,
        provider::WeatherSource,
    };

    /// Scripted source: per-city delay and failure, counting calls.
    #[derive(Debug, Default)]
    pub struct FakeSource {
        pub current_calls: AtomicUsize,
        pub forecast_calls: AtomicUsize,
        delays: Mutex<HashMap<String, Duration>>,
        failures: Mutex<HashMap<String, WeatherError>>,
        panics: Mutex<HashSet<String>>,
    }

    impl FakeSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn delay(self, city: &str, delay: Duration) -> Self {
            self.delays.lock().insert(city.to_string(), delay);
            self
        }

        pub fn fail(self, city: &str, err: WeatherError) -> Self {
            self.failures.lock().insert(city.to_string(), err);
            self
        }

        pub fn panic(self, city: &str) -> Self {
            self.panics.lock().insert(city.to_string());
            self
        }

        fn name(query: &Query) -> String {
            match query {
                Query::City { city } => city.clone(),
                Query::Coordinates { .. } => "Here".to_string(),
            }
        }

        async fn wait(&self, name: &str) -> Result<(), WeatherError> {
            let delay = self.delays.lock().get(name).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let panics = self.panics.lock().contains(name);
            if panics {
                panic!("scripted failure for {name}");
            }
            match self.failures.lock().get(name) {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl WeatherSource for FakeSource {
        async fn fetch_current(&self, query: &Query) -> Result<WeatherSnapshot, WeatherError> {
            self.current_calls.fetch_add(1, Ordering::SeqCst);
            let name = Self::name(query);
            self.wait(&name).await?;
            Ok(fixtures::snapshot(&name, 28.5))
        }

        async fn fetch_forecast(&self, query: &Query) -> Result<ForecastSeries, WeatherError> {
            self.forecast_calls.fetch_add(1, Ordering::SeqCst);
            let name = Self::name(query);
            self.wait(&name).await?;
            Ok(fixtures::series(
                &name,
                vec![
                    fixtures::entry(1_701_421_200, "2023-12-01 09:00:00", 24.0, 0.35),
                    fixtures::entry(1_701_432_000, "2023-12-01 12:00:00", 27.0, 0.1),
                ],
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeSource;
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::atomic::Ordering;

    fn orchestrator(source: FakeSource) -> (Orchestrator, Arc<FakeSource>, Arc<MemoryStore>) {
        let source = Arc::new(source);
        let store = Arc::new(MemoryStore::new());
        let orch = Orchestrator::new(source.clone(), store.clone());
        (orch, source, store)
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_query_within_window_hits_cache() {
        let (orch, source, _) = orchestrator(FakeSource::new());

        orch.current(&Query::city("Jakarta")).await.unwrap();
        tokio::time::advance(Duration::from_secs(9 * 60)).await;
        orch.current(&Query::city("Jakarta")).await.unwrap();

        assert_eq!(source.current_calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(2 * 60)).await;
        orch.current(&Query::city("Jakarta")).await.unwrap();
        assert_eq!(source.current_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn incomplete_query_is_never_dispatched() {
        let (orch, source, store) = orchestrator(FakeSource::new());

        assert!(orch.current(&Query::city("")).await.unwrap().is_none());
        assert!(orch.forecast(&Query::coordinates(f64::NAN, 1.0)).await.unwrap().is_none());

        assert_eq!(source.current_calls.load(Ordering::SeqCst), 0);
        assert_eq!(source.forecast_calls.load(Ordering::SeqCst), 0);
        assert!(store.load().is_none());
        assert!(!Orchestrator::is_enabled(None));
        assert!(!Orchestrator::is_enabled(Some(&Query::city(""))));
        assert!(Orchestrator::is_enabled(Some(&Query::city("Oslo"))));
    }

    #[tokio::test]
    async fn fetching_alone_does_not_persist() {
        let (orch, _, store) = orchestrator(FakeSource::new());

        orch.current(&Query::city("Jakarta")).await.unwrap();
        assert!(store.load().is_none());
    }

    #[tokio::test]
    async fn remember_overwrites_persisted_record() {
        let (orch, _, store) = orchestrator(FakeSource::new());

        let jakarta = orch.current(&Query::city("Jakarta")).await.unwrap().unwrap();
        orch.remember(&Query::city("Jakarta"), &jakarta);
        assert_eq!(store.load().unwrap().query, Query::city("Jakarta"));

        let here = Query::coordinates(-6.2, 106.8);
        let snapshot = orch.current(&here).await.unwrap().unwrap();
        orch.remember(&here, &snapshot);
        let record = store.load().unwrap();
        assert_eq!(record.query, here);
        assert_eq!(record.data.name, "Here");
    }

    #[tokio::test]
    async fn forecast_does_not_touch_store() {
        let (orch, source, store) = orchestrator(FakeSource::new());

        let series = orch.forecast(&Query::city("Jakarta")).await.unwrap().unwrap();
        assert_eq!(series.city.name, "Jakarta");
        assert_eq!(source.forecast_calls.load(Ordering::SeqCst), 1);
        assert!(store.load().is_none());
    }

    #[tokio::test]
    async fn failure_is_returned_and_keeps_store() {
        let source = FakeSource::new().fail(
            "Atlantis",
            WeatherError::transport(Some(404), Some("city not found".into()), None),
        );
        let (orch, _, store) = orchestrator(source);

        let jakarta = orch.current(&Query::city("Jakarta")).await.unwrap().unwrap();
        orch.remember(&Query::city("Jakarta"), &jakarta);
        let err = orch.current(&Query::city("Atlantis")).await.unwrap_err();

        assert_eq!(err.user_message(), "city not found");
        assert_eq!(store.load().unwrap().query, Query::city("Jakarta"));
        assert!(orch.cached_current(&Query::city("Jakarta")).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_requests_for_same_key_are_deduplicated() {
        let (orch, source, _) =
            orchestrator(FakeSource::new().delay("Lima", Duration::from_secs(2)));

        let q = Query::city("Lima");
        let (a, b) = tokio::join!(orch.current(&q), orch.current(&q));

        assert_eq!(a.unwrap().unwrap().name, "Lima");
        assert_eq!(b.unwrap().unwrap().name, "Lima");
        assert_eq!(source.current_calls.load(Ordering::SeqCst), 1);
    }
}
