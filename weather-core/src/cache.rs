//! Keyed result cache with a staleness window and in-flight de-duplication.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::panic::AssertUnwindSafe;
use parking_lot::Mutex;
use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};
use tokio::time::Instant;
use tracing::{debug, error};

use crate::{QueryKey, WeatherError};

pub type FetchResult<T> = Result<Arc<T>, WeatherError>;

type SharedFetch<T> = Shared<BoxFuture<'static, FetchResult<T>>>;

struct Entry<T> {
    value: Option<(Arc<T>, Instant)>,
    in_flight: Option<SharedFetch<T>>,
}

impl<T> Default for Entry<T> {
    fn default() -> Self {
        Self { value: None, in_flight: None }
    }
}

/// Results per [`QueryKey`].
///
/// A fresh value is served without calling the fetcher; otherwise callers for
/// the same key share one in-flight fetch. A failed fetch leaves the previous
/// value in place.
pub struct QueryCache<T> {
    stale_after: Duration,
    entries: Arc<Mutex<HashMap<QueryKey, Entry<T>>>>,
}

impl<T> std::fmt::Debug for QueryCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("stale_after", &self.stale_after)
            .field("keys", &self.entries.lock().len())
            .finish()
    }
}

impl<T: Send + Sync + 'static> QueryCache<T> {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            stale_after,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    /// Last successful value for `key`, fresh or not.
    pub fn peek(&self, key: &QueryKey) -> Option<Arc<T>> {
        self.entries
            .lock()
            .get(key)
            .and_then(|e| e.value.as_ref())
            .map(|(v, _)| Arc::clone(v))
    }

    pub fn is_fresh(&self, key: &QueryKey) -> bool {
        self.entries
            .lock()
            .get(key)
            .and_then(|e| e.value.as_ref())
            .is_some_and(|(_, at)| at.elapsed() < self.stale_after)
    }

    pub fn is_in_flight(&self, key: &QueryKey) -> bool {
        self.entries.lock().get(key).is_some_and(|e| e.in_flight.is_some())
    }

    /// Serve `key` from cache when fresh, else join or start a fetch.
    pub async fn get_or_fetch<F, Fut>(&self, key: QueryKey, fetch: F) -> FetchResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, WeatherError>> + Send + 'static,
    {
        let pending = {
            let mut entries = self.entries.lock();
            if !entries.contains_key(&key) {
                self.prune(&mut entries);
            }
            let entry = entries.entry(key.clone()).or_default();

            if let Some((value, fetched_at)) = &entry.value {
                if fetched_at.elapsed() < self.stale_after {
                    debug!(?key, "cache hit");
                    return Ok(Arc::clone(value));
                }
            }

            match entry.in_flight.clone() {
                Some(in_flight) => {
                    debug!(?key, "joining in-flight fetch");
                    in_flight
                }
                None => {
                    let shared = self.start(key, fetch());
                    entry.in_flight = Some(shared.clone());
                    shared
                }
            }
        };

        pending.await
    }

    /// Forget idle keys whose value has been stale for a whole window.
    fn prune(&self, entries: &mut HashMap<QueryKey, Entry<T>>) {
        let keep_for = self.stale_after.saturating_mul(2);
        entries.retain(|key, entry| {
            let keep = entry.in_flight.is_some()
                || entry.value.as_ref().is_some_and(|(_, at)| at.elapsed() < keep_for);
            if !keep {
                debug!(?key, "evicting idle entry");
            }
            keep
        });
    }

    /// Wrap a fetch so that whoever polls it first records the outcome.
    fn start<Fut>(&self, key: QueryKey, fut: Fut) -> SharedFetch<T>
    where
        Fut: Future<Output = Result<T, WeatherError>> + Send + 'static,
    {
        let entries = Arc::clone(&self.entries);

        async move {
            let result = match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(result) => result.map(Arc::new),
                Err(_) => {
                    error!(?key, "fetch panicked");
                    Err(WeatherError::aborted())
                }
            };

            let mut entries = entries.lock();
            if let Some(entry) = entries.get_mut(&key) {
                entry.in_flight = None;
                if let Ok(value) = &result {
                    entry.value = Some((Arc::clone(value), Instant::now()));
                }
            }

            result
        }
        .boxed()
        .shared()
    }
}
