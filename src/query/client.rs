//! Process-wide query cache.
//!
//! Each key holds the last value fetched for it, the last error, and at most
//! one in-flight request. Callers that ask for a key while a request is
//! outstanding attach to it instead of issuing their own, so responses for
//! one key can never race each other.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

use super::key::QueryKey;
use crate::api::ApiError;
use crate::config::QueryConfig;

type CachedValue = Arc<dyn Any + Send + Sync>;
type SharedFetch = Shared<BoxFuture<'static, Result<CachedValue, ApiError>>>;

/// Where a key is in its lifecycle.
///
/// `absent -> Loading -> {Populated, Error}`, `Populated -> Stale` on
/// invalidation or age, and back to `Loading` on the next read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
  Loading,
  Populated,
  Stale,
  Error,
}

#[derive(Debug, Clone)]
pub struct QueryOptions {
  /// How long fetched data is served without refetching
  pub stale_time: Duration,
  /// How long an unobserved entry is kept
  pub gc_time: Duration,
  /// Extra attempts after a failed read
  pub retry: u32,
  pub retry_delay: Duration,
}

impl Default for QueryOptions {
  fn default() -> Self {
    Self::from(&QueryConfig::default())
  }
}

impl From<&QueryConfig> for QueryOptions {
  fn from(config: &QueryConfig) -> Self {
    Self {
      stale_time: config.stale_time(),
      gc_time: config.gc_time(),
      retry: config.retry,
      retry_delay: config.retry_delay(),
    }
  }
}

struct InFlight {
  id: u64,
  /// Entry generation when the request started
  generation: u64,
  future: SharedFetch,
}

struct Entry {
  data: Option<CachedValue>,
  error: Option<ApiError>,
  updated_at: Option<Instant>,
  invalidated: bool,
  generation: u64,
  in_flight: Option<InFlight>,
  observers: usize,
  last_used: Instant,
}

impl Entry {
  fn new() -> Self {
    Self {
      data: None,
      error: None,
      updated_at: None,
      invalidated: false,
      generation: 0,
      in_flight: None,
      observers: 0,
      last_used: Instant::now(),
    }
  }

  fn is_fresh(&self, stale_time: Duration) -> bool {
    self.data.is_some()
      && !self.invalidated
      && self
        .updated_at
        .map(|t| t.elapsed() < stale_time)
        .unwrap_or(false)
  }

  fn status(&self, stale_time: Duration) -> Option<CacheStatus> {
    if self.in_flight.is_some() {
      Some(CacheStatus::Loading)
    } else if self.error.is_some() {
      Some(CacheStatus::Error)
    } else if self.data.is_some() {
      if self.is_fresh(stale_time) {
        Some(CacheStatus::Populated)
      } else {
        Some(CacheStatus::Stale)
      }
    } else {
      None
    }
  }
}

struct Inner {
  entries: Mutex<HashMap<QueryKey, Entry>>,
  options: QueryOptions,
  next_fetch_id: AtomicU64,
}

/// Handle to the shared query cache. Cloning is cheap; all clones share state.
#[derive(Clone)]
pub struct QueryClient {
  inner: Arc<Inner>,
}

impl QueryClient {
  pub fn new(options: QueryOptions) -> Self {
    Self {
      inner: Arc::new(Inner {
        entries: Mutex::new(HashMap::new()),
        options,
        next_fetch_id: AtomicU64::new(0),
      }),
    }
  }

  pub fn options(&self) -> &QueryOptions {
    &self.inner.options
  }

  fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
    // The map is left consistent at every unlock, so a poisoned lock is still usable
    self
      .inner
      .entries
      .lock()
      .unwrap_or_else(|e| e.into_inner())
  }

  /// Read `key`, fetching it if needed.
  ///
  /// 1. Fresh cached data is returned immediately
  /// 2. If a request for the key is in flight, wait for that one
  /// 3. Otherwise start a request with `fetcher`
  ///
  /// The result is stored under `key` whether or not anyone still reads it.
  pub async fn fetch_query<T, F, Fut>(&self, key: &QueryKey, fetcher: F) -> Result<Arc<T>, ApiError>
  where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    self
      .fetch_query_with(key, fetcher, self.inner.options.retry)
      .await
  }

  /// `fetch_query` with an explicit retry count.
  pub async fn fetch_query_with<T, F, Fut>(
    &self,
    key: &QueryKey,
    fetcher: F,
    retry: u32,
  ) -> Result<Arc<T>, ApiError>
  where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    let (fetch_id, future) = {
      let mut entries = self.entries();
      let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
      entry.last_used = Instant::now();

      if entry.is_fresh(self.inner.options.stale_time) {
        if let Some(data) = &entry.data {
          debug!(key = %key, "serving cached query");
          return downcast(key, data.clone());
        }
      }

      // A request started before the latest invalidation may carry pre-write
      // data; it is superseded rather than joined
      let joined = entry
        .in_flight
        .as_ref()
        .filter(|f| f.generation == entry.generation)
        .map(|f| (f.id, f.future.clone()));

      match joined {
        Some(joined) => {
          debug!(key = %key, "joining in-flight query");
          joined
        }
        None => {
          let id = self.inner.next_fetch_id.fetch_add(1, Ordering::Relaxed);
          let future = run_fetcher(
            key.clone(),
            fetcher,
            retry,
            self.inner.options.retry_delay,
          )
          .boxed()
          .shared();
          entry.in_flight = Some(InFlight {
            id,
            generation: entry.generation,
            future: future.clone(),
          });
          debug!(key = %key, "fetching query");
          (id, future)
        }
      }
    };

    let result = future.await;
    self.settle(key, fetch_id, &result);
    result.and_then(|value| downcast(key, value))
  }

  /// Record the outcome of a request. Only the first waiter does any work.
  fn settle(&self, key: &QueryKey, fetch_id: u64, result: &Result<CachedValue, ApiError>) {
    let mut entries = self.entries();
    let entry = match entries.get_mut(key) {
      Some(entry) => entry,
      None => return,
    };

    let started_generation = match &entry.in_flight {
      Some(f) if f.id == fetch_id => f.generation,
      _ => return,
    };
    entry.in_flight = None;

    match result {
      Ok(value) => {
        entry.data = Some(value.clone());
        entry.error = None;
        entry.updated_at = Some(Instant::now());
        // Invalidated while the request was out: the answer is already stale
        entry.invalidated = entry.generation != started_generation;
      }
      Err(e) => {
        debug!(key = %key, error = %e, "query failed");
        entry.error = Some(e.clone());
      }
    }
  }

  /// Last successfully fetched value, fresh or not.
  pub fn get_query_data<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
    let entries = self.entries();
    let data = entries.get(key)?.data.clone()?;
    data.downcast::<T>().ok()
  }

  /// Cached value only if it would be served without a refetch.
  pub fn fresh_query_data<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
    let entries = self.entries();
    let entry = entries.get(key)?;
    if !entry.is_fresh(self.inner.options.stale_time) {
      return None;
    }
    entry.data.clone()?.downcast::<T>().ok()
  }

  /// Replace the cached value for `key`, e.g. with the body of a write response.
  pub fn set_query_data<T: Send + Sync + 'static>(&self, key: &QueryKey, value: T) {
    let mut entries = self.entries();
    let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
    entry.data = Some(Arc::new(value));
    entry.error = None;
    entry.updated_at = Some(Instant::now());
    entry.invalidated = false;
    entry.last_used = Instant::now();
  }

  pub fn status(&self, key: &QueryKey) -> Option<CacheStatus> {
    self
      .entries()
      .get(key)
      .and_then(|e| e.status(self.inner.options.stale_time))
  }

  #[cfg(test)]
  pub(crate) fn error(&self, key: &QueryKey) -> Option<ApiError> {
    self.entries().get(key).and_then(|e| e.error.clone())
  }

  /// Mark every key starting with `prefix` stale. Returns how many matched.
  pub fn invalidate_queries(&self, prefix: &QueryKey) -> usize {
    let mut entries = self.entries();
    let mut matched = 0;
    for (key, entry) in entries.iter_mut() {
      if key.starts_with(prefix) {
        entry.invalidated = true;
        entry.generation += 1;
        matched += 1;
      }
    }
    debug!(prefix = %prefix, matched, "invalidated queries");
    matched
  }

  /// Mark exactly one key stale.
  pub fn invalidate_query(&self, key: &QueryKey) {
    if let Some(entry) = self.entries().get_mut(key) {
      entry.invalidated = true;
      entry.generation += 1;
    }
  }

  /// Forget everything (used on sign-out).
  pub fn clear(&self) {
    self.entries().clear();
  }

  pub(crate) fn observe(&self, key: &QueryKey) {
    let mut entries = self.entries();
    let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
    entry.observers += 1;
    entry.last_used = Instant::now();
  }

  pub(crate) fn unobserve(&self, key: &QueryKey) {
    if let Some(entry) = self.entries().get_mut(key) {
      entry.observers = entry.observers.saturating_sub(1);
      entry.last_used = Instant::now();
    }
  }

  /// Evict entries nobody observes, with no request in flight, idle past `gc_time`.
  pub fn collect_garbage(&self) -> usize {
    let gc_time = self.inner.options.gc_time;
    let mut entries = self.entries();
    let before = entries.len();
    entries.retain(|_, e| e.observers > 0 || e.in_flight.is_some() || e.last_used.elapsed() < gc_time);
    before - entries.len()
  }

  /// Run `collect_garbage` every `every` until the handle is aborted.
  pub fn spawn_gc(&self, every: Duration) -> tokio::task::JoinHandle<()> {
    let client = self.clone();
    tokio::spawn(async move {
      let mut ticker = tokio::time::interval(every);
      loop {
        ticker.tick().await;
        let evicted = client.collect_garbage();
        if evicted > 0 {
          debug!(evicted, "collected idle queries");
        }
      }
    })
  }

  #[cfg(test)]
  pub(crate) fn len(&self) -> usize {
    self.entries().len()
  }
}

async fn run_fetcher<T, F, Fut>(
  key: QueryKey,
  fetcher: F,
  retry: u32,
  retry_delay: Duration,
) -> Result<CachedValue, ApiError>
where
  T: Send + Sync + 'static,
  F: Fn() -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
{
  let mut attempt = 0;
  loop {
    match fetcher().await {
      Ok(value) => return Ok(Arc::new(value) as CachedValue),
      // A rejected session will not fix itself by asking again
      Err(e) if attempt < retry && !e.is_unauthorized() => {
        attempt += 1;
        debug!(key = %key, attempt, error = %e, "retrying query");
        tokio::time::sleep(retry_delay).await;
      }
      Err(e) => return Err(e),
    }
  }
}

fn downcast<T: Send + Sync + 'static>(key: &QueryKey, value: CachedValue) -> Result<Arc<T>, ApiError> {
  value
    .downcast::<T>()
    .map_err(|_| ApiError::Decode(format!("cached value for {} has a different type", key)))
}
