//! A single view's subscription to one cached query.
//!
//! `Query<T>` pairs a key with the fetcher for it. The request itself goes
//! through the shared [`QueryClient`], so any number of views reading the
//! same key still cause at most one request.
//!
//! ```ignore
//! let api = api.clone();
//! let mut query = Query::new(queries.clone(), keys::housing_list(), move || {
//!   let api = api.clone();
//!   async move { api.listings(&ListingFilters::default()).await }
//! });
//!
//! query.fetch();
//! let result = query.resolve().await;
//! ```

use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::client::QueryClient;
use super::key::QueryKey;
use crate::api::ApiError;

/// The state of a query
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Query has not been started
  Idle,
  /// Query is currently fetching data
  Loading,
  /// Query completed successfully
  Success(T),
  /// Query failed with an error
  Error(ApiError),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&ApiError> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

/// What a view renders from.
#[derive(Debug, Clone)]
pub struct QueryResult<T> {
  /// Latest known value; kept across failed refetches
  pub data: Option<Arc<T>>,
  pub is_loading: bool,
  pub error: Option<ApiError>,
}

impl<T> QueryResult<T> {
  fn empty() -> Self {
    Self {
      data: None,
      is_loading: false,
      error: None,
    }
  }
}

/// A factory function that creates futures for fetching data
type FetcherFn<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, ApiError>> + Send + Sync>;

/// One view's handle on a cached query.
///
/// Registers as an observer of its key for as long as it lives, which keeps
/// the entry from being garbage collected.
pub struct Query<T> {
  client: QueryClient,
  key: QueryKey,
  fetcher: FetcherFn<T>,
  enabled: bool,
  retry: Option<u32>,
  state: QueryState<Arc<T>>,
  receiver: Option<mpsc::UnboundedReceiver<Result<Arc<T>, ApiError>>>,
}

impl<T: Send + Sync + 'static> Query<T> {
  pub fn new<F, Fut>(client: QueryClient, key: QueryKey, fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    client.observe(&key);
    Self {
      client,
      key,
      fetcher: Arc::new(move || fetcher().boxed()),
      enabled: true,
      retry: None,
      state: QueryState::Idle,
      receiver: None,
    }
  }

  /// A disabled query never issues a request and reports no data.
  pub fn enabled(mut self, enabled: bool) -> Self {
    self.enabled = enabled;
    self
  }

  /// Override the client's retry count for this query.
  pub fn retry(mut self, retry: u32) -> Self {
    self.retry = Some(retry);
    self
  }

  pub fn is_enabled(&self) -> bool {
    self.enabled
  }

  #[cfg(test)]
  pub(crate) fn state(&self) -> &QueryState<Arc<T>> {
    &self.state
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  /// Start fetching if enabled and not already loading.
  ///
  /// Fresh cached data is picked up without a request.
  pub fn fetch(&mut self) {
    if !self.enabled || self.state.is_loading() {
      return;
    }
    if let Some(data) = self.client.fresh_query_data::<T>(&self.key) {
      self.state = QueryState::Success(data);
      return;
    }
    self.start_fetch();
  }

  /// Discard the cached value for this key and fetch again.
  pub fn refetch(&mut self) {
    if !self.enabled {
      return;
    }
    self.receiver = None;
    self.client.invalidate_query(&self.key);
    self.start_fetch();
  }

  /// Wait for the pending fetch, if any, and return the result.
  pub async fn resolve(&mut self) -> QueryResult<T> {
    if let Some(receiver) = &mut self.receiver {
      let result = receiver.recv().await.unwrap_or_else(|| Err(cancelled()));
      self.finish(result);
    }
    self.result()
  }

  pub fn result(&self) -> QueryResult<T> {
    if !self.enabled {
      return QueryResult::empty();
    }
    QueryResult {
      data: self
        .client
        .get_query_data::<T>(&self.key)
        .or_else(|| self.state.data().cloned()),
      is_loading: self.state.is_loading(),
      error: self.state.error().cloned(),
    }
  }

  fn finish(&mut self, result: Result<Arc<T>, ApiError>) {
    self.receiver = None;
    self.state = match result {
      Ok(data) => QueryState::Success(data),
      Err(e) => QueryState::Error(e),
    };
  }

  fn start_fetch(&mut self) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.state = QueryState::Loading;

    let client = self.client.clone();
    let key = self.key.clone();
    let fetcher = self.fetcher.clone();
    let retry = self.retry.unwrap_or(client.options().retry);
    tokio::spawn(async move {
      let result = client.fetch_query_with(&key, move || fetcher(), retry).await;
      // Receiver may have been dropped; the cache still has the result
      let _ = tx.send(result);
    });
  }
}

fn cancelled() -> ApiError {
  ApiError::Transport("query was cancelled".to_string())
}

impl<T> Drop for Query<T> {
  fn drop(&mut self) {
    self.client.unobserve(&self.key);
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("key", &self.key)
      .field("enabled", &self.enabled)
      .field("state", &self.state)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::query::QueryOptions;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::Duration;

  fn client() -> QueryClient {
    QueryClient::new(QueryOptions {
      stale_time: Duration::from_secs(60),
      gc_time: Duration::from_secs(300),
      retry: 0,
      retry_delay: Duration::from_millis(1),
    })
  }

  fn counted(
    client: &QueryClient,
    key: QueryKey,
    calls: Arc<AtomicUsize>,
  ) -> Query<Vec<i32>> {
    Query::new(client.clone(), key, move || {
      let calls = calls.clone();
      async move {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![1, 2, 3])
      }
    })
  }

  #[tokio::test]
  async fn test_query_success() {
    let client = client();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut query = counted(&client, QueryKey::from(["feed", "posts"]), calls);

    assert!(matches!(query.state(), QueryState::Idle));

    query.fetch();
    assert!(query.is_loading());

    let result = query.resolve().await;

    assert!(matches!(query.state(), QueryState::Success(_)));
    assert_eq!(result.data.as_deref(), Some(&vec![1, 2, 3]));
    assert!(!result.is_loading);
  }

  #[tokio::test]
  async fn test_query_error() {
    let client = client();
    let mut query: Query<i32> = Query::new(client, QueryKey::from(["profile", "me"]), || async {
      Err(ApiError::Status {
        status: 500,
        body: "Something went wrong".into(),
      })
    });

    query.fetch();
    let result = query.resolve().await;

    assert!(matches!(query.state(), QueryState::Error(_)));
    assert!(result.data.is_none());
    assert_eq!(
      result.error.map(|e| e.to_string()),
      Some("HTTP 500: Something went wrong".to_string())
    );
  }

  #[tokio::test]
  async fn test_disabled_query_issues_no_request() {
    let client = client();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = QueryKey::from(["chat", "messages", "c1"]);
    client.set_query_data(&key, vec![9]);

    let mut query = counted(&client, key, calls.clone()).enabled(false);
    query.fetch();
    query.refetch();
    let result = query.resolve().await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(result.data.is_none());
    assert!(!result.is_loading);
  }

  #[tokio::test]
  async fn test_two_views_share_the_cache() {
    let client = client();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = QueryKey::from(["housing", "list"]);

    let mut first = counted(&client, key.clone(), calls.clone());
    let mut second = counted(&client, key, calls.clone());
    first.fetch();
    second.fetch();
    first.resolve().await;
    second.resolve().await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // A third view mounted later is served from cache
    let mut third = counted(&client, QueryKey::from(["housing", "list"]), calls.clone());
    third.fetch();
    assert!(matches!(third.state(), QueryState::Success(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_refetch_goes_to_network() {
    let client = client();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut query = counted(&client, QueryKey::from(["feed", "posts"]), calls.clone());

    query.fetch();
    query.resolve().await;
    query.refetch();
    query.resolve().await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_fetch_after_invalidation_goes_to_network() {
    let client = client();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut query = counted(&client, QueryKey::from(["feed", "posts"]), calls.clone());

    query.fetch();
    query.resolve().await;
    query.fetch();
    query.resolve().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    client.invalidate_queries(&QueryKey::from(["feed"]));
    query.fetch();
    query.resolve().await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_fetch_while_loading_is_noop() {
    let client = client();
    let mut query = Query::new(client, QueryKey::from(["feed", "posts"]), || async {
      tokio::time::sleep(Duration::from_millis(100)).await;
      Ok::<_, ApiError>(42)
    });

    query.fetch();
    assert!(query.is_loading());

    query.fetch();
    assert!(query.is_loading());
  }

  #[tokio::test]
  async fn test_drop_releases_observer() {
    let client = QueryClient::new(QueryOptions {
      gc_time: Duration::ZERO,
      ..client().options().clone()
    });
    let calls = Arc::new(AtomicUsize::new(0));
    let mut query = counted(&client, QueryKey::from(["feed", "posts"]), calls);
    query.fetch();
    query.resolve().await;

    assert_eq!(client.collect_garbage(), 0);
    drop(query);
    assert_eq!(client.collect_garbage(), 1);
  }
}
