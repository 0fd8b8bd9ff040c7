//! Writes against the backend and their effect on cached reads.

use std::future::Future;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::client::QueryClient;
use super::key::QueryKey;
use crate::api::ApiError;

type StateChange<S> = Box<dyn FnOnce(&mut S) + Send>;

/// A speculative change to view state together with its exact inverse.
pub struct Optimistic<S> {
  apply: StateChange<S>,
  revert: StateChange<S>,
}

impl<S> Optimistic<S> {
  pub fn new<A, R>(apply: A, revert: R) -> Self
  where
    A: FnOnce(&mut S) + Send + 'static,
    R: FnOnce(&mut S) + Send + 'static,
  {
    Self {
      apply: Box::new(apply),
      revert: Box::new(revert),
    }
  }
}

impl QueryClient {
  /// Run a write. On success, every key returned by `invalidate` (and every
  /// key under it) is marked stale. Writes are never retried.
  pub async fn mutate<T, Fut, K>(&self, action: Fut, invalidate: K) -> Result<T, ApiError>
  where
    Fut: Future<Output = Result<T, ApiError>>,
    K: FnOnce(&T) -> Vec<QueryKey>,
  {
    let value = action.await?;
    for key in invalidate(&value) {
      self.invalidate_queries(&key);
    }
    Ok(value)
  }

  /// Run a write with an optimistic change to `view`.
  ///
  /// The change is applied before the request goes out. If the request
  /// fails it is reverted and the error returned; if it succeeds the
  /// `invalidate` keys are marked stale so the server's answer replaces the
  /// speculative state on the next read.
  pub async fn mutate_optimistic<S, T, Fut>(
    &self,
    view: &watch::Sender<S>,
    change: Optimistic<S>,
    action: Fut,
    invalidate: &[QueryKey],
  ) -> Result<T, ApiError>
  where
    Fut: Future<Output = Result<T, ApiError>>,
  {
    let Optimistic { apply, revert } = change;
    view.send_modify(apply);

    match action.await {
      Ok(value) => {
        for key in invalidate {
          self.invalidate_queries(key);
        }
        debug!(keys = invalidate.len(), "optimistic write confirmed");
        Ok(value)
      }
      Err(e) => {
        warn!(error = %e, "write failed; reverting optimistic change");
        view.send_modify(revert);
        Err(e)
      }
    }
  }
}
