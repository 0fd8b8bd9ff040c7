use color_eyre::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::api::transport::{ReqwestTransport, Transport};
use crate::api::{ApiClient, UniboeApi};
use crate::config::Config;
use crate::credentials::{CredentialStore, MemoryCredentialStore, SqliteCredentialStore};
use crate::fallback::OfflineAssistant;
use crate::query::{QueryClient, QueryOptions};
use crate::session::{Route, Router, SessionPolicy};

/// Everything a page needs, built once at startup and passed down.
#[derive(Clone)]
pub struct App {
  pub config: Arc<Config>,
  pub router: Router,
  pub api: UniboeApi,
  pub queries: QueryClient,
  pub assistant: OfflineAssistant,
}

impl App {
  pub fn new(
    config: Config,
    credentials: Arc<dyn CredentialStore>,
    transport: Arc<dyn Transport>,
  ) -> Result<Self> {
    let initial = if credentials.get()?.is_some() {
      Route::Home
    } else {
      Route::Auth {
        session_expired: false,
      }
    };
    let router = Router::new(initial);

    let client = ApiClient::new(&config.api.base_url, transport, credentials.clone());
    client.on_unauthorized(Arc::new(SessionPolicy::new(credentials, router.clone())));

    let queries = QueryClient::new(QueryOptions::from(&config.query));
    debug!(base_url = %config.api.base_url, "application context ready");

    Ok(Self {
      config: Arc::new(config),
      router,
      api: UniboeApi::new(client),
      queries,
      assistant: OfflineAssistant::default(),
    })
  }

  /// Context backed by the real network and the on-disk credential store.
  ///
  /// With `ephemeral`, the credential lives only for this process.
  pub fn connect(config: Config, ephemeral: bool) -> Result<Self> {
    let credentials: Arc<dyn CredentialStore> = if ephemeral {
      Arc::new(MemoryCredentialStore::new())
    } else {
      Arc::new(SqliteCredentialStore::open()?)
    };
    let transport = Arc::new(ReqwestTransport::new()?);
    info!(base_url = %config.api.base_url, ephemeral, "connecting");
    Self::new(config, credentials, transport)
  }

  /// Periodically evict idle cache entries.
  pub fn start_gc(&self) -> tokio::task::JoinHandle<()> {
    let every = self.queries.options().gc_time.max(Duration::from_secs(1));
    self.queries.spawn_gc(every)
  }

  /// The current view is the sign-in screen because a session expired.
  pub fn session_expired(&self) -> bool {
    matches!(
      self.router.current(),
      Route::Auth {
        session_expired: true
      }
    )
  }
}


#[cfg(test)]
mod tests {
  use super::testing::app;
  use super::*;
  use crate::api::transport::mock::MockTransport;
  use crate::api::transport::Method;

  #[test]
  fn test_initial_route_depends_on_credential() {
    let (signed_out, _) = app(Arc::new(MockTransport::new()), None);
    assert!(signed_out.router.current().is_auth());
    assert!(!signed_out.session_expired());

    let (signed_in, _) = app(Arc::new(MockTransport::new()), Some("abc123"));
    assert_eq!(signed_in.router.current(), Route::Home);
  }

  #[tokio::test]
  async fn test_session_policy_is_wired() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(Method::Get, "/api/profile/me", 401, "expired");
    let (app, store) = app(transport, Some("abc123"));

    let err = app.api.my_profile().await.unwrap_err();

    assert!(err.is_unauthorized());
    assert_eq!(store.get().unwrap(), None);
    assert!(app.session_expired());
  }
}
