//! Session policy: what happens when the backend stops accepting our token.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::api::UnauthorizedListener;
use crate::credentials::CredentialStore;

/// Top-level views of the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
  Home,
  /// Sign-in screen; `session_expired` explains why the user landed here
  Auth { session_expired: bool },
  Housing,
  Feed,
  Chat,
  Assistant,
  Profile,
}

impl Route {
  pub fn is_auth(&self) -> bool {
    matches!(self, Route::Auth { .. })
  }
}

/// The current view, shared across the application.
#[derive(Clone)]
pub struct Router {
  current: Arc<watch::Sender<Route>>,
}

impl Router {
  pub fn new(initial: Route) -> Self {
    let (tx, _rx) = watch::channel(initial);
    Self {
      current: Arc::new(tx),
    }
  }

  pub fn current(&self) -> Route {
    self.current.borrow().clone()
  }

  pub fn navigate(&self, route: Route) {
    self.current.send_replace(route);
  }

  /// Observe navigation.
  pub fn subscribe(&self) -> watch::Receiver<Route> {
    self.current.subscribe()
  }
}

/// Clears the credential and sends the user to sign in after a 401.
pub struct SessionPolicy {
  credentials: Arc<dyn CredentialStore>,
  router: Router,
}

impl SessionPolicy {
  pub fn new(credentials: Arc<dyn CredentialStore>, router: Router) -> Self {
    Self {
      credentials,
      router,
    }
  }
}

impl UnauthorizedListener for SessionPolicy {
  fn on_unauthorized(&self) {
    if let Err(e) = self.credentials.clear() {
      warn!(error = %e, "failed to clear credential after 401");
    }

    if self.router.current().is_auth() {
      return;
    }

    info!("session expired; returning to sign-in");
    self.router.navigate(Route::Auth {
      session_expired: true,
    });
  }
}
