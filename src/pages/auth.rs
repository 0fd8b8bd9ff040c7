use color_eyre::Result;

use super::keys;
use crate::api::types::{RegisterOutcome, RegisterRequest, User};
use crate::app::App;
use crate::query::Query;
use crate::session::Route;

pub const SESSION_EXPIRED: &str = "Your session has expired. Please sign in again.";

/// Notice shown on the sign-in view, if any.
pub fn notice(app: &App) -> Option<&'static str> {
  app.session_expired().then_some(SESSION_EXPIRED)
}

fn signed_in_as(user: &User) -> String {
  format!("Signed in as {} <{}>", user.full_name, user.email)
}

pub async fn login(app: &App, email: &str, password: &str) -> Result<String> {
  let token = app.api.login(email, password).await?;
  // Anything cached belonged to whoever was signed in before
  app.queries.clear();
  app.router.navigate(Route::Home);
  Ok(signed_in_as(&token.user))
}

pub async fn register(app: &App, request: RegisterRequest) -> Result<String> {
  match app.api.register(&request).await? {
    RegisterOutcome::SignedIn(token) => {
      app.queries.clear();
      app.router.navigate(Route::Home);
      Ok(signed_in_as(&token.user))
    }
    RegisterOutcome::ConfirmationRequired(confirmation) => Ok(match confirmation.email {
      Some(email) => format!("{} ({})", confirmation.message, email),
      None => confirmation.message,
    }),
  }
}

/// The local session ends even when the backend call fails.
pub async fn logout(app: &App) -> Result<String> {
  let result = app.api.logout().await;
  app.queries.clear();
  app.router.navigate(Route::Auth {
    session_expired: false,
  });
  result?;
  Ok("Signed out".to_string())
}

/// Confirm an address with the token from the verification email.
pub async fn verify_email(app: &App, token: &str) -> Result<String> {
  let response = app.api.verify_email(token).await?;
  Ok(
    response
      .get("message")
      .and_then(|m| m.as_str())
      .unwrap_or("Email verified")
      .to_string(),
  )
}

pub async fn whoami(app: &App) -> Result<String> {
  if !app.api.is_signed_in()? {
    return Ok("Not signed in".to_string());
  }
  let api = app.api.clone();
  let mut query = Query::new(app.queries.clone(), keys::auth_me(), move || {
    let api = api.clone();
    async move { api.me().await }
  });
  query.fetch();
  let result = query.resolve().await;
  match (result.data, result.error) {
    (Some(user), _) => Ok(signed_in_as(&user)),
    // The sign-in notice already tells the user the session expired
    (None, Some(e)) if e.is_unauthorized() => Ok(String::new()),
    (None, Some(e)) => Err(e.into()),
    (None, None) => Ok("Not signed in".to_string()),
  }
}
